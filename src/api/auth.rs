use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ApiJson};
use super::validation::validate_registration;
use crate::auth::AuthContext;
use crate::db::{AuthResponse, LoginRequest, RegisterRequest, UserType};
use crate::AppState;

/// Pull the bearer token out of the Authorization header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

/// Extractor for the authenticated caller. Rejects with 401 when the
/// header is missing or the token does not validate.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        Ok(state.tokens.validate(&token)?)
    }
}

/// Extractor for admin-only endpoints: 401 when unauthenticated, 403 when
/// the caller is not an Admin.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx = AuthContext::from_request_parts(parts, state).await?;
        if !ctx.is_admin() {
            tracing::warn!(user_id = ctx.user_id, "Non-admin caller rejected from admin endpoint");
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminContext(ctx))
    }
}

/// Self-service sign-up. Always creates a Regular account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_registration(&request)?;

    if matches!(request.user_type, Some(UserType::Admin)) {
        tracing::debug!(email = %request.email, "Ignoring requested admin role on self sign-up");
    }

    let response = state
        .auth
        .register(normalize(request), UserType::Regular, false)
        .await?;
    Ok(Json(response))
}

/// Create an Admin account. Only callable by an existing Admin.
pub async fn register_admin(
    State(state): State<Arc<AppState>>,
    AdminContext(admin): AdminContext,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_registration(&request)?;

    tracing::info!(admin_id = admin.user_id, email = %request.email, "Admin creating admin account");

    let response = state
        .auth
        .register(normalize(request), UserType::Admin, admin.is_admin())
        .await?;
    Ok(Json(response))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let request = LoginRequest {
        email: request.email.trim().to_string(),
        password: request.password,
    };

    match state.auth.login(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::info!(error = %e, "Login failed");
            Err(e.into())
        }
    }
}

fn normalize(request: RegisterRequest) -> RegisterRequest {
    RegisterRequest {
        email: request.email.trim().to_string(),
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        ..request
    }
}
