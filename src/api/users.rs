use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AdminContext;
use super::error::{ApiError, ApiJson};
use crate::db::{UpdateUserStatusRequest, UserStore, UserSummary};
use crate::AppState;

/// List all users (Admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminContext,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminContext,
    Path(id): Path<i64>,
) -> Result<Json<UserSummary>, ApiError> {
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

/// Change a user's role and active flag (Admin only)
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    AdminContext(admin): AdminContext,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateUserStatusRequest>,
) -> Result<StatusCode, ApiError> {
    if id == admin.user_id && (!request.is_active || !request.user_type.is_admin()) {
        return Err(ApiError::bad_request(
            "Administrators cannot demote or deactivate their own account",
        ));
    }

    if !state
        .store
        .update_user_status(id, request.user_type, request.is_active)
        .await?
    {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(
        admin_id = admin.user_id,
        user_id = id,
        user_type = %request.user_type,
        is_active = request.is_active,
        "Updated user status"
    );

    Ok(StatusCode::NO_CONTENT)
}
