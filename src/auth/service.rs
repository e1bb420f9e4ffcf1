//! Register and login flows on top of the credential store.

use tracing::{info, warn};

use super::{hash_password, verify_password, TokenError, TokenIssuer};
use crate::db::{
    AuthResponse, DynStore, LoginRequest, NewUser, RegisterRequest, StoreError, User, UserStore,
    UserType,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Only administrators can create admin accounts")]
    Unauthorized,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AuthService {
    store: DynStore,
    issuer: TokenIssuer,
}

impl AuthService {
    pub fn new(store: DynStore, issuer: TokenIssuer) -> Self {
        Self { store, issuer }
    }

    /// Create an account and return a session for it.
    ///
    /// `caller_is_admin` must come from a verified token; only then may
    /// `user_type` be `Admin`.
    pub async fn register(
        &self,
        request: RegisterRequest,
        user_type: UserType,
        caller_is_admin: bool,
    ) -> Result<AuthResponse, AuthError> {
        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        if user_type.is_admin() && !caller_is_admin {
            warn!(email = %request.email, "Rejected admin registration from non-admin caller");
            return Err(AuthError::Unauthorized);
        }

        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user = self
            .store
            .insert_user(NewUser {
                email: request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                user_type,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        info!(user_id = user.id, user_type = %user.role(), "Registered user");

        let token = self.issuer.issue(&user)?;
        Ok(AuthResponse::new(token, &user))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self
            .store
            .find_user_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.active() {
            return Err(AuthError::AccountDisabled);
        }

        let now = chrono::Utc::now().to_rfc3339();
        self.store.record_login(user.id, &now).await?;
        let user = User {
            last_login_at: Some(now),
            ..user
        };

        info!(user_id = user.id, "User logged in");

        let token = self.issuer.issue(&user)?;
        Ok(AuthResponse::new(token, &user))
    }

    /// Create the configured bootstrap admin when it does not exist yet
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.store.find_user_by_email(email).await?.is_some() {
            return Ok(());
        }

        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            user_type: None,
        };
        self.register(request, UserType::Admin, true).await?;
        info!(email = %email, "Created bootstrap admin user");
        Ok(())
    }
}
