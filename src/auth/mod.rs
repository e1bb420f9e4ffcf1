//! Authentication core: password hashing, token issuance/validation and
//! the register/login flows.

pub mod claims;
mod password;
mod service;
mod token;

pub use password::{hash_password, verify_password};
pub use service::{AuthError, AuthService};
pub use token::{TokenIssuer, TokenValidator};

use crate::db::UserType;

/// Identity of the caller for a single request, decoded from a verified
/// bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub role: UserType,
    /// Nominal `exp` claim (unix seconds)
    pub expires_at: i64,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token has no expiry claim")]
    MissingExpiry,

    #[error("token subject is not a user id")]
    InvalidSubject,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}
