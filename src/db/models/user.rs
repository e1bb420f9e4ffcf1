//! User models, roles and auth DTOs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;

/// Account role. Serialized on the wire as `0` (Regular) / `1` (Admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserType {
    #[default]
    Regular,
    Admin,
}

impl UserType {
    pub fn as_i64(&self) -> i64 {
        match self {
            UserType::Regular => 0,
            UserType::Admin => 1,
        }
    }

    /// Anything other than `1` is the least-privileged role
    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            UserType::Admin
        } else {
            UserType::Regular
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserType::Admin)
    }

    /// Role name carried in the generic `role` claim
    pub fn role_name(&self) -> &'static str {
        match self {
            UserType::Admin => "Admin",
            UserType::Regular => "User",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Regular => write!(f, "Regular"),
            UserType::Admin => write!(f, "Admin"),
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" | "user" | "0" => Ok(UserType::Regular),
            "admin" | "1" => Ok(UserType::Admin),
            _ => Err(format!("Unknown user type: {}", s)),
        }
    }
}

impl Serialize for UserType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for UserType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(0) => Ok(UserType::Regular),
            Raw::Number(1) => Ok(UserType::Admin),
            Raw::Number(n) => Err(serde::de::Error::custom(format!(
                "invalid user type {}, expected 0 or 1",
                n
            ))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: i64,
    pub is_active: i32,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl User {
    pub fn role(&self) -> UserType {
        UserType::from_i64(self.user_type)
    }

    pub fn active(&self) -> bool {
        self.is_active != 0
    }
}

/// Insert payload for the credential store
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub created_at: String,
}

/// Admin-facing user listing (never carries the password hash)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub is_active: bool,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            user_type: user.role(),
            is_active: user.active(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserStatusRequest {
    pub user_type: UserType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Ignored on self-registration; accounts start as Regular
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub is_active: bool,
}

impl AuthResponse {
    pub fn new(token: String, user: &User) -> Self {
        Self {
            token,
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_type: user.role(),
            is_active: user.active(),
        }
    }
}
