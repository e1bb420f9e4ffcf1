//! Data-source seam.
//!
//! Handlers only see `Arc<dyn Store>`; the concrete implementation
//! (`SqliteStore` or `MemoryStore`) is picked once at startup from
//! `[database] backend`.

use async_trait::async_trait;
use std::sync::Arc;

use super::models::{NewTravel, NewUser, Travel, User, UserType};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (e.g. duplicate email)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Fails with `StoreError::Conflict` when the email is already taken
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn record_login(&self, id: i64, at: &str) -> StoreResult<()>;

    /// Returns false when no such user exists
    async fn update_user_status(
        &self,
        id: i64,
        user_type: UserType,
        is_active: bool,
    ) -> StoreResult<bool>;
}

/// Travel request store
#[async_trait]
pub trait TravelStore: Send + Sync {
    async fn list_travels(&self) -> StoreResult<Vec<Travel>>;

    async fn list_travels_for_user(&self, user_id: i64) -> StoreResult<Vec<Travel>>;

    async fn find_travel(&self, id: i64) -> StoreResult<Option<Travel>>;

    /// New rows always start out `Pending`
    async fn insert_travel(&self, travel: NewTravel) -> StoreResult<Travel>;

    /// Overwrites the stored row; returns false when it no longer exists
    async fn update_travel(&self, travel: &Travel) -> StoreResult<bool>;

    /// Returns false when nothing was deleted
    async fn delete_travel(&self, id: i64) -> StoreResult<bool>;
}

pub trait Store: UserStore + TravelStore {}

impl<T: UserStore + TravelStore> Store for T {}

pub type DynStore = Arc<dyn Store>;
