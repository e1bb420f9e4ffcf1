//! Process-local store used for tests and throwaway demo servers.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::models::{NewTravel, NewUser, Travel, TravelStatus, User, UserType};
use super::store::{StoreError, StoreResult, TravelStore, UserStore};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    travels: Vec<Travel>,
    next_user_id: i64,
    next_travel_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().users.clone())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            user_type: user.user_type.as_i64(),
            is_active: 1,
            created_at: user.created_at,
            last_login_at: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: i64, at: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(at.to_string());
        }
        Ok(())
    }

    async fn update_user_status(
        &self,
        id: i64,
        user_type: UserType,
        is_active: bool,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.user_type = user_type.as_i64();
                user.is_active = if is_active { 1 } else { 0 };
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Newest first, matching the SQLite ordering
fn newest_first(mut travels: Vec<Travel>) -> Vec<Travel> {
    travels.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    travels
}

#[async_trait]
impl TravelStore for MemoryStore {
    async fn list_travels(&self) -> StoreResult<Vec<Travel>> {
        Ok(newest_first(self.tables.read().travels.clone()))
    }

    async fn list_travels_for_user(&self, user_id: i64) -> StoreResult<Vec<Travel>> {
        let tables = self.tables.read();
        let travels = tables
            .travels
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(travels))
    }

    async fn find_travel(&self, id: i64) -> StoreResult<Option<Travel>> {
        let tables = self.tables.read();
        Ok(tables.travels.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_travel(&self, travel: NewTravel) -> StoreResult<Travel> {
        let mut tables = self.tables.write();
        tables.next_travel_id += 1;
        let travel = Travel {
            id: tables.next_travel_id,
            user_id: travel.user_id,
            destination: travel.destination,
            start_date: travel.start_date,
            end_date: travel.end_date,
            purpose: travel.purpose,
            estimated_cost: travel.estimated_cost,
            status: TravelStatus::Pending.to_string(),
            created_at: travel.created_at,
            updated_at: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            comments: travel.comments,
        };
        tables.travels.push(travel.clone());
        Ok(travel)
    }

    async fn update_travel(&self, travel: &Travel) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.travels.iter_mut().find(|t| t.id == travel.id) {
            Some(existing) => {
                *existing = travel.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_travel(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let before = tables.travels.len();
        tables.travels.retain(|t| t.id != id);
        Ok(tables.travels.len() != before)
    }
}
