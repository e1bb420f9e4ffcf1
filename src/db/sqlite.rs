//! SQLite-backed store.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::models::{NewTravel, NewUser, Travel, TravelStatus, User, UserType};
use super::store::{StoreError, StoreResult, TravelStore, UserStore};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
            StoreError::Conflict(format!("{} already exists", what))
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, user_type, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.user_type.as_i64())
        .bind(&user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "A user with this email"))?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn record_login(&self, id: i64, at: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_user_status(
        &self,
        id: i64,
        user_type: UserType,
        is_active: bool,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET user_type = ?, is_active = ? WHERE id = ?")
            .bind(user_type.as_i64())
            .bind(if is_active { 1 } else { 0 })
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TravelStore for SqliteStore {
    async fn list_travels(&self) -> StoreResult<Vec<Travel>> {
        let travels =
            sqlx::query_as::<_, Travel>("SELECT * FROM travels ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(travels)
    }

    async fn list_travels_for_user(&self, user_id: i64) -> StoreResult<Vec<Travel>> {
        let travels = sqlx::query_as::<_, Travel>(
            "SELECT * FROM travels WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(travels)
    }

    async fn find_travel(&self, id: i64) -> StoreResult<Option<Travel>> {
        let travel = sqlx::query_as::<_, Travel>("SELECT * FROM travels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(travel)
    }

    async fn insert_travel(&self, travel: NewTravel) -> StoreResult<Travel> {
        let result = sqlx::query(
            r#"
            INSERT INTO travels (user_id, destination, start_date, end_date, purpose, estimated_cost, status, created_at, comments)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(travel.user_id)
        .bind(&travel.destination)
        .bind(&travel.start_date)
        .bind(&travel.end_date)
        .bind(&travel.purpose)
        .bind(travel.estimated_cost)
        .bind(TravelStatus::Pending.to_string())
        .bind(&travel.created_at)
        .bind(&travel.comments)
        .execute(&self.pool)
        .await?;

        let travel = sqlx::query_as::<_, Travel>("SELECT * FROM travels WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(travel)
    }

    async fn update_travel(&self, travel: &Travel) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE travels SET
                destination = ?,
                start_date = ?,
                end_date = ?,
                purpose = ?,
                estimated_cost = ?,
                status = ?,
                updated_at = ?,
                approved_by = ?,
                approved_at = ?,
                rejected_by = ?,
                rejected_at = ?,
                comments = ?
            WHERE id = ?
            "#,
        )
        .bind(&travel.destination)
        .bind(&travel.start_date)
        .bind(&travel.end_date)
        .bind(&travel.purpose)
        .bind(travel.estimated_cost)
        .bind(&travel.status)
        .bind(&travel.updated_at)
        .bind(travel.approved_by)
        .bind(&travel.approved_at)
        .bind(travel.rejected_by)
        .bind(&travel.rejected_at)
        .bind(&travel.comments)
        .bind(travel.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_travel(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM travels WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::prepare(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            user_type: UserType::Regular,
            created_at: "2025-06-01T08:00:00+00:00".to_string(),
        }
    }

    fn new_travel(user_id: i64, destination: &str) -> NewTravel {
        NewTravel {
            user_id,
            destination: destination.to_string(),
            start_date: "2025-07-01T00:00:00+00:00".to_string(),
            end_date: "2025-07-05T00:00:00+00:00".to_string(),
            purpose: "Conference".to_string(),
            estimated_cost: 1250.0,
            comments: None,
            created_at: "2025-06-02T08:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = test_store().await;
        crate::db::prepare(store.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let store = test_store().await;
        let user = store.insert_user(new_user("grace@example.com")).await.unwrap();
        assert!(user.id > 0);
        assert!(user.active());
        assert_eq!(user.role(), UserType::Regular);

        let found = store.find_user_by_email("grace@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(store.find_user(user.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict_and_creates_no_row() {
        let store = test_store().await;
        store.insert_user(new_user("dup@example.com")).await.unwrap();

        let err = store.insert_user(new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_status() {
        let store = test_store().await;
        let user = store.insert_user(new_user("ops@example.com")).await.unwrap();

        assert!(store.update_user_status(user.id, UserType::Admin, false).await.unwrap());
        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.role(), UserType::Admin);
        assert!(!user.active());

        assert!(!store.update_user_status(999, UserType::Admin, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_travel_lifecycle() {
        let store = test_store().await;
        let owner = store.insert_user(new_user("owner@example.com")).await.unwrap();
        let other = store.insert_user(new_user("other@example.com")).await.unwrap();

        let mut travel = store.insert_travel(new_travel(owner.id, "Oslo")).await.unwrap();
        store.insert_travel(new_travel(other.id, "Rome")).await.unwrap();
        assert_eq!(travel.status_enum(), TravelStatus::Pending);

        assert_eq!(store.list_travels().await.unwrap().len(), 2);
        let mine = store.list_travels_for_user(owner.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].destination, "Oslo");

        travel.status = TravelStatus::Approved.to_string();
        travel.approved_by = Some(other.id);
        travel.approved_at = Some("2025-06-03T00:00:00+00:00".to_string());
        assert!(store.update_travel(&travel).await.unwrap());

        let stored = store.find_travel(travel.id).await.unwrap().unwrap();
        assert_eq!(stored.status_enum(), TravelStatus::Approved);
        assert_eq!(stored.approved_by, Some(other.id));

        assert!(store.delete_travel(travel.id).await.unwrap());
        assert!(!store.delete_travel(travel.id).await.unwrap());
        assert!(store.find_travel(travel.id).await.unwrap().is_none());
    }
}
