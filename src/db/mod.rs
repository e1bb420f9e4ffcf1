mod memory;
mod models;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;
pub use store::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseConfig, StoreBackend};

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Build the configured data source
pub async fn open_store(config: &DatabaseConfig, data_dir: &Path) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let pool = init(data_dir, config).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store, data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn init(data_dir: &Path, config: &DatabaseConfig) -> Result<DbPool> {
    let db_path = data_dir.join(&config.file);
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    prepare(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Enable constraints and bring the schema up to date
pub async fn prepare(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;
    run_migrations(pool).await
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users and travel requests
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Indexes for owner-scoped listings
    let has_user_index: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='index' AND name='idx_travels_user_id'"
    )
    .fetch_optional(pool)
    .await?;
    if has_user_index.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_travel_indexes.sql")).await?;
    }

    Ok(())
}
