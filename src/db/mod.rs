/// Database layer for the wishlist service
///
/// Manages the SQLite pool and schema, and provides the SQLite backends for
/// the user and item stores.

pub mod item;
pub mod user;

pub use item::SqliteItemStore;
pub use user::SqliteUserStore;

use crate::error::{WishlistError, WishlistResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Schema, applied in order at startup. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        user_level INTEGER NOT NULL DEFAULT 1,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        password_reset INTEGER NOT NULL DEFAULT 0,
        reset_token TEXT,
        reset_token_expires_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK ((reset_token IS NULL) = (reset_token_expires_at IS NULL))
    )",
    "CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users (reset_token)",
    "CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        rank INTEGER NOT NULL,
        reserver_id INTEGER REFERENCES users (id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_items_listing ON items (rank ASC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_items_reserver ON items (reserver_id)",
];

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> WishlistResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await
        .map_err(|e| WishlistError::StorageError(e.to_string()))?;

    Ok(pool)
}

/// Create the tables and indexes if they do not exist yet
pub async fn run_migrations(pool: &SqlitePool) -> WishlistResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| WishlistError::StorageError(format!("Migration failed: {}", e)))?;
    }

    tracing::debug!("Database schema is up to date");
    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> WishlistResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| WishlistError::StorageError(e.to_string()))?;

    Ok(())
}

/// Single-connection in-memory database with the schema applied
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
