//! # SQLite Local Store
//!
//! The durable local backend: one `kv_store` table in a SQLite database.
//!
//! ## Durability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set(key, bytes)                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT ... ON CONFLICT(key) DO UPDATE   (single statement, atomic)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WAL append + fsync (synchronous = FULL)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Ok(())  ◄── the commerce store replies to the caller only after this  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `synchronous = FULL` trades some write latency for a committed write that
//! survives power loss. Snapshot writes are small and infrequent.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{validate_key, LocalStore};
use crate::error::StoreResult;

/// Embedded migrations from the `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// SQLite-backed [`LocalStore`].
#[derive(Debug, Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening local store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Opens an isolated in-memory database (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        debug!("Running local store migrations");
        MIGRATOR.run(&pool).await?;
        Ok(SqliteLocalStore { pool })
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// When `key` was last written, as stored (RFC 3339).
    pub async fn updated_at(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        let updated_at = sqlx::query_scalar::<_, String>(
            "SELECT updated_at FROM kv_store WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated_at)
    }

    /// Closes the connection pool. Later operations fail.
    pub async fn close(&self) {
        info!("Closing local store");
        self.pool.close().await;
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, bytes = value.len(), "Local blob written");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = SqliteLocalStore::in_memory().await.unwrap();
        assert!(store.health_check().await);

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", b"first").await.unwrap();
        store.set("k", b"second").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
        assert!(store.updated_at("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let store = SqliteLocalStore::in_memory().await.unwrap();
        assert!(matches!(
            store.set("a/b", b"x").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("vitrine.db");

        let store = SqliteLocalStore::open(&path).await.unwrap();
        store.set("snapshot", b"{\"version\":1}").await.unwrap();
        store.close().await;
        assert!(!store.health_check().await);

        let reopened = SqliteLocalStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("snapshot").await.unwrap(),
            Some(b"{\"version\":1}".to_vec())
        );
    }
}
