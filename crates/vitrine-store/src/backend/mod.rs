//! # Persistence Backends
//!
//! The two storage seams the commerce store writes through.
//!
//! ## Backend Roles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Storage Backends                                │
//! │                                                                         │
//! │  LocalStore (durable, this device)       RemoteReplica (shared)         │
//! │  ──────────────────────────────────      ─────────────────────────      │
//! │  get(key) / set(key, bytes)              get / set (local cache)        │
//! │  set() returning Ok = durable            synchronize() flush + pull     │
//! │                                          subscribe() external changes   │
//! │                                                                         │
//! │  ┌──────────────────┐                    ┌──────────────────┐           │
//! │  │ SqliteLocalStore │                    │ FileReplica      │           │
//! │  │ MemoryLocalStore │                    │ MemoryReplica    │           │
//! │  └──────────────────┘                    └──────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Keys
//! Storage keys become file names in [`FileReplica`], so they are restricted
//! to `[A-Za-z0-9._-]+` and may not start with a dot. Every backend enforces
//! this on `get` and `set`.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

mod file_replica;
mod memory;
mod sqlite;

pub use file_replica::FileReplica;
pub use memory::{MemoryLocalStore, MemoryReplica};
pub use sqlite::SqliteLocalStore;

/// Capacity of replica change broadcast channels.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// Local Store
// =============================================================================

/// Durable key-value store on this device.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Reads the blob stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`. Returning `Ok` means the write is durable.
    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
}

// =============================================================================
// Remote Replica
// =============================================================================

/// Keys that another device changed in the remote replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaChange {
    pub keys: BTreeSet<String>,
}

impl ReplicaChange {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        ReplicaChange {
            keys: keys.into_iter().collect(),
        }
    }

    /// Returns true if `key` is among the changed keys.
    pub fn touches(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// A replicated key-value store shared with other devices.
///
/// ## Contract
/// - `get`/`set` work against a local cache and never touch the network
/// - `synchronize` pushes pending writes and pulls the latest values. When a
///   key changed remotely since this replica last saw it, the remote value
///   wins and the pending write for that key is discarded
/// - `subscribe` delivers a [`ReplicaChange`] whenever another writer changes
///   keys; this replica's own writes are never reported
#[async_trait]
pub trait RemoteReplica: Send + Sync {
    /// Reads the cached value under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes to the cache and marks the key pending.
    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Flushes pending writes and pulls remote values into the cache.
    async fn synchronize(&self) -> StoreResult<()>;

    /// Subscribes to external change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ReplicaChange>;
}

// =============================================================================
// Configured Backends
// =============================================================================

/// Opens the backends a [`StoreConfig`] describes.
///
/// - local: SQLite at the configured (or platform default) database path
/// - remote: a [`FileReplica`] over the configured directory, otherwise an
///   in-memory replica that only lives as long as the process
pub async fn open_configured(
    config: &StoreConfig,
) -> StoreResult<(Arc<dyn LocalStore>, Arc<dyn RemoteReplica>)> {
    let local = open_local(config).await?;
    let remote = open_remote(config).await?;
    Ok((Arc::new(local), remote))
}

/// Opens the SQLite local store at the configured database path.
pub async fn open_local(config: &StoreConfig) -> StoreResult<SqliteLocalStore> {
    let path = config.database_path().ok_or_else(|| {
        StoreError::InvalidConfig("no database path and no platform data directory".into())
    })?;
    SqliteLocalStore::open(&path).await
}

/// Opens the configured remote replica.
pub async fn open_remote(config: &StoreConfig) -> StoreResult<Arc<dyn RemoteReplica>> {
    match config.replica_directory() {
        Some(directory) => Ok(Arc::new(
            FileReplica::open(directory, config.replica.poll_interval()).await?,
        )),
        None => {
            info!("No replica directory configured, using in-memory replica");
            Ok(Arc::new(MemoryReplica::new()))
        }
    }
}

// =============================================================================
// Key Validation
// =============================================================================

/// Checks that a storage key is non-empty, uses only `[A-Za-z0-9._-]` and
/// does not start with `.`.
///
/// Dot-prefixed names are reserved for [`FileReplica`] temp files.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if key.is_empty() || !valid_chars || key.starts_with('.') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("vitrine.commerce.local.v1").is_ok());
        assert!(validate_key("A-b_9").is_ok());

        for bad in ["", ".", "..", ".snap", ".k.tmp", "a/b", "a b", "naïve", "key\n"] {
            assert!(
                matches!(validate_key(bad), Err(StoreError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_replica_change_touches() {
        let change = ReplicaChange::new(["a".to_string(), "b".to_string()]);
        assert!(change.touches("a"));
        assert!(!change.touches("c"));
    }
}
