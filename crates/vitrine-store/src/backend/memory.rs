//! # In-Memory Backends
//!
//! Process-local backends for tests, demos and sessions without a shared
//! directory.
//!
//! ## MemoryReplica Model
//! ```text
//! ┌──────────────────────────┐   synchronize()   ┌──────────────────────────┐
//! │  cache + pending writes  │ ────────────────► │  cloud (key → version,   │
//! │  seen: key → version     │ ◄──────────────── │         value)           │
//! └──────────────────────────┘    pull latest    └────────────▲─────────────┘
//!                                                             │
//!                                           push_external() ──┘ (other device)
//! ```
//!
//! A pending write is based on the cloud version this replica last saw.
//! If the cloud moved on since then, the write is discarded and the cloud
//! value wins.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{validate_key, LocalStore, RemoteReplica, ReplicaChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Memory Local Store
// =============================================================================

/// HashMap-backed [`LocalStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// =============================================================================
// Memory Replica
// =============================================================================

#[derive(Debug, Default)]
struct ReplicaState {
    /// The shared side: key → (version, value).
    cloud: HashMap<String, (u64, Vec<u8>)>,

    /// This device's view of the cloud.
    cache: HashMap<String, Vec<u8>>,

    /// Cloud version each key had when this device last synced it.
    seen: HashMap<String, u64>,

    /// Writes not yet pushed to the cloud.
    pending: HashMap<String, Vec<u8>>,
}

/// In-process [`RemoteReplica`] with a simulated second device.
#[derive(Debug, Clone)]
pub struct MemoryReplica {
    state: Arc<RwLock<ReplicaState>>,
    offline: Arc<AtomicBool>,
    changes: broadcast::Sender<ReplicaChange>,
}

impl Default for MemoryReplica {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemoryReplica {
            state: Arc::new(RwLock::new(ReplicaState::default())),
            offline: Arc::new(AtomicBool::new(false)),
            changes,
        }
    }
}

impl MemoryReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another device writing `value` under `key` and the change
    /// reaching this device.
    ///
    /// Any pending local write for `key` loses to this one.
    pub async fn push_external(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        {
            let mut state = self.state.write().await;
            let version = state.cloud.get(key).map_or(1, |(version, _)| version + 1);
            state
                .cloud
                .insert(key.to_string(), (version, value.to_vec()));
            state.pending.remove(key);
        }

        debug!(key = %key, "External replica write");
        // No subscribers is fine: nothing is listening yet.
        let _ = self.changes.send(ReplicaChange::new([key.to_string()]));
        Ok(())
    }

    /// Simulates losing (or regaining) the network. While offline,
    /// `synchronize` fails and writes stay pending.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The value currently on the shared side, bypassing the cache.
    #[cfg(test)]
    pub async fn cloud_value(&self, key: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .await
            .cloud
            .get(key)
            .map(|(_, value)| value.clone())
    }

    /// Number of writes waiting for the next successful synchronize.
    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }
}

#[async_trait]
impl RemoteReplica for MemoryReplica {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.state.read().await.cache.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        let mut state = self.state.write().await;
        state.cache.insert(key.to_string(), value.to_vec());
        state.pending.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn synchronize(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::ReplicaUnavailable(
                "memory replica is offline".into(),
            ));
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Push
        for (key, value) in std::mem::take(&mut state.pending) {
            let cloud_version = state.cloud.get(&key).map(|(version, _)| *version);
            let seen_version = state.seen.get(&key).copied();

            if cloud_version.is_some() && cloud_version != seen_version {
                debug!(key = %key, "Discarding pending write superseded by external change");
                continue;
            }

            let version = cloud_version.map_or(1, |version| version + 1);
            state.cloud.insert(key, (version, value));
        }

        // Pull
        state.cache = state
            .cloud
            .iter()
            .map(|(key, (_, value))| (key.clone(), value.clone()))
            .collect();
        state.seen = state
            .cloud
            .iter()
            .map(|(key, (version, _))| (key.clone(), *version))
            .collect();

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplicaChange> {
        self.changes.subscribe()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_local_store() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.set("", b"v").await.is_err());
    }

    #[tokio::test]
    async fn test_write_reaches_cloud_on_synchronize() {
        let replica = MemoryReplica::new();
        replica.set("k", b"mine").await.unwrap();

        assert_eq!(replica.cloud_value("k").await, None);
        assert_eq!(replica.get("k").await.unwrap(), Some(b"mine".to_vec()));

        replica.synchronize().await.unwrap();
        assert_eq!(replica.cloud_value("k").await, Some(b"mine".to_vec()));
        assert_eq!(replica.pending_count().await, 0);

        // a second write on top of our own version is not a conflict
        replica.set("k", b"mine again").await.unwrap();
        replica.synchronize().await.unwrap();
        assert_eq!(replica.cloud_value("k").await, Some(b"mine again".to_vec()));
    }

    #[tokio::test]
    async fn test_external_write_wins_over_pending() {
        let replica = MemoryReplica::new();
        replica.set("k", b"v0").await.unwrap();
        replica.synchronize().await.unwrap();

        replica.set("k", b"local").await.unwrap();
        replica.push_external("k", b"external").await.unwrap();
        replica.synchronize().await.unwrap();

        assert_eq!(replica.get("k").await.unwrap(), Some(b"external".to_vec()));
        assert_eq!(replica.cloud_value("k").await, Some(b"external".to_vec()));
    }

    #[tokio::test]
    async fn test_stale_pending_write_is_discarded() {
        let replica = MemoryReplica::new();
        replica.push_external("k", b"external").await.unwrap();

        // never synced, so this write is based on nothing
        replica.set("k", b"stale").await.unwrap();
        replica.synchronize().await.unwrap();

        assert_eq!(replica.get("k").await.unwrap(), Some(b"external".to_vec()));
    }

    #[tokio::test]
    async fn test_offline_keeps_writes_pending() {
        let replica = MemoryReplica::new();
        replica.set_offline(true);
        replica.set("k", b"v").await.unwrap();

        assert!(matches!(
            replica.synchronize().await,
            Err(StoreError::ReplicaUnavailable(_))
        ));
        assert_eq!(replica.pending_count().await, 1);

        replica.set_offline(false);
        replica.synchronize().await.unwrap();
        assert_eq!(replica.cloud_value("k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_push_external_notifies_subscribers() {
        let replica = MemoryReplica::new();
        let mut changes = replica.subscribe();

        replica.set("own", b"x").await.unwrap();
        replica.synchronize().await.unwrap();
        replica.push_external("theirs", b"y").await.unwrap();

        let change = changes.recv().await.unwrap();
        assert!(change.touches("theirs"));
        assert!(changes.try_recv().is_err());
    }
}
