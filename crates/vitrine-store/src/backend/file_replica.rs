//! # File Replica
//!
//! A [`RemoteReplica`] over a directory that an external tool (a synced
//! folder, a network share) replicates between devices.
//!
//! ## Layout
//! ```text
//! <directory>/
//! ├── vitrine.commerce.remote.v1.blob     ◄── one file per key
//! └── .vitrine.commerce.remote.v1.<uuid>.tmp   (transient, during a write)
//! ```
//!
//! ## Synchronize
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each pending (key, bytes):                                         │
//! │      on_disk = read <key>.blob                                          │
//! │      on_disk == seen[key]?                                              │
//! │        ├── yes → write temp, fsync, rename over <key>.blob              │
//! │        └── no  → another device wrote since we last looked:             │
//! │                  drop the pending write, theirs wins                    │
//! │  pull: cache = seen = every *.blob on disk                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Synchronize calls run one at a time. `get` and `set` never wait for the
//! disk work of a synchronize in progress.
//!
//! ## Watcher
//! A background task rescans the directory every poll interval and
//! broadcasts a [`ReplicaChange`] for keys whose content changed to
//! something this replica did not write itself. It stops on
//! [`FileReplica::shutdown`] or when the last handle is dropped.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{validate_key, RemoteReplica, ReplicaChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::{StoreError, StoreResult};

const BLOB_EXTENSION: &str = "blob";

type Blobs = HashMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct FileState {
    /// This device's view of the directory.
    cache: Blobs,

    /// Disk content per key as of the last synchronize.
    seen: Blobs,

    /// Writes not yet flushed to disk.
    pending: Blobs,

    /// Last content this replica wrote per key.
    written: Blobs,
}

#[derive(Debug)]
struct Inner {
    directory: PathBuf,
    state: Mutex<FileState>,
    /// Serializes synchronize calls.
    sync_lock: Mutex<()>,
    changes: broadcast::Sender<ReplicaChange>,
    shutdown_tx: mpsc::Sender<()>,
}

/// Directory-backed [`RemoteReplica`].
#[derive(Debug, Clone)]
pub struct FileReplica {
    inner: Arc<Inner>,
}

impl FileReplica {
    /// Opens the replica directory (creating it if needed), loads its current
    /// contents and starts the watcher.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn open(directory: impl Into<PathBuf>, poll_interval: Duration) -> StoreResult<Self> {
        let directory = directory.into();
        info!(directory = %directory.display(), "Opening file replica");

        tokio::fs::create_dir_all(&directory).await?;
        let on_disk = scan(&directory).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let inner = Arc::new(Inner {
            directory,
            state: Mutex::new(FileState {
                cache: on_disk.clone(),
                seen: on_disk.clone(),
                ..FileState::default()
            }),
            sync_lock: Mutex::new(()),
            changes,
            shutdown_tx,
        });

        tokio::spawn(watch(
            Arc::downgrade(&inner),
            on_disk,
            poll_interval,
            shutdown_rx,
        ));

        Ok(FileReplica { inner })
    }

    /// The replicated directory.
    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    /// Stops the watcher. Reads, writes and synchronize keep working.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(()).await;
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        blob_path(&self.inner.directory, key)
    }

    /// Writes one pending value unless the blob changed on disk since `seen`.
    async fn flush(&self, key: &str, value: &[u8], seen: Option<&Vec<u8>>) -> StoreResult<()> {
        let on_disk = read_blob(&self.blob_path(key)).await?;
        if on_disk.as_ref() != seen {
            debug!(key = %key, "Discarding pending write superseded by external change");
            return Ok(());
        }

        // Recorded before the rename so the watcher never reports our own write.
        self.inner
            .state
            .lock()
            .await
            .written
            .insert(key.to_string(), value.to_vec());

        if let Err(e) = self.write_atomic(key, value).await {
            self.inner.state.lock().await.written.remove(key);
            return Err(e);
        }
        debug!(key = %key, bytes = value.len(), "Replica blob written");
        Ok(())
    }

    /// Puts unflushed writes back, unless a newer `set` replaced them meanwhile.
    async fn requeue(&self, writes: impl Iterator<Item = (String, Vec<u8>)>) {
        let mut state = self.inner.state.lock().await;
        for (key, value) in writes {
            state.pending.entry(key).or_insert(value);
        }
    }

    /// Writes `value` to a temp file, fsyncs it and renames it over the blob.
    async fn write_atomic(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let temp = self
            .inner
            .directory
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4()));

        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp, self.blob_path(key)).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteReplica for FileReplica {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.inner.state.lock().await.cache.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        let mut state = self.inner.state.lock().await;
        state.cache.insert(key.to_string(), value.to_vec());
        state.pending.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn synchronize(&self) -> StoreResult<()> {
        if !tokio::fs::try_exists(&self.inner.directory)
            .await
            .unwrap_or(false)
        {
            return Err(StoreError::ReplicaUnavailable(format!(
                "{} is not reachable",
                self.inner.directory.display()
            )));
        }

        let _sync = self.inner.sync_lock.lock().await;

        // The state lock is only held to move data in and out, never across disk I/O.
        let (pending, seen) = {
            let mut state = self.inner.state.lock().await;
            let pending = std::mem::take(&mut state.pending);
            let seen: Blobs = pending
                .keys()
                .filter_map(|key| state.seen.get(key).map(|v| (key.clone(), v.clone())))
                .collect();
            (pending, seen)
        };

        let mut pending = pending.into_iter();
        while let Some((key, value)) = pending.next() {
            if let Err(e) = self.flush(&key, &value, seen.get(&key)).await {
                self.requeue(std::iter::once((key, value)).chain(pending)).await;
                return Err(e);
            }
        }

        let on_disk = scan(&self.inner.directory).await?;

        let mut state = self.inner.state.lock().await;
        let mut cache = on_disk.clone();
        // Writes made while this synchronize ran stay visible until the next one.
        for (key, value) in &state.pending {
            cache.insert(key.clone(), value.clone());
        }
        state.cache = cache;
        state.seen = on_disk;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplicaChange> {
        self.inner.changes.subscribe()
    }
}

// =============================================================================
// Watcher
// =============================================================================

async fn watch(
    inner: Weak<Inner>,
    mut observed: Blobs,
    poll_interval: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    debug!(?poll_interval, "Replica watcher starting");

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };

                let current = match scan(&inner.directory).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(error = %e, "Replica directory scan failed");
                        continue;
                    }
                };

                let external = {
                    let state = inner.state.lock().await;
                    external_changes(&observed, &current, &state.written)
                };
                observed = current;

                if !external.is_empty() {
                    debug!(keys = ?external, "External replica change detected");
                    let _ = inner.changes.send(ReplicaChange { keys: external });
                }
            }

            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    debug!("Replica watcher stopped");
}

/// Keys whose content differs between two scans, minus this replica's own writes.
fn external_changes(observed: &Blobs, current: &Blobs, written: &Blobs) -> BTreeSet<String> {
    observed
        .keys()
        .chain(current.keys())
        .filter(|key| observed.get(*key) != current.get(*key))
        .filter(|key| current.get(*key) != written.get(*key))
        .cloned()
        .collect()
}

// =============================================================================
// Disk Helpers
// =============================================================================

fn blob_path(directory: &Path, key: &str) -> PathBuf {
    directory.join(format!("{}.{}", key, BLOB_EXTENSION))
}

async fn read_blob(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reads every `<key>.blob` in the directory.
async fn scan(directory: &Path) -> StoreResult<Blobs> {
    let mut blobs = Blobs::new();
    let mut entries = tokio::fs::read_dir(directory).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(BLOB_EXTENSION) {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        // Temp files and anything else that is not a valid key.
        if validate_key(key).is_err() {
            continue;
        }
        // Vanished between listing and reading: treat as absent.
        if let Some(bytes) = read_blob(&path).await? {
            blobs.insert(key.to_string(), bytes);
        }
    }

    Ok(blobs)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_write_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let replica = FileReplica::open(dir.path(), POLL).await.unwrap();
        replica.set("snapshot", b"one").await.unwrap();
        assert!(!dir.path().join("snapshot.blob").exists());

        replica.synchronize().await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("snapshot.blob")).unwrap(),
            b"one"
        );
        replica.shutdown().await;

        let reopened = FileReplica::open(dir.path(), POLL).await.unwrap();
        assert_eq!(reopened.get("snapshot").await.unwrap(), Some(b"one".to_vec()));
    }

    #[tokio::test]
    async fn test_external_write_wins_over_pending() {
        let dir = tempfile::tempdir().unwrap();
        let replica = FileReplica::open(dir.path(), POLL).await.unwrap();
        replica.set("k", b"v0").await.unwrap();
        replica.synchronize().await.unwrap();

        replica.set("k", b"local").await.unwrap();
        std::fs::write(dir.path().join("k.blob"), b"external").unwrap();
        replica.synchronize().await.unwrap();

        assert_eq!(replica.get("k").await.unwrap(), Some(b"external".to_vec()));
        assert_eq!(std::fs::read(dir.path().join("k.blob")).unwrap(), b"external");
    }

    #[tokio::test]
    async fn test_watcher_reports_external_writes_only() {
        let dir = tempfile::tempdir().unwrap();
        let replica = FileReplica::open(dir.path(), POLL).await.unwrap();
        let mut changes = replica.subscribe();

        replica.set("own", b"mine").await.unwrap();
        replica.synchronize().await.unwrap();
        std::fs::write(dir.path().join("theirs.blob"), b"other device").unwrap();
        // ignored: not a blob
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let change = timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.keys, BTreeSet::from(["theirs".to_string()]));

        replica.shutdown().await;
    }

    #[test]
    fn test_external_changes_detects_deletes() {
        let observed: Blobs = [("a".to_string(), b"1".to_vec())].into_iter().collect();
        let current = Blobs::new();
        let written = Blobs::new();

        let keys = external_changes(&observed, &current, &written);
        assert_eq!(keys, BTreeSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn test_set_does_not_wait_for_synchronize() {
        let dir = tempfile::tempdir().unwrap();
        let replica = FileReplica::open(dir.path(), POLL).await.unwrap();
        replica.shutdown().await;

        // An earlier synchronize is still busy with the directory.
        let busy = replica.inner.sync_lock.lock().await;
        let sync = tokio::spawn({
            let replica = replica.clone();
            async move { replica.synchronize().await }
        });
        tokio::task::yield_now().await;

        timeout(Duration::from_millis(500), replica.set("k", b"during"))
            .await
            .expect("set blocked behind synchronize")
            .unwrap();
        let cached = timeout(Duration::from_millis(500), replica.get("k"))
            .await
            .expect("get blocked behind synchronize")
            .unwrap();
        assert_eq!(cached, Some(b"during".to_vec()));

        drop(busy);
        sync.await.unwrap().unwrap();
        assert_eq!(std::fs::read(dir.path().join("k.blob")).unwrap(), b"during");
        assert_eq!(replica.get("k").await.unwrap(), Some(b"during".to_vec()));
    }

    #[tokio::test]
    async fn test_large_directory_does_not_stall_writes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.blob"), vec![7u8; 16 * 1024 * 1024]).unwrap();
        let replica = FileReplica::open(dir.path(), Duration::from_secs(3600))
            .await
            .unwrap();

        let sync = tokio::spawn({
            let replica = replica.clone();
            async move { replica.synchronize().await }
        });
        tokio::task::yield_now().await;

        timeout(Duration::from_secs(5), replica.set("k", b"second"))
            .await
            .expect("set blocked behind synchronize")
            .unwrap();
        sync.await.unwrap().unwrap();

        replica.synchronize().await.unwrap();
        assert_eq!(replica.get("k").await.unwrap(), Some(b"second".to_vec()));
        replica.shutdown().await;
    }

    #[tokio::test]
    async fn test_dotted_keys_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let replica = FileReplica::open(dir.path(), POLL).await.unwrap();
        replica.shutdown().await;

        replica
            .set("vitrine.commerce.remote.v1", b"snapshot")
            .await
            .unwrap();
        replica.synchronize().await.unwrap();
        assert_eq!(
            replica.get("vitrine.commerce.remote.v1").await.unwrap(),
            Some(b"snapshot".to_vec())
        );

        // A leading dot would collide with temp files and never be scanned back.
        assert!(matches!(
            replica.set(".snap", b"v").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share");
        let replica = FileReplica::open(&path, POLL).await.unwrap();
        replica.shutdown().await;

        std::fs::remove_dir_all(&path).unwrap();
        assert!(matches!(
            replica.synchronize().await,
            Err(StoreError::ReplicaUnavailable(_))
        ));
    }
}
