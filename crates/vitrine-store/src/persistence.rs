//! # Persistence Protocol
//!
//! Hydration, persistence and reconciliation of the commerce state against
//! the local store and the remote replica.
//!
//! ## Persist (after every mutation)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. snapshot = state.to_snapshot()                                      │
//! │  2. bytes = snapshot.encode()          ── fails → abandon, warn        │
//! │  3. local.set(local_key, bytes).await  ── durability boundary          │
//! │  4. remote.set(remote_key, bytes).await (cache write)                  │
//! │  5. spawn(remote.synchronize())        ── fire-and-forget              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Hydrate (once, at startup)
//! ```text
//!  remote.synchronize() ──► decodable remote snapshot? ── yes ──► use it
//!                                      │ no
//!                                      ▼
//!                           decodable local snapshot?  ── yes ──► use it
//!                                      │ no
//!                                      ▼
//!                                 empty state
//! ```
//!
//! ## Reconcile (on external change)
//! `synchronize`, then a decodable remote snapshot replaces the state
//! wholesale. There is no field-level merge: concurrent edits on two devices
//! resolve to whichever snapshot lands last.
//!
//! Every failure here is soft. It is logged, reported to the emitter, and the
//! next fallback is tried; none of it reaches `StoreHandle` callers.

use std::sync::Arc;
use tracing::{debug, info, warn};

use vitrine_core::{Catalog, CommerceState, RestoreReport, Snapshot};

use crate::backend::{LocalStore, RemoteReplica};
use crate::config::StoreKeys;
use crate::error::StoreResult;
use crate::events::{HydrationSource, PersistStage, StoreEvent, StoreEventEmitter};

/// The two backends plus the keys and emitter used with them.
#[derive(Clone)]
pub struct Persistence {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteReplica>,
    keys: StoreKeys,
    emitter: Arc<dyn StoreEventEmitter>,
}

impl Persistence {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteReplica>,
        keys: StoreKeys,
        emitter: Arc<dyn StoreEventEmitter>,
    ) -> Self {
        Persistence {
            local,
            remote,
            keys,
            emitter,
        }
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    pub fn remote(&self) -> &Arc<dyn RemoteReplica> {
        &self.remote
    }

    // =========================================================================
    // Hydrate
    // =========================================================================

    /// Loads the initial state: remote, then local, then empty.
    pub async fn hydrate(&self, catalog: &dyn Catalog) -> (CommerceState, HydrationSource) {
        if let Err(e) = self.remote.synchronize().await {
            warn!(error = %e, "Replica synchronize failed before hydration, using cached value");
        }

        let sources: [(HydrationSource, StoreResult<Option<Vec<u8>>>); 2] = [
            (HydrationSource::Remote, self.remote.get(&self.keys.remote).await),
            (HydrationSource::Local, self.local.get(&self.keys.local).await),
        ];

        for (source, read) in sources {
            let bytes = match read {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(%source, "No snapshot stored");
                    continue;
                }
                Err(e) => {
                    warn!(%source, error = %e, "Snapshot read failed");
                    continue;
                }
            };

            match Snapshot::decode(&bytes) {
                Ok(snapshot) => {
                    let (state, report) = CommerceState::from_snapshot(&snapshot, catalog);
                    log_restore(&report);
                    info!(%source, orders = state.orders().len(), "Commerce state hydrated");
                    self.emitter.emit(StoreEvent::Hydrated { source, report });
                    return (state, source);
                }
                Err(e) => {
                    warn!(%source, error = %e, "Stored snapshot is unusable, trying next source");
                }
            }
        }

        info!("No usable snapshot, starting with empty commerce state");
        self.emitter.emit(StoreEvent::Hydrated {
            source: HydrationSource::Empty,
            report: RestoreReport::default(),
        });
        (CommerceState::new(), HydrationSource::Empty)
    }

    // =========================================================================
    // Persist
    // =========================================================================

    /// Writes a snapshot of `state` to both backends.
    ///
    /// Returns once the local write has completed (or failed). The replica
    /// synchronize is spawned and not awaited.
    pub async fn persist(&self, state: &CommerceState) {
        let bytes = match state.to_snapshot().encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Snapshot encode failed, persist abandoned");
                self.failed(PersistStage::Encode, e.to_string());
                return;
            }
        };

        // A failed local write does not stop the replica write.
        let local_ok = match self.local.set(&self.keys.local, &bytes).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key = %self.keys.local, "Local snapshot write failed");
                self.failed(PersistStage::Local, e.to_string());
                false
            }
        };

        match self.remote.set(&self.keys.remote, &bytes).await {
            Ok(()) => {
                let remote = Arc::clone(&self.remote);
                let emitter = Arc::clone(&self.emitter);
                tokio::spawn(async move {
                    if let Err(e) = remote.synchronize().await {
                        debug!(error = %e, "Replica synchronize failed, next mutation will retry");
                        emitter.emit(StoreEvent::PersistFailed {
                            stage: PersistStage::Remote,
                            message: e.to_string(),
                        });
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, key = %self.keys.remote, "Replica snapshot write failed");
                self.failed(PersistStage::Remote, e.to_string());
            }
        }

        if local_ok {
            debug!(bytes = bytes.len(), "Snapshot persisted");
            self.emitter.emit(StoreEvent::Persisted { bytes: bytes.len() });
        }
    }

    fn failed(&self, stage: PersistStage, message: String) {
        self.emitter
            .emit(StoreEvent::PersistFailed { stage, message });
    }

    // =========================================================================
    // Reconcile
    // =========================================================================

    /// Pulls the replica and returns the state its snapshot describes, if it
    /// holds a usable one.
    pub async fn reconcile(&self, catalog: &dyn Catalog) -> Option<CommerceState> {
        if let Err(e) = self.remote.synchronize().await {
            warn!(error = %e, "Replica synchronize failed during reconciliation");
        }

        let skipped = |reason: String| {
            debug!(reason = %reason, "Reconciliation skipped");
            self.emitter.emit(StoreEvent::ReconcileSkipped { reason });
            None
        };

        let bytes = match self.remote.get(&self.keys.remote).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return skipped("no remote snapshot".to_string()),
            Err(e) => return skipped(e.to_string()),
        };

        match Snapshot::decode(&bytes) {
            Ok(snapshot) => {
                let (state, report) = CommerceState::from_snapshot(&snapshot, catalog);
                log_restore(&report);
                info!("Commerce state replaced by external snapshot");
                self.emitter.emit(StoreEvent::Reconciled { report });
                Some(state)
            }
            Err(e) => {
                warn!(error = %e, "External snapshot is unusable, keeping current state");
                skipped(e.to_string())
            }
        }
    }
}

fn log_restore(report: &RestoreReport) {
    if report.dropped_orders() > 0 {
        debug!(
            unresolved = report.unresolved_orders,
            unknown_status = report.unknown_status_orders,
            "Dropped orders during snapshot restore"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
