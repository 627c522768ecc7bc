//! # Store Events
//!
//! Observability hook for the commerce store.
//!
//! Mutations never fail from the caller's point of view: persistence
//! problems are absorbed and logged. An embedding app that wants to surface
//! them ("changes not saved", a sync badge) installs a [`StoreEventEmitter`].
//!
//! ```text
//! ┌───────────────┐   Hydrated / Persisted / PersistFailed /   ┌──────────┐
//! │  store task   │ ─────────────────────────────────────────► │ emitter  │
//! │               │   Reconciled / ReconcileSkipped            │ (app UI) │
//! └───────────────┘                                            └──────────┘
//! ```
//!
//! Emitters are called from the store task and must not block.

use std::fmt;

use vitrine_core::RestoreReport;

/// Which source the state was hydrated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationSource {
    Remote,
    Local,
    Empty,
}

impl fmt::Display for HydrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HydrationSource::Remote => write!(f, "remote"),
            HydrationSource::Local => write!(f, "local"),
            HydrationSource::Empty => write!(f, "empty"),
        }
    }
}

/// The persistence step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    Encode,
    Local,
    Remote,
}

impl fmt::Display for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistStage::Encode => write!(f, "encode"),
            PersistStage::Local => write!(f, "local"),
            PersistStage::Remote => write!(f, "remote"),
        }
    }
}

/// Something the store task did in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Initial state loaded.
    Hydrated {
        source: HydrationSource,
        report: RestoreReport,
    },

    /// A snapshot reached the local store (and was handed to the replica).
    Persisted { bytes: usize },

    /// A persistence step failed; the state in memory is unaffected.
    PersistFailed { stage: PersistStage, message: String },

    /// State was replaced by an externally changed snapshot.
    Reconciled { report: RestoreReport },

    /// An external change was signalled but no usable snapshot was found.
    ReconcileSkipped { reason: String },
}

/// Receives store events.
pub trait StoreEventEmitter: Send + Sync {
    fn emit(&self, event: StoreEvent);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl StoreEventEmitter for NoOpEmitter {
    fn emit(&self, _event: StoreEvent) {}
}
