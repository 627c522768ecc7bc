//! # vitrine-store: Persistence and Sync for Vitrine
//!
//! Runs the commerce state of a session on a single task and keeps it in two
//! places: a durable local store and a remote replica shared with the user's
//! other devices.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Store Data Flow                                │
//! │                                                                         │
//! │  UI ── StoreHandle ──► store task ──► CommerceState (vitrine-core)      │
//! │                            │                                            │
//! │                            │ after every mutation                       │
//! │                            ▼                                            │
//! │            ┌───────────────┴────────────────┐                           │
//! │            ▼                                ▼                           │
//! │     LocalStore (awaited)          RemoteReplica (cache write,           │
//! │     SqliteLocalStore              synchronize fire-and-forget)          │
//! │                                   FileReplica                           │
//! │                                         │                               │
//! │            store task ◄── ReplicaChange ┘  (other device wrote)         │
//! │            reconcile: replace state wholesale                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`service`] - CommerceStore / StoreHandle (the store task)
//! - [`persistence`] - hydrate, persist, reconcile
//! - [`backend`] - LocalStore / RemoteReplica and their implementations
//! - [`config`] - TOML + environment configuration
//! - [`events`] - StoreEventEmitter observability hook
//! - [`error`] - StoreError

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod persistence;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    FileReplica, LocalStore, MemoryLocalStore, MemoryReplica, RemoteReplica, ReplicaChange,
    SqliteLocalStore,
};
pub use config::{StoreConfig, StoreKeys, DEFAULT_LOCAL_KEY, DEFAULT_REMOTE_KEY};
pub use error::{StoreError, StoreResult};
pub use events::{HydrationSource, NoOpEmitter, PersistStage, StoreEvent, StoreEventEmitter};
pub use service::{CommerceStore, StoreHandle, StoreOptions};
