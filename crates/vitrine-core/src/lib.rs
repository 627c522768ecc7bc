//! # vitrine-core: Pure Commerce State for Vitrine
//!
//! This crate holds the storefront's client-side commerce state and every
//! rule about it, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vitrine Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront UI                                │   │
//! │  │    Catalog ──► Product Page ──► Orders ──► Admin Panel          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ StoreHandle                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              vitrine-store (Persistence Layer)                  │   │
//! │  │     hydrate, persist, reconcile, local + remote backends        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ vitrine-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  catalog  │  │   state   │  │ snapshot  │  │   │
//! │  │   │  Product  │  │  Catalog  │  │ Commerce- │  │  Snapshot │  │   │
//! │  │   │   Order   │  │  Static-  │  │   State   │  │  encode/  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  │  decode   │  │   │
//! │  │                                                └───────────┘  │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ProductRef, Product, Order, OrderStatus, AdminFlags)
//! - [`money`] - Money type with integer cents
//! - [`catalog`] - Read-only product lookup
//! - [`state`] - CommerceState: queries, mutations, derived views
//! - [`snapshot`] - Versioned snapshot codec
//! - [`error`] - Domain error types
//! - [`validation`] - Input normalisation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use vitrine_core::{CommerceState, OrderStatus, Product, ProductRef, StaticCatalog};
//!
//! let catalog = StaticCatalog::new(vec![Product::new("dock", "Charging Dock", 3_900)]).unwrap();
//! let dock = ProductRef::new("dock");
//!
//! let mut state = CommerceState::new();
//! state.add_one(&dock);
//! state.create_order(&dock, Utc::now());
//!
//! assert_eq!(state.quantity(&dock), 1);
//! assert_eq!(state.last_order(&dock).unwrap().status, OrderStatus::Processing);
//! assert_eq!(state.total_spent(&catalog).cents(), 3_900);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod money;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{Catalog, StaticCatalog};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use snapshot::{Snapshot, SnapshotOrder, SNAPSHOT_VERSION};
pub use state::{CommerceState, RestoreReport, DEFAULT_FIRMWARE_VERSION};
pub use types::*;
