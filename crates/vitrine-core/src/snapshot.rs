//! # Snapshot Model
//!
//! The complete, versioned, serializable projection of store state. This is
//! the only thing that ever crosses a persistence boundary.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {                                                                      │
//! │    "version": 1,                          ◄── checked before decoding  │
//! │    "acquired": { "vr-headset": 2 },       ◄── quantity ≥ 1 only        │
//! │    "wishlist": ["controller"],                                          │
//! │    "firmwareVersions": { "vr-headset": 3 },                             │
//! │    "orders": [{ "productRef": "vr-headset",                             │
//! │                 "createdAt": "2026-10-15T09:30:00Z",                    │
//! │                 "status": "shipped" }],   ◄── most recent first         │
//! │    "featuredProductRef": null,                                          │
//! │    "hiddenProductRefs": [],                                             │
//! │    "badgeLabels": { "controller": "New" }                               │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Orders are stored as (ref, timestamp, status-name) triples. The status is
//! kept as a plain string here so that an unknown name drops one order during
//! reconstruction instead of failing the whole decode.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::ProductRef;

/// Schema version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

// =============================================================================
// Snapshot
// =============================================================================

/// Full store state at one instant. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Schema version; must equal [`SNAPSHOT_VERSION`] to decode.
    pub version: u32,

    /// Acquisition ledger.
    pub acquired: BTreeMap<ProductRef, u32>,

    /// Wishlist (set semantics).
    pub wishlist: Vec<ProductRef>,

    /// Explicit firmware versions. Missing means version 1.
    pub firmware_versions: BTreeMap<ProductRef, u32>,

    /// Orders, most recent first.
    pub orders: Vec<SnapshotOrder>,

    /// The single featured product, if any.
    pub featured_product_ref: Option<ProductRef>,

    /// Hidden products (set semantics).
    pub hidden_product_refs: Vec<ProductRef>,

    /// Non-empty, trimmed badge labels.
    pub badge_labels: BTreeMap<ProductRef, String>,
}

/// Persisted form of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOrder {
    pub product_ref: ProductRef,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub status: String,
}

/// Only the version field, read before attempting a full decode.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            acquired: BTreeMap::new(),
            wishlist: Vec::new(),
            firmware_versions: BTreeMap::new(),
            orders: Vec::new(),
            featured_product_ref: None,
            hidden_product_refs: Vec::new(),
            badge_labels: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Encodes the snapshot as JSON bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::Encode(e.to_string()))
    }

    /// Decodes JSON bytes, rejecting other schema versions.
    ///
    /// ## Failure Modes
    /// - Not JSON / no `version` field → `CoreError::Decode`
    /// - `version` ≠ [`SNAPSHOT_VERSION`] → `CoreError::UnsupportedVersion`
    /// - Right version, wrong shape → `CoreError::Decode`
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let probe: VersionProbe =
            serde_json::from_slice(bytes).map_err(|e| CoreError::Decode(e.to_string()))?;

        if probe.version != SNAPSHOT_VERSION {
            return Err(CoreError::UnsupportedVersion {
                found: probe.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        serde_json::from_slice(bytes).map_err(|e| CoreError::Decode(e.to_string()))
    }

    /// Returns true if the snapshot holds no state at all.
    pub fn is_empty(&self) -> bool {
        self.acquired.is_empty()
            && self.wishlist.is_empty()
            && self.firmware_versions.is_empty()
            && self.orders.is_empty()
            && self.featured_product_ref.is_none()
            && self.hidden_product_refs.is_empty()
            && self.badge_labels.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
