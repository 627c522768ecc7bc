//! # Domain Types
//!
//! Core domain types used throughout the Vitrine store.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ProductRef    │   │    Product      │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  opaque string  │──►│  id (ref)       │◄──│  id (UUID)      │       │
//! │  │  catalog key    │   │  name           │   │  product_ref    │       │
//! │  └─────────────────┘   │  price_cents    │   │  created_at     │       │
//! │                        └─────────────────┘   │  status         │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────────────────────────────┐ ┌─────────────────┐       │
//! │  │ OrderStatus (ordered, terminal last)    │ │   AdminFlags    │       │
//! │  │ Processing → PreparingForShipment →     │ │  is_featured    │       │
//! │  │ Shipped → Delivered                     │ │  is_hidden      │       │
//! │  └─────────────────────────────────────────┘ │  badge          │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference, Not Copy
//! Store state only ever holds `ProductRef`s. Product data lives in the
//! catalog and is looked up at read time, so catalog edits never require a
//! snapshot migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Product Reference
// =============================================================================

/// Stable identifier of a catalog product.
///
/// Serializes as a bare string, so it can key JSON maps in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductRef(String);

impl ProductRef {
    /// Wraps a catalog key.
    pub fn new(id: impl Into<String>) -> Self {
        ProductRef(id.into())
    }

    /// Returns the raw key.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductRef {
    fn from(id: &str) -> Self {
        ProductRef::new(id)
    }
}

impl From<String> for ProductRef {
    fn from(id: String) -> Self {
        ProductRef(id)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product record.
///
/// Read-only from the store's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog key.
    pub id: ProductRef,

    /// Display name; derived lists sort by this.
    pub name: String,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Optional marketing copy.
    pub description: Option<String>,

    /// Optional catalog category ("headsets", "controllers", ...).
    pub category: Option<String>,
}

impl Product {
    /// Creates a product with no description or category.
    pub fn new(id: impl Into<ProductRef>, name: impl Into<String>, price_cents: i64) -> Self {
        Product {
            id: id.into(),
            name: name.into(),
            price_cents,
            description: None,
            category: None,
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order.
///
/// ## Lifecycle
/// ```text
/// Processing ──► PreparingForShipment ──► Shipped ──► Delivered (terminal)
/// ```
///
/// Variant order is the lifecycle order, so `Ord` compares progress.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, payment being processed.
    #[default]
    Processing,
    /// Warehouse is packing the order.
    PreparingForShipment,
    /// Handed over to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Processing,
        OrderStatus::PreparingForShipment,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    /// Stable name used in persisted snapshots.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::PreparingForShipment => "preparing_for_shipment",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// The following status; `Delivered` stays `Delivered`.
    pub const fn next(&self) -> OrderStatus {
        match self {
            OrderStatus::Processing => OrderStatus::PreparingForShipment,
            OrderStatus::PreparingForShipment => OrderStatus::Shipped,
            OrderStatus::Shipped | OrderStatus::Delivered => OrderStatus::Delivered,
        }
    }

    /// Returns true once no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownOrderStatus(s.to_string()))
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order placed for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique identifier (UUID v4). Not persisted; regenerated on hydrate.
    pub id: String,

    /// Ordered product.
    pub product_ref: ProductRef,

    /// When the order was placed.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Current fulfilment status.
    pub status: OrderStatus,
}

impl Order {
    /// Creates a `Processing` order with a fresh id.
    pub fn new(product_ref: ProductRef, created_at: DateTime<Utc>) -> Self {
        Self::with_status(product_ref, created_at, OrderStatus::Processing)
    }

    /// Creates an order in a given status (used when restoring snapshots).
    pub fn with_status(
        product_ref: ProductRef,
        created_at: DateTime<Utc>,
        status: OrderStatus,
    ) -> Self {
        Order {
            id: Uuid::new_v4().to_string(),
            product_ref,
            created_at,
            status,
        }
    }

    /// Moves the order one step along its lifecycle and returns the new status.
    pub fn advance(&mut self) -> OrderStatus {
        self.status = self.status.next();
        self.status
    }
}

// =============================================================================
// Admin Flags
// =============================================================================

/// Per-product admin metadata, as seen by the storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdminFlags {
    /// At most one product is featured at a time.
    pub is_featured: bool,

    /// Hidden products are left out of `visible_products`.
    pub is_hidden: bool,

    /// Trimmed, non-empty badge label ("New", "Sale", ...).
    pub badge: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
