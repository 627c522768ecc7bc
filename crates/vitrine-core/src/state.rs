//! # Commerce State
//!
//! The in-memory commerce state of one user session, with every query,
//! mutation and derived view. Pure: persistence happens in `vitrine-store`,
//! which snapshots this state after each mutation.
//!
//! ## Entities
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CommerceState                                    │
//! │                                                                         │
//! │  acquired   ProductRef → qty ≥ 1      (absent ⇔ qty 0)                  │
//! │  wishlist   {ProductRef}                                                │
//! │  firmware   ProductRef → version      (absent ⇔ version 1)              │
//! │  orders     [Order]                   (most recent first)               │
//! │  featured   Option<ProductRef>        (0 or 1 featured, by type)        │
//! │  hidden     {ProductRef}                                                │
//! │  badges     ProductRef → label        (trimmed, never empty)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Conversion
//! `to_snapshot` always builds a complete snapshot from scratch.
//! `from_snapshot` is the inverse, except that orders whose product is gone
//! from the catalog, or whose status name is unknown, are dropped.
//!
//! Replacing state from a snapshot is wholesale: there is no field-level
//! merge. Concurrent edits on two devices resolve to whichever snapshot is
//! adopted last.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::catalog::Catalog;
use crate::money::Money;
use crate::snapshot::{Snapshot, SnapshotOrder, SNAPSHOT_VERSION};
use crate::types::{AdminFlags, Order, OrderStatus, Product, ProductRef};
use crate::validation::normalize_badge;

/// Firmware version of a product that was never updated.
pub const DEFAULT_FIRMWARE_VERSION: u32 = 1;

// =============================================================================
// Restore Report
// =============================================================================

/// What was lost while rebuilding state from a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Orders whose product no longer resolves in the catalog.
    pub unresolved_orders: usize,

    /// Orders whose status name is not a known [`OrderStatus`].
    pub unknown_status_orders: usize,
}

impl RestoreReport {
    /// Total orders dropped.
    pub fn dropped_orders(&self) -> usize {
        self.unresolved_orders + self.unknown_status_orders
    }
}

// =============================================================================
// Commerce State
// =============================================================================

/// All mutable commerce state for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommerceState {
    acquired: BTreeMap<ProductRef, u32>,
    wishlist: BTreeSet<ProductRef>,
    firmware: BTreeMap<ProductRef, u32>,
    orders: Vec<Order>,
    featured: Option<ProductRef>,
    hidden: BTreeSet<ProductRef>,
    badges: BTreeMap<ProductRef, String>,
}

impl CommerceState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Acquisition Ledger
    // =========================================================================

    /// Owned quantity, 0 if never acquired.
    pub fn quantity(&self, product_ref: &ProductRef) -> u32 {
        self.acquired.get(product_ref).copied().unwrap_or(0)
    }

    /// Adds one unit and returns the new quantity.
    pub fn add_one(&mut self, product_ref: &ProductRef) -> u32 {
        let quantity = self.acquired.entry(product_ref.clone()).or_insert(0);
        *quantity = quantity.saturating_add(1);
        *quantity
    }

    /// Removes the ledger entry entirely. Returns the quantity that was held.
    pub fn remove_all(&mut self, product_ref: &ProductRef) -> u32 {
        self.acquired.remove(product_ref).unwrap_or(0)
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    pub fn is_wishlisted(&self, product_ref: &ProductRef) -> bool {
        self.wishlist.contains(product_ref)
    }

    /// Flips wishlist membership and returns the new membership.
    pub fn toggle_wishlist(&mut self, product_ref: &ProductRef) -> bool {
        if self.wishlist.remove(product_ref) {
            false
        } else {
            self.wishlist.insert(product_ref.clone());
            true
        }
    }

    // =========================================================================
    // Firmware
    // =========================================================================

    /// Installed firmware version; [`DEFAULT_FIRMWARE_VERSION`] when never updated.
    pub fn current_firmware(&self, product_ref: &ProductRef) -> u32 {
        self.firmware
            .get(product_ref)
            .copied()
            .unwrap_or(DEFAULT_FIRMWARE_VERSION)
    }

    /// Bumps the firmware version by one and returns it.
    pub fn update_firmware(&mut self, product_ref: &ProductRef) -> u32 {
        let version = self
            .firmware
            .entry(product_ref.clone())
            .or_insert(DEFAULT_FIRMWARE_VERSION);
        *version = version.saturating_add(1);
        *version
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Places a `Processing` order at the head of the list.
    pub fn create_order(&mut self, product_ref: &ProductRef, created_at: DateTime<Utc>) -> Order {
        let order = Order::new(product_ref.clone(), created_at);
        self.orders.insert(0, order.clone());
        order
    }

    /// Every order, most recent first.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders for one product, most recent first.
    pub fn orders_for<'a>(
        &'a self,
        product_ref: &'a ProductRef,
    ) -> impl Iterator<Item = &'a Order> {
        self.orders
            .iter()
            .filter(move |order| &order.product_ref == product_ref)
    }

    /// The order with the latest `created_at` for a product.
    ///
    /// On equal timestamps the one placed later (nearer the head) wins.
    pub fn last_order(&self, product_ref: &ProductRef) -> Option<&Order> {
        self.orders
            .iter()
            .filter(|order| &order.product_ref == product_ref)
            .fold(None, |latest: Option<&Order>, order| match latest {
                Some(current) if current.created_at >= order.created_at => Some(current),
                _ => Some(order),
            })
    }

    /// Advances an order's status. `None` if no order has that id.
    pub fn advance_order(&mut self, order_id: &str) -> Option<OrderStatus> {
        self.orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .map(Order::advance)
    }

    // =========================================================================
    // Admin Metadata
    // =========================================================================

    /// The featured product, if any.
    pub fn featured(&self) -> Option<&ProductRef> {
        self.featured.as_ref()
    }

    pub fn is_featured(&self, product_ref: &ProductRef) -> bool {
        self.featured.as_ref() == Some(product_ref)
    }

    /// Features one product (un-featuring every other) or clears the flag.
    pub fn set_featured(&mut self, product_ref: Option<ProductRef>) {
        self.featured = product_ref;
    }

    pub fn is_hidden(&self, product_ref: &ProductRef) -> bool {
        self.hidden.contains(product_ref)
    }

    pub fn set_hidden(&mut self, product_ref: &ProductRef, hidden: bool) {
        if hidden {
            self.hidden.insert(product_ref.clone());
        } else {
            self.hidden.remove(product_ref);
        }
    }

    pub fn badge(&self, product_ref: &ProductRef) -> Option<&str> {
        self.badges.get(product_ref).map(String::as_str)
    }

    /// Sets or clears a badge. Whitespace-only labels clear it.
    pub fn set_badge(&mut self, product_ref: &ProductRef, label: Option<&str>) {
        match normalize_badge(label) {
            Some(label) => {
                self.badges.insert(product_ref.clone(), label);
            }
            None => {
                self.badges.remove(product_ref);
            }
        }
    }

    /// All admin metadata for one product.
    pub fn admin_flags(&self, product_ref: &ProductRef) -> AdminFlags {
        AdminFlags {
            is_featured: self.is_featured(product_ref),
            is_hidden: self.is_hidden(product_ref),
            badge: self.badge(product_ref).map(str::to_string),
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Clears every entity.
    pub fn reset_all(&mut self) {
        *self = CommerceState::default();
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    /// Acquired products, resolved through the catalog, sorted by name.
    pub fn acquired_products(&self, catalog: &dyn Catalog) -> Vec<Product> {
        resolve_sorted(catalog, self.acquired.keys())
    }

    /// Wishlisted products, resolved through the catalog, sorted by name.
    pub fn wishlisted_products(&self, catalog: &dyn Catalog) -> Vec<Product> {
        resolve_sorted(catalog, self.wishlist.iter())
    }

    /// Catalog products that are not hidden, in catalog order.
    pub fn visible_products(&self, catalog: &dyn Catalog) -> Vec<Product> {
        catalog
            .all()
            .iter()
            .filter(|product| !self.is_hidden(&product.id))
            .cloned()
            .collect()
    }

    /// The featured product, if it resolves.
    pub fn featured_product(&self, catalog: &dyn Catalog) -> Option<Product> {
        self.featured
            .as_ref()
            .and_then(|product_ref| catalog.resolve(product_ref))
            .cloned()
    }

    /// Σ unit price × quantity over the ledger. Unresolvable refs count as 0.
    pub fn total_spent(&self, catalog: &dyn Catalog) -> Money {
        self.acquired
            .iter()
            .filter_map(|(product_ref, &quantity)| {
                catalog
                    .resolve(product_ref)
                    .map(|product| product.price() * quantity)
            })
            .sum()
    }

    // =========================================================================
    // Snapshot Conversion
    // =========================================================================

    /// Builds a complete snapshot of the current state.
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            acquired: self.acquired.clone(),
            wishlist: self.wishlist.iter().cloned().collect(),
            firmware_versions: self.firmware.clone(),
            orders: self
                .orders
                .iter()
                .map(|order| SnapshotOrder {
                    product_ref: order.product_ref.clone(),
                    created_at: order.created_at,
                    status: order.status.as_str().to_string(),
                })
                .collect(),
            featured_product_ref: self.featured.clone(),
            hidden_product_refs: self.hidden.iter().cloned().collect(),
            badge_labels: self.badges.clone(),
        }
    }

    /// Rebuilds state from a snapshot.
    ///
    /// ## Lossy Recovery
    /// - Orders whose product does not resolve are dropped
    /// - Orders with an unknown status name are dropped
    /// - Zero ledger quantities and blank badges are dropped
    ///
    /// Ledger, wishlist and flag entries for unresolvable products are kept;
    /// derived views skip them, and they come back if the catalog does.
    pub fn from_snapshot(snapshot: &Snapshot, catalog: &dyn Catalog) -> (Self, RestoreReport) {
        let mut report = RestoreReport::default();

        let orders = snapshot
            .orders
            .iter()
            .filter_map(|persisted| {
                if catalog.resolve(&persisted.product_ref).is_none() {
                    report.unresolved_orders += 1;
                    return None;
                }
                match persisted.status.parse::<OrderStatus>() {
                    Ok(status) => Some(Order::with_status(
                        persisted.product_ref.clone(),
                        persisted.created_at,
                        status,
                    )),
                    Err(_) => {
                        report.unknown_status_orders += 1;
                        None
                    }
                }
            })
            .collect();

        let state = CommerceState {
            acquired: snapshot
                .acquired
                .iter()
                .filter(|(_, &quantity)| quantity > 0)
                .map(|(product_ref, &quantity)| (product_ref.clone(), quantity))
                .collect(),
            wishlist: snapshot.wishlist.iter().cloned().collect(),
            firmware: snapshot.firmware_versions.clone(),
            orders,
            featured: snapshot.featured_product_ref.clone(),
            hidden: snapshot.hidden_product_refs.iter().cloned().collect(),
            badges: snapshot
                .badge_labels
                .iter()
                .filter_map(|(product_ref, label)| {
                    normalize_badge(Some(label)).map(|label| (product_ref.clone(), label))
                })
                .collect(),
        };

        (state, report)
    }
}

/// Resolves refs through the catalog, skipping misses, stable-sorted by name.
fn resolve_sorted<'a>(
    catalog: &dyn Catalog,
    refs: impl Iterator<Item = &'a ProductRef>,
) -> Vec<Product> {
    let mut products: Vec<Product> = refs
        .filter_map(|product_ref| catalog.resolve(product_ref))
        .cloned()
        .collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    products
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use chrono::{Duration, TimeZone};

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            Product::new("headset", "Vision Headset", 49_900).with_category("headsets"),
            Product::new("controller", "Arc Controller", 12_900),
            Product::new("dock", "Charging Dock", 3_900),
            Product::new("strap", "Comfort Strap", 2_900),
        ])
        .unwrap()
    }

    fn r(id: &str) -> ProductRef {
        ProductRef::new(id)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_ledger_invariant() {
        let mut state = CommerceState::new();
        assert_eq!(state.quantity(&r("headset")), 0);

        assert_eq!(state.add_one(&r("headset")), 1);
        assert_eq!(state.add_one(&r("headset")), 2);
        assert_eq!(state.remove_all(&r("headset")), 2);

        assert_eq!(state.quantity(&r("headset")), 0);
        assert!(!state.to_snapshot().acquired.contains_key(&r("headset")));

        // removing something never acquired is harmless
        assert_eq!(state.remove_all(&r("dock")), 0);
        assert!(state.to_snapshot().acquired.is_empty());
    }

    #[test]
    fn test_wishlist_toggle_twice_restores_membership() {
        let mut state = CommerceState::new();
        assert!(state.toggle_wishlist(&r("dock")));
        assert!(state.is_wishlisted(&r("dock")));
        assert!(!state.toggle_wishlist(&r("dock")));
        assert!(!state.is_wishlisted(&r("dock")));
    }

    #[test]
    fn test_firmware_strictly_increases_from_default() {
        let mut state = CommerceState::new();
        assert_eq!(state.current_firmware(&r("headset")), DEFAULT_FIRMWARE_VERSION);
        assert!(state.to_snapshot().firmware_versions.is_empty());

        let versions: Vec<u32> = (0..4).map(|_| state.update_firmware(&r("headset"))).collect();
        assert_eq!(versions, vec![2, 3, 4, 5]);
        assert_eq!(state.current_firmware(&r("headset")), 5);
        assert_eq!(state.current_firmware(&r("controller")), 1);
    }

    #[test]
    fn test_single_featured_product() {
        let mut state = CommerceState::new();
        state.set_featured(Some(r("headset")));
        state.set_featured(Some(r("dock")));

        let featured: Vec<_> = catalog()
            .all()
            .iter()
            .filter(|p| state.is_featured(&p.id))
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(featured, vec![r("dock")]);

        state.set_featured(None);
        assert!(state.featured().is_none());
        assert!(!state.is_featured(&r("dock")));
    }

    #[test]
    fn test_badge_normalisation() {
        let mut state = CommerceState::new();
        state.set_badge(&r("dock"), Some("  "));
        assert_eq!(state.badge(&r("dock")), None);

        state.set_badge(&r("dock"), Some("  Sale "));
        assert_eq!(state.badge(&r("dock")), Some("Sale"));

        state.set_badge(&r("dock"), None);
        assert_eq!(state.badge(&r("dock")), None);
        assert!(state.to_snapshot().badge_labels.is_empty());
    }

    #[test]
    fn test_admin_flags() {
        let mut state = CommerceState::new();
        state.set_featured(Some(r("strap")));
        state.set_hidden(&r("strap"), true);
        state.set_badge(&r("strap"), Some("New"));

        assert_eq!(
            state.admin_flags(&r("strap")),
            AdminFlags {
                is_featured: true,
                is_hidden: true,
                badge: Some("New".to_string()),
            }
        );
        assert_eq!(state.admin_flags(&r("dock")), AdminFlags::default());

        state.set_hidden(&r("strap"), false);
        assert!(!state.is_hidden(&r("strap")));
    }

    #[test]
    fn test_last_order_is_most_recent_for_product() {
        let mut state = CommerceState::new();
        state.create_order(&r("headset"), at(1));
        state.create_order(&r("dock"), at(2));
        let latest = state.create_order(&r("headset"), at(3));
        state.create_order(&r("dock"), at(4));

        assert_eq!(state.last_order(&r("headset")).unwrap().id, latest.id);
        assert_eq!(state.orders().len(), 4);
        assert_eq!(state.orders()[0].product_ref, r("dock"));
        assert!(state.last_order(&r("strap")).is_none());
    }

    #[test]
    fn test_last_order_uses_timestamp_not_position() {
        let mut state = CommerceState::new();
        let newer = state.create_order(&r("headset"), at(30));
        // clock skew: placed later, stamped earlier
        state.create_order(&r("headset"), at(10));

        assert_eq!(state.last_order(&r("headset")).unwrap().id, newer.id);
    }

    #[test]
    fn test_advance_order_walks_lifecycle() {
        let mut state = CommerceState::new();
        let order = state.create_order(&r("controller"), at(0));

        assert_eq!(
            state.advance_order(&order.id),
            Some(OrderStatus::PreparingForShipment)
        );
        assert_eq!(state.advance_order(&order.id), Some(OrderStatus::Shipped));
        assert_eq!(state.advance_order(&order.id), Some(OrderStatus::Delivered));
        assert_eq!(state.advance_order(&order.id), Some(OrderStatus::Delivered));
        assert_eq!(state.advance_order("no-such-order"), None);
    }

    #[test]
    fn test_derived_views() {
        let catalog = catalog();
        let mut state = CommerceState::new();
        state.add_one(&r("headset"));
        state.add_one(&r("controller"));
        state.add_one(&r("controller"));
        state.add_one(&r("discontinued"));
        state.toggle_wishlist(&r("strap"));
        state.toggle_wishlist(&r("dock"));
        state.toggle_wishlist(&r("discontinued"));
        state.set_hidden(&r("dock"), true);

        let acquired: Vec<_> = state
            .acquired_products(&catalog)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(acquired, ["Arc Controller", "Vision Headset"]);

        let wishlisted: Vec<_> = state
            .wishlisted_products(&catalog)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(wishlisted, ["Charging Dock", "Comfort Strap"]);

        let visible: Vec<_> = state
            .visible_products(&catalog)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(visible, [r("headset"), r("controller"), r("strap")]);

        // 49_900 + 2 × 12_900; "discontinued" is skipped
        assert_eq!(state.total_spent(&catalog).cents(), 75_700);
    }

    #[test]
    fn test_scenario_add_then_order() {
        let catalog = catalog();
        let mut state = CommerceState::new();
        state.add_one(&r("controller"));
        state.create_order(&r("controller"), Utc::now());

        assert_eq!(state.quantity(&r("controller")), 1);
        assert_eq!(
            state.last_order(&r("controller")).unwrap().status,
            OrderStatus::Processing
        );
        assert_eq!(
            state.total_spent(&catalog),
            catalog.resolve(&r("controller")).unwrap().price()
        );
    }

    #[test]
    fn test_reset_all_clears_everything() {
        let catalog = catalog();
        let mut state = CommerceState::new();
        state.add_one(&r("headset"));
        state.toggle_wishlist(&r("dock"));
        state.update_firmware(&r("headset"));
        state.create_order(&r("headset"), at(5));
        state.set_featured(Some(r("dock")));
        state.set_hidden(&r("strap"), true);
        state.set_badge(&r("dock"), Some("Hot"));

        state.reset_all();

        assert!(state.acquired_products(&catalog).is_empty());
        assert!(state.wishlisted_products(&catalog).is_empty());
        assert!(state.orders().is_empty());
        assert!(state.total_spent(&catalog).is_zero());
        assert!(state.to_snapshot().is_empty());
        assert_eq!(state, CommerceState::new());
    }

    #[test]
    fn test_snapshot_round_trip_through_state() {
        let catalog = catalog();
        let mut state = CommerceState::new();
        state.add_one(&r("headset"));
        state.toggle_wishlist(&r("strap"));
        state.update_firmware(&r("controller"));
        let order = state.create_order(&r("dock"), at(7) + Duration::nanoseconds(123));
        state.advance_order(&order.id);
        state.set_featured(Some(r("headset")));
        state.set_hidden(&r("strap"), true);
        state.set_badge(&r("dock"), Some("Sale"));

        let snapshot = state.to_snapshot();
        let bytes = snapshot.encode().unwrap();
        let decoded = Snapshot::decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);

        let (restored, report) = CommerceState::from_snapshot(&decoded, &catalog);
        assert_eq!(report, RestoreReport::default());
        assert_eq!(restored.to_snapshot(), snapshot);
        assert_eq!(
            restored.last_order(&r("dock")).unwrap().status,
            OrderStatus::PreparingForShipment
        );
    }

    #[test]
    fn test_restore_drops_unresolvable_and_unknown_orders() {
        let catalog = catalog();
        let mut snapshot = Snapshot::default();
        snapshot.orders = vec![
            SnapshotOrder {
                product_ref: r("headset"),
                created_at: at(3),
                status: "shipped".to_string(),
            },
            SnapshotOrder {
                product_ref: r("discontinued"),
                created_at: at(2),
                status: "processing".to_string(),
            },
            SnapshotOrder {
                product_ref: r("dock"),
                created_at: at(1),
                status: "teleported".to_string(),
            },
        ];
        snapshot.acquired.insert(r("discontinued"), 1);
        snapshot.acquired.insert(r("dock"), 0);
        snapshot.badge_labels.insert(r("dock"), "   ".to_string());

        let (state, report) = CommerceState::from_snapshot(&snapshot, &catalog);

        assert_eq!(report.unresolved_orders, 1);
        assert_eq!(report.unknown_status_orders, 1);
        assert_eq!(report.dropped_orders(), 2);
        assert_eq!(state.orders().len(), 1);
        assert_eq!(state.orders()[0].status, OrderStatus::Shipped);

        // ledger keeps the unresolvable entry, drops the zero one
        assert_eq!(state.quantity(&r("discontinued")), 1);
        assert!(!state.to_snapshot().acquired.contains_key(&r("dock")));
        assert_eq!(state.badge(&r("dock")), None);
    }
}
