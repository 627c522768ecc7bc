//! # Commerce Store Service
//!
//! Owns the [`CommerceState`] of a session on a single Tokio task and exposes
//! it through a cloneable [`StoreHandle`].
//!
//! ## Task Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Commerce Store Task                              │
//! │                                                                         │
//! │  StoreHandle (clone per UI component)                                  │
//! │       │                                                                 │
//! │       │ mpsc: Read / Mutate / Reconcile / Shutdown                     │
//! │       ▼                                                                 │
//! │  ┌────────────────────────────── select! ───────────────────────────┐  │
//! │  │                                                                  │  │
//! │  │  Read(f)      → f(&state, catalog) → reply                       │  │
//! │  │  Mutate(f)    → f(&mut state) → persist (local awaited) → reply  │  │
//! │  │  ReplicaChange→ synchronize → decode → replace state wholesale   │  │
//! │  │                                                                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │       ▲                                                                 │
//! │       │ broadcast: ReplicaChange { keys }                              │
//! │  RemoteReplica (watcher / other devices)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything touching the state runs on this one task, one step at a time.
//! A reconciliation therefore lands between two commands, never inside one,
//! and no reader observes a half-replaced state.
//!
//! ## Usage
//! ```rust,ignore
//! let handle = CommerceStore::spawn(catalog, local, remote, keys, StoreOptions::default()).await?;
//!
//! handle.add_one(&"vr-headset".into()).await?;   // returns after the local write
//! let total = handle.total_spent().await?;
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use vitrine_core::{
    AdminFlags, Catalog, CommerceState, Money, Order, OrderStatus, Product, ProductRef, Snapshot,
};

use crate::backend::{open_configured, LocalStore, RemoteReplica, ReplicaChange};
use crate::config::{ServiceSettings, StoreConfig, StoreKeys};
use crate::error::{StoreError, StoreResult};
use crate::events::{HydrationSource, NoOpEmitter, StoreEventEmitter};
use crate::persistence::Persistence;

// =============================================================================
// Options
// =============================================================================

/// Options for [`CommerceStore::spawn`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Capacity of the command channel.
    pub command_buffer: usize,

    /// Receives background persistence events.
    pub emitter: Arc<dyn StoreEventEmitter>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            command_buffer: ServiceSettings::default().command_buffer,
            emitter: Arc::new(NoOpEmitter),
        }
    }
}

impl StoreOptions {
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        StoreOptions {
            command_buffer: settings.command_buffer,
            ..Default::default()
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn StoreEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }
}

// =============================================================================
// Commands
// =============================================================================

type Reply = Box<dyn FnOnce() + Send>;

enum Command {
    Read(Box<dyn FnOnce(&CommerceState, &dyn Catalog) + Send>),
    Mutate(Box<dyn FnOnce(&mut CommerceState) -> Reply + Send>),
    Reconcile(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<()>),
}

/// One thing for the task loop to handle.
enum Step {
    Command(Command),
    Change(ChangeSignal),
}

enum ChangeSignal {
    Changed(ReplicaChange),
    Lagged(u64),
    Closed,
}

// =============================================================================
// Commerce Store
// =============================================================================

/// Entry point for starting a store task.
pub struct CommerceStore;

impl CommerceStore {
    /// Hydrates the state and spawns the store task.
    ///
    /// Subscribes to replica changes before hydrating so that a change landing
    /// during hydration is not lost.
    pub async fn spawn(
        catalog: Arc<dyn Catalog>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteReplica>,
        keys: StoreKeys,
        options: StoreOptions,
    ) -> StoreResult<StoreHandle> {
        keys.validate()?;
        if options.command_buffer == 0 {
            return Err(StoreError::InvalidConfig(
                "command_buffer must be greater than 0".into(),
            ));
        }

        let changes = remote.subscribe();
        let persistence = Persistence::new(local, remote, keys, options.emitter);
        let (state, hydrated_from) = persistence.hydrate(catalog.as_ref()).await;

        let (tx, rx) = mpsc::channel(options.command_buffer);
        let task = StoreTask {
            state,
            catalog,
            persistence,
            commands: rx,
            changes: Some(changes),
        };
        tokio::spawn(task.run());

        Ok(StoreHandle { tx, hydrated_from })
    }

    /// Opens the backends named by `config` and spawns a store over them.
    pub async fn open(
        config: &StoreConfig,
        catalog: Arc<dyn Catalog>,
        emitter: Arc<dyn StoreEventEmitter>,
    ) -> StoreResult<StoreHandle> {
        config.validate()?;
        let (local, remote) = open_configured(config).await?;
        let options = StoreOptions::from_settings(&config.service).with_emitter(emitter);
        Self::spawn(catalog, local, remote, config.keys.clone(), options).await
    }
}

// =============================================================================
// Store Task
// =============================================================================

struct StoreTask {
    state: CommerceState,
    catalog: Arc<dyn Catalog>,
    persistence: Persistence,
    commands: mpsc::Receiver<Command>,
    changes: Option<broadcast::Receiver<ReplicaChange>>,
}

impl StoreTask {
    async fn run(mut self) {
        info!("Commerce store task started");

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => {
                        debug!("All store handles dropped");
                        break;
                    }
                },
                signal = next_change(&mut self.changes) => Step::Change(signal),
            };

            match step {
                Step::Command(Command::Read(read)) => read(&self.state, self.catalog.as_ref()),

                Step::Command(Command::Mutate(mutate)) => {
                    let reply = mutate(&mut self.state);
                    self.persistence.persist(&self.state).await;
                    reply();
                }

                Step::Command(Command::Reconcile(reply)) => {
                    let replaced = self.reconcile().await;
                    let _ = reply.send(replaced);
                }

                Step::Command(Command::Shutdown(reply)) => {
                    let _ = reply.send(());
                    break;
                }

                Step::Change(ChangeSignal::Changed(change)) => {
                    if change.touches(&self.persistence.keys().remote) {
                        self.reconcile().await;
                    } else {
                        debug!(keys = ?change.keys, "Ignoring change to unrelated keys");
                    }
                }

                Step::Change(ChangeSignal::Lagged(missed)) => {
                    debug!(missed, "Replica notifications lagged, reconciling");
                    self.reconcile().await;
                }

                Step::Change(ChangeSignal::Closed) => {
                    warn!("Replica notification channel closed, external changes are ignored");
                    self.changes = None;
                }
            }
        }

        info!("Commerce store task stopped");
    }

    async fn reconcile(&mut self) -> bool {
        match self.persistence.reconcile(self.catalog.as_ref()).await {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }
}

/// Waits for the next replica notification; never resolves once disabled.
async fn next_change(changes: &mut Option<broadcast::Receiver<ReplicaChange>>) -> ChangeSignal {
    match changes {
        Some(receiver) => match receiver.recv().await {
            Ok(change) => ChangeSignal::Changed(change),
            Err(broadcast::error::RecvError::Lagged(missed)) => ChangeSignal::Lagged(missed),
            Err(broadcast::error::RecvError::Closed) => ChangeSignal::Closed,
        },
        None => std::future::pending().await,
    }
}

// =============================================================================
// Store Handle
// =============================================================================

/// Cloneable handle to a running commerce store.
///
/// Every method fails only with [`StoreError::ShuttingDown`], once the task
/// has stopped. Mutations return after the new state has been written to the
/// local store; persistence failures are reported through the
/// [`StoreEventEmitter`], never here.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Command>,
    hydrated_from: HydrationSource,
}

impl StoreHandle {
    /// Where the initial state came from.
    pub fn hydrated_from(&self) -> HydrationSource {
        self.hydrated_from
    }

    /// Runs `f` against the current state.
    pub async fn read<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&CommerceState, &dyn Catalog) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(Box::new(
            move |state: &CommerceState, catalog: &dyn Catalog| {
                let _ = tx.send(f(state, catalog));
            },
        )))
        .await?;
        rx.await.map_err(|_| StoreError::ShuttingDown)
    }

    /// Runs `f` against the state, persists, then returns `f`'s result.
    pub async fn mutate<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut CommerceState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Mutate(Box::new(
            move |state: &mut CommerceState| -> Reply {
                let result = f(state);
                Box::new(move || {
                    let _ = tx.send(result);
                })
            },
        )))
        .await?;
        rx.await.map_err(|_| StoreError::ShuttingDown)
    }

    async fn send(&self, command: Command) -> StoreResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| StoreError::ShuttingDown)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn quantity(&self, product_ref: &ProductRef) -> StoreResult<u32> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.quantity(&product_ref)).await
    }

    pub async fn is_wishlisted(&self, product_ref: &ProductRef) -> StoreResult<bool> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.is_wishlisted(&product_ref))
            .await
    }

    pub async fn current_firmware(&self, product_ref: &ProductRef) -> StoreResult<u32> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.current_firmware(&product_ref))
            .await
    }

    pub async fn last_order(&self, product_ref: &ProductRef) -> StoreResult<Option<Order>> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.last_order(&product_ref).cloned())
            .await
    }

    /// Every order, most recent first.
    pub async fn orders(&self) -> StoreResult<Vec<Order>> {
        self.read(|state, _| state.orders().to_vec()).await
    }

    pub async fn orders_for(&self, product_ref: &ProductRef) -> StoreResult<Vec<Order>> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.orders_for(&product_ref).cloned().collect())
            .await
    }

    pub async fn featured(&self) -> StoreResult<Option<ProductRef>> {
        self.read(|state, _| state.featured().cloned()).await
    }

    pub async fn is_featured(&self, product_ref: &ProductRef) -> StoreResult<bool> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.is_featured(&product_ref))
            .await
    }

    pub async fn is_hidden(&self, product_ref: &ProductRef) -> StoreResult<bool> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.is_hidden(&product_ref)).await
    }

    pub async fn badge(&self, product_ref: &ProductRef) -> StoreResult<Option<String>> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.badge(&product_ref).map(str::to_string))
            .await
    }

    pub async fn admin_flags(&self, product_ref: &ProductRef) -> StoreResult<AdminFlags> {
        let product_ref = product_ref.clone();
        self.read(move |state, _| state.admin_flags(&product_ref))
            .await
    }

    /// The snapshot the next persist would write.
    pub async fn snapshot(&self) -> StoreResult<Snapshot> {
        self.read(|state, _| state.to_snapshot()).await
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    pub async fn acquired_products(&self) -> StoreResult<Vec<Product>> {
        self.read(|state, catalog| state.acquired_products(catalog))
            .await
    }

    pub async fn wishlisted_products(&self) -> StoreResult<Vec<Product>> {
        self.read(|state, catalog| state.wishlisted_products(catalog))
            .await
    }

    pub async fn visible_products(&self) -> StoreResult<Vec<Product>> {
        self.read(|state, catalog| state.visible_products(catalog))
            .await
    }

    pub async fn featured_product(&self) -> StoreResult<Option<Product>> {
        self.read(|state, catalog| state.featured_product(catalog))
            .await
    }

    pub async fn total_spent(&self) -> StoreResult<Money> {
        self.read(|state, catalog| state.total_spent(catalog)).await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Returns the new quantity.
    pub async fn add_one(&self, product_ref: &ProductRef) -> StoreResult<u32> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.add_one(&product_ref)).await
    }

    /// Returns the quantity that was removed.
    pub async fn remove_all(&self, product_ref: &ProductRef) -> StoreResult<u32> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.remove_all(&product_ref)).await
    }

    /// Returns the new membership.
    pub async fn toggle_wishlist(&self, product_ref: &ProductRef) -> StoreResult<bool> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.toggle_wishlist(&product_ref))
            .await
    }

    /// Returns the new firmware version.
    pub async fn update_firmware(&self, product_ref: &ProductRef) -> StoreResult<u32> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.update_firmware(&product_ref))
            .await
    }

    /// Places a `Processing` order stamped with the current time.
    pub async fn create_order(&self, product_ref: &ProductRef) -> StoreResult<Order> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.create_order(&product_ref, Utc::now()))
            .await
    }

    /// Returns the new status, or `None` if no order has that id.
    pub async fn advance_order(&self, order_id: &str) -> StoreResult<Option<OrderStatus>> {
        let order_id = order_id.to_string();
        self.mutate(move |state| state.advance_order(&order_id)).await
    }

    pub async fn set_featured(&self, product_ref: Option<&ProductRef>) -> StoreResult<()> {
        let product_ref = product_ref.cloned();
        self.mutate(move |state| state.set_featured(product_ref)).await
    }

    pub async fn set_hidden(&self, product_ref: &ProductRef, hidden: bool) -> StoreResult<()> {
        let product_ref = product_ref.clone();
        self.mutate(move |state| state.set_hidden(&product_ref, hidden))
            .await
    }

    pub async fn set_badge(
        &self,
        product_ref: &ProductRef,
        label: Option<&str>,
    ) -> StoreResult<()> {
        let product_ref = product_ref.clone();
        let label = label.map(str::to_string);
        self.mutate(move |state| state.set_badge(&product_ref, label.as_deref()))
            .await
    }

    /// Clears every entity and persists the empty snapshot.
    pub async fn reset_all(&self) -> StoreResult<()> {
        self.mutate(|state| state.reset_all()).await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Runs external-change reconciliation now. Returns true if the state was
    /// replaced.
    pub async fn reconcile(&self) -> StoreResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Reconcile(tx)).await?;
        rx.await.map_err(|_| StoreError::ShuttingDown)
    }

    /// Stops the store task. Commands already queued ahead of this one still
    /// run; later calls on any handle fail with `ShuttingDown`.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await.map_err(|_| StoreError::ShuttingDown)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
