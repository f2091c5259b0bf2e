//! The wallet item lifecycle coordinator.
//!
//! [`WalletCoordinator`] keeps an observable list of [`StatefulItem`]s in step
//! with the [`ItemStore`] and runs one background task per item: verification
//! for certificates and conversion for transfer codes.
//!
//! # Publication
//!
//! The list lives in a single [`watch`] channel. Every write reads the latest
//! published list, applies one merge and publishes the result, so concurrent
//! task completions never lose each other's updates.
//!
//! Tasks are tracked in a registry keyed by [`ItemKey`]. A task publishes
//! only while holding the registry lock and only if it is still the task
//! registered for its item; a terminal publication removes the registration
//! in the same critical section.
//!
//! Reconciliation passes run one at a time, from reading the store to
//! starting tasks, so a pass never publishes an older store state over a
//! newer one. Conversions write the store inside the same exclusion. Lock
//! order is reconcile, then registry, then channel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

mod config;
mod conversion;
mod merge;
mod reconcile;
mod registry;
mod verification;

pub use config::CoordinatorConfig;

use reconcile::{reconcile_items, resolve_items, Dispatch};
use registry::TaskRegistry;
use verification::VerificationRequest;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::item::{
    CertificateRecord, ItemKey, ItemMatcher, LiveItem, RawItem, StatefulItem, TransferCodeRecord,
};
use crate::services::{
    Clock, ConnectivityProbe, DecodeService, DeliveryService, KeyService, VerificationService,
};
use crate::storage::ItemStore;

/// Snapshot of the observable wallet list.
pub type ItemSnapshot = Arc<Vec<StatefulItem>>;

/// The collaborators a [`WalletCoordinator`] orchestrates.
#[derive(Clone)]
pub struct CoordinatorServices {
    /// Persisted, ordered wallet records.
    pub store: Arc<dyn ItemStore>,
    /// Certificate payload decoding.
    pub decoder: Arc<dyn DecodeService>,
    /// Certificate verification and trust data.
    pub verifier: Arc<dyn VerificationService>,
    /// Transfer code delivery backend.
    pub delivery: Arc<dyn DeliveryService>,
    /// Transfer code key pairs.
    pub keys: Arc<dyn KeyService>,
    /// Network reachability.
    pub connectivity: Arc<dyn ConnectivityProbe>,
    /// Current time.
    pub clock: Arc<dyn Clock>,
}

/// State shared between the coordinator and its tasks.
pub(crate) struct Shared {
    services: CoordinatorServices,
    config: CoordinatorConfig,
    items: watch::Sender<ItemSnapshot>,
    registry: Mutex<TaskRegistry>,
    reconciling: Mutex<()>,
    runtime: Handle,
}

impl Shared {
    fn lock_registry(&self) -> MutexGuard<'_, TaskRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Excludes other reconciliation passes and conversion store writes.
    pub(crate) fn lock_reconcile(&self) -> MutexGuard<'_, ()> {
        self.reconciling.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `update` to the latest list, notifying observers if it changed.
    fn replace_items(&self, update: impl FnOnce(&[StatefulItem]) -> Vec<StatefulItem>) {
        self.items.send_if_modified(|items| {
            let next = update(items.as_slice());
            if next == **items {
                return false;
            }
            *items = Arc::new(next);
            true
        });
    }

    /// Publishes a task update if the task is still registered for `key`.
    pub(crate) fn publish(
        &self,
        key: &ItemKey,
        generation: u64,
        update: impl FnOnce(&[StatefulItem]) -> Vec<StatefulItem>,
    ) -> bool {
        let registry = self.lock_registry();
        if !registry.is_current(key, generation) {
            return false;
        }
        self.replace_items(update);
        true
    }

    /// Publishes the last update of a task and unregisters it.
    pub(crate) fn publish_terminal(
        &self,
        key: &ItemKey,
        generation: u64,
        update: impl FnOnce(&[StatefulItem]) -> Vec<StatefulItem>,
    ) -> bool {
        let mut registry = self.lock_registry();
        if !registry.is_current(key, generation) {
            return false;
        }
        self.replace_items(update);
        registry.finish(key, generation)
    }

    /// Unregisters a task that ends without publishing.
    pub(crate) fn finish(&self, key: &ItemKey, generation: u64) {
        self.lock_registry().finish(key, generation);
    }

    /// Rebuilds the list from the store and starts tasks per `dispatch`.
    pub(crate) fn reconcile(self: &Arc<Self>, dispatch: &Dispatch) -> CoordinatorResult<()> {
        let _reconciling = self.lock_reconcile();
        let raw = self.services.store.list()?;
        let light_threshold = self
            .services
            .clock
            .now()
            .saturating_add(self.config.light_expiry_margin.as_secs());
        let live = resolve_items(
            &raw,
            self.services.decoder.as_ref(),
            self.services.store.as_ref(),
            light_threshold,
        );

        let mut registry = self.lock_registry();
        let mut fresh = HashSet::new();
        let mut unsettled = HashSet::new();
        self.replace_items(|previous| {
            let reconciliation = reconcile_items(&live, previous);
            fresh = reconciliation.fresh;
            if let Dispatch::FreshAnd(extra) = dispatch {
                unsettled = live
                    .iter()
                    .zip(&reconciliation.items)
                    .filter(|(item, entry)| extra.contains(item.identity()) && !entry.is_settled())
                    .map(|(item, _)| item.identity().clone())
                    .collect();
            }
            reconciliation.items
        });

        let present: HashSet<&ItemKey> = live.iter().map(LiveItem::identity).collect();
        let cancelled = registry.retain(|key| present.contains(key));

        let mut started = 0_usize;
        for item in &live {
            let key = item.identity();
            let wanted = match dispatch {
                Dispatch::All => true,
                Dispatch::Fresh => fresh.contains(key),
                Dispatch::FreshAnd(_) => fresh.contains(key) || unsettled.contains(key),
                Dispatch::None => false,
            };
            if !wanted || registry.contains(key) {
                continue;
            }
            match item {
                LiveItem::Certificate(certificate) => {
                    let Some(holder) = &certificate.holder else {
                        continue;
                    };
                    self.spawn_verification(
                        &mut registry,
                        VerificationRequest::on_load(&certificate.qr_payload, holder),
                    );
                }
                LiveItem::Transfer(transfer) => {
                    self.spawn_conversion(&mut registry, transfer.transfer_code.clone());
                }
            }
            started += 1;
        }

        log::debug!(
            "reconciled {} items: {started} tasks started, {cancelled} cancelled",
            live.len()
        );
        Ok(())
    }
}

/// Coordinates the wallet items and their background tasks.
///
/// Must be created inside a Tokio runtime; tasks are spawned on it. Dropping
/// the coordinator cancels every running task.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = WalletCoordinator::new(services, CoordinatorConfig::default())?;
/// let mut items = coordinator.subscribe();
/// coordinator.load_items()?;
/// while items.changed().await.is_ok() {
///     render(&items.borrow_and_update());
/// }
/// ```
pub struct WalletCoordinator {
    shared: Arc<Shared>,
}

impl WalletCoordinator {
    /// Creates a coordinator with an empty list. Call [`Self::load_items`] to
    /// populate it.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NoRuntime`] outside a Tokio runtime.
    pub fn new(services: CoordinatorServices, config: CoordinatorConfig) -> CoordinatorResult<Self> {
        let runtime = Handle::try_current().map_err(|_| CoordinatorError::NoRuntime)?;
        let (items, _) = watch::channel(Arc::new(Vec::new()));
        Ok(Self {
            shared: Arc::new(Shared {
                services,
                config,
                items,
                registry: Mutex::new(TaskRegistry::default()),
                reconciling: Mutex::new(()),
                runtime,
            }),
        })
    }

    /// Subscribes to the observable list.
    ///
    /// The receiver holds the current list; each publication replaces it with
    /// a new immutable snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ItemSnapshot> {
        self.shared.items.subscribe()
    }

    /// Returns the current list.
    #[must_use]
    pub fn snapshot(&self) -> ItemSnapshot {
        Arc::clone(&self.shared.items.borrow())
    }

    /// Reads the store, republishes the list and starts a task for every item
    /// that has none running. Tasks of items no longer stored are cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load_items(&self) -> CoordinatorResult<()> {
        self.shared.reconcile(&Dispatch::All)
    }

    /// Verifies the certificate with payload `qr_payload` again, replacing
    /// any verification in flight for it.
    ///
    /// With `force`, an optimistic success is published at once and trust
    /// data is refreshed before verifying. Otherwise verification starts
    /// after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::UnknownItem`] if no listed certificate has
    /// this payload, and [`CoordinatorError::NotVerifiable`] if it did not decode.
    pub fn trigger_verification(
        &self,
        qr_payload: &str,
        delay: Option<Duration>,
        force: bool,
    ) -> CoordinatorResult<()> {
        // a pass removing the item publishes and cancels under this lock
        let mut registry = self.shared.lock_registry();
        let holder = {
            let items = self.shared.items.borrow();
            let entry = items
                .iter()
                .filter_map(StatefulItem::as_certificate)
                .find(|entry| entry.qr_payload == qr_payload)
                .ok_or_else(|| CoordinatorError::UnknownItem(qr_payload.to_string()))?;
            entry.holder.clone().ok_or(CoordinatorError::NotVerifiable)?
        };
        self.shared.spawn_verification(
            &mut registry,
            VerificationRequest {
                qr_payload: qr_payload.to_string(),
                holder,
                delay,
                force,
            },
        );
        Ok(())
    }

    /// Moves the item at position `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if either position is out of range or the store fails.
    pub fn move_item(&self, from: usize, to: usize) -> CoordinatorResult<()> {
        self.shared.services.store.reorder(from, to)?;
        self.shared.reconcile(&Dispatch::None)
    }

    /// Stores a certificate at the front of the list and starts verifying it.
    ///
    /// Returns `false` if the certificate is already stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn add_certificate(&self, record: CertificateRecord) -> CoordinatorResult<bool> {
        if !self.shared.services.store.insert_front(record.into())? {
            return Ok(false);
        }
        self.shared.reconcile(&Dispatch::Fresh)?;
        Ok(true)
    }

    /// Creates a key pair for `code`, stores the code at the front of the
    /// list and starts converting it.
    ///
    /// Returns `false` without touching the key service if the code is
    /// already stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::KeyGeneration`] if no key pair could be
    /// created, or an error if the store fails.
    pub async fn add_transfer_code(&self, code: &str) -> CoordinatorResult<bool> {
        let services = &self.shared.services;
        let matcher = ItemMatcher::transfer_code(code);
        if services.store.list()?.iter().any(|item| matcher.matches(item)) {
            return Ok(false);
        }

        services
            .keys
            .generate_key_pair(code)
            .await
            .map_err(CoordinatorError::KeyGeneration)?;

        let record = TransferCodeRecord::new(code, services.clock.now());
        if !services.store.insert_front(RawItem::TransferCode(record))? {
            return Ok(false);
        }
        self.shared.reconcile(&Dispatch::Fresh)?;
        Ok(true)
    }

    /// Deletes the certificate with payload `qr_payload`, cancelling its task.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::UnknownItem`] if it is not stored, or an
    /// error if the store fails.
    pub fn remove_certificate(&self, qr_payload: &str) -> CoordinatorResult<()> {
        if !self
            .shared
            .services
            .store
            .delete(&ItemMatcher::certificate(qr_payload))?
        {
            return Err(CoordinatorError::UnknownItem(qr_payload.to_string()));
        }
        self.shared.reconcile(&Dispatch::None)
    }

    /// Deletes the transfer code `code`, cancelling its task and removing its
    /// key pair.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::UnknownItem`] if it is not stored, or an
    /// error if the store fails.
    pub async fn remove_transfer_code(&self, code: &str) -> CoordinatorResult<()> {
        let services = &self.shared.services;
        if !services.store.delete(&ItemMatcher::transfer_code(code))? {
            return Err(CoordinatorError::UnknownItem(code.to_string()));
        }
        self.shared.reconcile(&Dispatch::None)?;
        if let Err(err) = services.keys.delete_key_entry(code).await {
            log::warn!("deleting key pair of removed transfer code failed: {err}");
        }
        Ok(())
    }

    /// Cancels every running task. Returns how many were cancelled.
    ///
    /// Published states stay as they are; a later [`Self::load_items`]
    /// starts tasks again.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.shared.lock_registry().cancel_all();
        if cancelled > 0 {
            log::debug!("shutdown cancelled {cancelled} tasks");
        }
        cancelled
    }

    /// Number of tasks currently registered.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.shared.lock_registry().len()
    }

    /// Number of tasks cancelled so far, by replacement, removal or shutdown.
    #[must_use]
    pub fn cancelled_tasks(&self) -> u64 {
        self.shared.lock_registry().cancelled()
    }

    /// Returns `true` if a task is registered for `key`.
    #[must_use]
    pub fn has_active_task(&self, key: &ItemKey) -> bool {
        self.shared.lock_registry().contains(key)
    }
}

impl Drop for WalletCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
