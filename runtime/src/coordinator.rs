//! Optimistic mutation coordinator.
//!
//! Every cart mutation follows the same path: compute the new list, apply it
//! in memory, persist it, then either send it (online) or queue it (offline).
//! Failures never escape; they become notifications or queue entries.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use storefront_engine::cart::{apply_quantity_change, contains_product, remove_product};
use storefront_engine::storage::{read_json, write_json};
use storefront_engine::{
    keys, CartItem, KeyValueStore, NotificationKind, PendingOperation, PendingQueue,
    QuantityChange, RemoveItem, UserId,
};
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::config::Config;
use crate::context::{Connectivity, ContextEvent};
use crate::error::{Error, Result};
use crate::now_ms;
use crate::platform::Platform;
use crate::replay::{self, Reconciled};

/// The two item lists a user owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartList {
    Cart,
    ProductsWithoutOffers,
}

impl CartList {
    /// Key the list is cached under.
    pub fn storage_key(self) -> &'static str {
        match self {
            CartList::Cart => keys::CART_ITEMS,
            CartList::ProductsWithoutOffers => keys::PRODUCTS_WITHOUT_OFFERS,
        }
    }

    /// Whole-list replacement to queue for this list.
    pub fn pending(
        self,
        items: &[CartItem],
        timestamp: u64,
    ) -> storefront_engine::Result<PendingOperation> {
        match self {
            CartList::Cart => PendingOperation::update_cart(items, timestamp),
            CartList::ProductsWithoutOffers => {
                PendingOperation::update_products_without_offers(items, timestamp)
            }
        }
    }
}

/// In-memory view of both lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart_items: Vec<CartItem>,
    pub products_without_offers: Vec<CartItem>,
}

impl CartState {
    pub fn list(&self, list: CartList) -> &[CartItem] {
        match list {
            CartList::Cart => &self.cart_items,
            CartList::ProductsWithoutOffers => &self.products_without_offers,
        }
    }

    fn list_mut(&mut self, list: CartList) -> &mut Vec<CartItem> {
        match list {
            CartList::Cart => &mut self.cart_items,
            CartList::ProductsWithoutOffers => &mut self.products_without_offers,
        }
    }
}

/// Timeouts and drain limits.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Bound on one mutation or replay
    pub request_timeout: Duration,
    /// Bound on the combined cart and product fetch
    pub bulk_timeout: Duration,
    /// Age after which another client's drain lease is ignored
    pub drain_lease_ttl: Duration,
    /// Rejected replays tolerated before an entry is dropped
    pub max_replay_attempts: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout,
            bulk_timeout: config.bulk_timeout,
            drain_lease_ttl: config.drain_lease_ttl,
            max_replay_attempts: config.max_replay_attempts,
        }
    }
}

/// What happened to a mutation after it was applied locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend accepted it.
    Synced,
    /// It was queued for the next drain.
    Queued,
    /// The backend refused it. Not queued.
    Rejected,
    /// No signed-in user; only the local copy changed.
    LocalOnly,
}

/// Result of [`CartCoordinator::load_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was loaded (offline without `force`, or no user).
    Skipped,
    /// Both lists came from the backend.
    Fetched,
    /// The backend failed; cached copies were used.
    Cached,
}

/// Bound `call` by `limit`. Running out of time is [`Error::Timeout`].
pub(crate) async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(Error::Timeout))
}

/// Applies cart mutations optimistically and keeps them durable until the
/// backend has them.
pub struct CartCoordinator {
    /// Lease holder identity
    pub(crate) id: String,
    pub(crate) user_id: Option<UserId>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) connectivity: Connectivity,
    platform: Arc<dyn Platform>,
    state: Mutex<CartState>,
    mounted: AtomicBool,
    /// Held for the whole of one drain pass
    pub(crate) drain_pass: tokio::sync::Mutex<()>,
    pub(crate) settings: CoordinatorSettings,
}

impl CartCoordinator {
    /// Create a coordinator whose in-memory lists start from the cache.
    pub fn new(
        user_id: Option<UserId>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        connectivity: Connectivity,
        platform: Arc<dyn Platform>,
        settings: CoordinatorSettings,
    ) -> Self {
        let coordinator = Self {
            id: format!("coordinator-{}", uuid::Uuid::new_v4()),
            user_id,
            backend,
            store,
            connectivity,
            platform,
            state: Mutex::new(CartState::default()),
            mounted: AtomicBool::new(true),
            drain_pass: tokio::sync::Mutex::new(()),
            settings,
        };
        *coordinator.lock_state() = coordinator.cached_state();
        coordinator
    }

    /// Snapshot of both lists.
    pub fn state(&self) -> CartState {
        self.lock_state().clone()
    }

    /// Stop writing results into memory. In-flight calls still finish and
    /// connectivity failures are still queued.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Increase or decrease a product's quantity in the cart.
    pub async fn change_quantity(&self, product_id: &str, change: QuantityChange) -> MutationOutcome {
        self.change_list_quantity(CartList::Cart, product_id, change)
            .await
    }

    /// Increase or decrease a product's quantity in the offer-less list.
    pub async fn change_quantity_without_offers(
        &self,
        product_id: &str,
        change: QuantityChange,
    ) -> MutationOutcome {
        self.change_list_quantity(CartList::ProductsWithoutOffers, product_id, change)
            .await
    }

    async fn change_list_quantity(
        &self,
        list: CartList,
        product_id: &str,
        change: QuantityChange,
    ) -> MutationOutcome {
        let sent = {
            let mut state = self.lock_state();
            let updated = apply_quantity_change(state.list(list), product_id, change);
            *state.list_mut(list) = updated.clone();
            updated
        };
        self.persist_list(list, &sent);

        let Some(user_id) = self.user_id.as_deref() else {
            return MutationOutcome::LocalOnly;
        };
        let deferred = || list.pending(&sent, now_ms());

        if !self.connectivity.is_online() {
            return self.defer(deferred(), "Changes saved locally");
        }

        let call = replay::replace_list(self.backend.as_ref(), user_id, list, sent.clone());
        match bounded(self.settings.request_timeout, call).await {
            Ok(reconciled) => {
                self.confirm(&sent, reconciled);
                MutationOutcome::Synced
            }
            Err(e) if self.is_connectivity_failure(&e) => {
                tracing::info!(list = list_name(list), "Mutation did not reach the backend: {}", e);
                self.defer(deferred(), "Changes saved locally")
            }
            Err(e) => {
                tracing::warn!("Backend rejected {} update: {}", list_name(list), e);
                self.connectivity.show_notification(
                    "Sync error",
                    "Your changes could not be saved",
                    NotificationKind::Error,
                );
                MutationOutcome::Rejected
            }
        }
    }

    /// Remove a product from whichever list holds it.
    pub async fn remove_from_cart(&self, product_id: &str) -> MutationOutcome {
        let (list, sent) = {
            let mut state = self.lock_state();
            let list = if contains_product(&state.products_without_offers, product_id) {
                CartList::ProductsWithoutOffers
            } else {
                CartList::Cart
            };
            let updated = remove_product(state.list(list), product_id);
            *state.list_mut(list) = updated.clone();
            (list, updated)
        };
        self.persist_list(list, &sent);

        let Some(user_id) = self.user_id.clone() else {
            return MutationOutcome::LocalOnly;
        };
        let removal = RemoveItem {
            user_id,
            product_id: product_id.to_string(),
            is_product_without_offer: list == CartList::ProductsWithoutOffers,
        };
        let deferred = || PendingOperation::remove_item(&removal, now_ms());

        if !self.connectivity.is_online() {
            return self.defer(deferred(), "Product removed locally");
        }

        let call = replay::remove_and_refetch(self.backend.as_ref(), &removal);
        match bounded(self.settings.request_timeout, call).await {
            Ok(reconciled) => {
                self.confirm(&sent, reconciled);
                MutationOutcome::Synced
            }
            Err(e) if self.is_connectivity_failure(&e) => {
                tracing::info!(product_id, "Removal did not reach the backend: {}", e);
                self.defer(deferred(), "Product removed locally")
            }
            Err(e) => {
                tracing::warn!(product_id, "Backend rejected removal: {}", e);
                self.connectivity.show_notification(
                    "Error",
                    "The product could not be removed from the server",
                    NotificationKind::Error,
                );
                MutationOutcome::Rejected
            }
        }
    }

    /// Fetch both lists from the backend, concurrently and under the bulk
    /// timeout. Falls back to the cache when that fails.
    ///
    /// Without `force`, nothing is fetched while offline.
    pub async fn load_all(&self, force: bool) -> LoadOutcome {
        let Some(user_id) = self.user_id.as_deref() else {
            return LoadOutcome::Skipped;
        };
        if !force && !self.connectivity.is_online() {
            return LoadOutcome::Skipped;
        }

        let fetch = async {
            futures::try_join!(
                self.backend.fetch_cart(user_id),
                self.backend.fetch_products_without_offers(user_id),
            )
        };
        match bounded(self.settings.bulk_timeout, fetch).await {
            Ok((cart_items, products_without_offers)) => {
                self.persist_list(CartList::Cart, &cart_items);
                self.persist_list(CartList::ProductsWithoutOffers, &products_without_offers);
                self.set_state(CartState {
                    cart_items,
                    products_without_offers,
                });
                LoadOutcome::Fetched
            }
            Err(e) => {
                tracing::warn!("Failed to load cart data, using cached copies: {}", e);
                self.set_state(self.cached_state());
                LoadOutcome::Cached
            }
        }
    }

    /// Drain the queue on every native `online` event until unmounted, then
    /// refresh both lists.
    ///
    /// Returns `None` when there is no context to listen to.
    pub fn spawn_reconnect_drain(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut subscription = self.connectivity.context()?.subscribe();
        let coordinator = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if event != ContextEvent::NetworkRestored {
                    continue;
                }
                if !coordinator.is_mounted() {
                    break;
                }
                let outcome = coordinator.drain().await;
                tracing::debug!(?outcome, "Reconnect drain finished");
                coordinator.load_all(true).await;
            }
        }))
    }

    /// Connectivity failures are queued; anything else is a rejection.
    fn is_connectivity_failure(&self, error: &Error) -> bool {
        error.is_connectivity() || !self.platform.is_online()
    }

    fn defer(
        &self,
        op: storefront_engine::Result<PendingOperation>,
        title: &str,
    ) -> MutationOutcome {
        match op {
            Ok(op) => self.with_queue(|queue| {
                queue.enqueue(op);
            }),
            Err(e) => tracing::warn!("Failed to build pending operation: {}", e),
        }
        self.connectivity.show_notification(
            title,
            "They will sync when the connection returns",
            NotificationKind::Info,
        );
        MutationOutcome::Queued
    }

    /// Store the server's answer to an immediate mutation, unless the list
    /// moved on while the call was in flight.
    fn confirm(&self, sent: &[CartItem], reconciled: Reconciled) {
        let mut state = self.lock_state();
        if state.list(reconciled.list) != sent {
            tracing::debug!("{} changed during the call, keeping local state", list_name(reconciled.list));
            return;
        }
        if self.is_mounted() {
            *state.list_mut(reconciled.list) = reconciled.items.clone();
        }
        drop(state);
        self.persist_list(reconciled.list, &reconciled.items);
    }

    /// Replace a list with the server's answer to a replayed operation.
    pub(crate) fn reconcile(&self, reconciled: Reconciled) {
        self.persist_list(reconciled.list, &reconciled.items);
        if self.is_mounted() {
            *self.lock_state().list_mut(reconciled.list) = reconciled.items;
        }
    }

    /// Read-modify-write the persisted queue.
    pub(crate) fn with_queue<R>(&self, f: impl FnOnce(&mut PendingQueue) -> R) -> R {
        let mut queue = self.load_queue();
        let result = f(&mut queue);
        if let Err(e) = queue.save(self.store.as_ref()) {
            tracing::warn!("Failed to persist pending changes: {}", e);
        }
        result
    }

    /// The persisted queue. Corrupt data reads as empty.
    pub fn load_queue(&self) -> PendingQueue {
        PendingQueue::load(self.store.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable pending changes: {}", e);
            PendingQueue::new()
        })
    }

    fn persist_list(&self, list: CartList, items: &[CartItem]) {
        let store = self.store.as_ref();
        let mut result = write_json(store, list.storage_key(), items);
        if list == CartList::ProductsWithoutOffers && result.is_ok() {
            result = store.set(keys::PRODUCTS_WITHOUT_OFFERS_TIMESTAMP, &now_ms().to_string());
        }
        if let Err(e) = result {
            tracing::warn!("Failed to cache {}: {}", list_name(list), e);
        }
    }

    fn cached_list(&self, list: CartList) -> Vec<CartItem> {
        match read_json(self.store.as_ref(), list.storage_key()) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable {} cache: {}", list_name(list), e);
                Vec::new()
            }
        }
    }

    fn cached_state(&self) -> CartState {
        CartState {
            cart_items: self.cached_list(CartList::Cart),
            products_without_offers: self.cached_list(CartList::ProductsWithoutOffers),
        }
    }

    fn set_state(&self, state: CartState) {
        if self.is_mounted() {
            *self.lock_state() = state;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn list_name(list: CartList) -> &'static str {
    match list {
        CartList::Cart => "cart",
        CartList::ProductsWithoutOffers => "products without offers",
    }
}
