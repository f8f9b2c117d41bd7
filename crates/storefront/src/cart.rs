//! Cart synchronization engine.
//!
//! [`CartService`] owns the [`CartState`] and keeps it in step with two
//! mirrors: the backend's `cart_items` rows (when a user is signed in) and
//! the tab-scoped guest cart (when nobody is).
//!
//! # Consistency
//!
//! Every mutation is applied to local state first, so the UI never waits on
//! the network. The matching remote call follows; if it fails the user gets
//! an error toast and the whole cart is re-read from the backend. There is
//! no retry and no offline queue: the model is eventually consistent, last
//! reconciliation wins.
//!
//! Remote calls pass through a FIFO write gate that is entered in the same
//! poll as the local update, so the backend sees writes in the order the
//! user made them. A resync also goes through the gate and therefore reads
//! after every write queued before it. A mutation made while the read is in
//! flight queues behind it; the read is then stale and is repeated once the
//! queued writes have landed.
//!
//! # Identity
//!
//! Signing in discards the guest cart and loads the server cart (optionally
//! upserting the guest items first, see
//! [`CartOptions::merge_guest_cart_on_sign_in`]). Signing out loads the
//! guest cart from session storage, or empties the cart.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument};

use fresh_market_core::{
    CartAction, CartItem, CartProduct, CartState, NavigationType, Product, ProductId,
};

use crate::backend::{BackendError, CartRepository, CartRow};
use crate::config::CartOptions;
use crate::error::{add_breadcrumb, capture, clear_sentry_user, set_sentry_user};
use crate::models::Identity;
use crate::notify::{Notifier, Toast};
use crate::session::{GuestCart, SessionStore};

/// Reads a resync makes before giving up on catching up with local
/// mutations. Local state is kept when they run out.
const MAX_SYNC_ATTEMPTS: usize = 3;

/// The cart engine.
///
/// Create one per application session and share it by reference.
pub struct CartService<R, S, N> {
    repository: R,
    guest_cart: GuestCart<S>,
    notifier: N,
    options: CartOptions,
    state: watch::Sender<CartState>,
    identity: watch::Sender<Option<Identity>>,
    write_gate: Mutex<()>,
    /// Bumped by every item mutation the user makes.
    generation: AtomicU64,
    mounted: AtomicBool,
}

impl<R, S, N> CartService<R, S, N>
where
    R: CartRepository,
    S: SessionStore,
    N: Notifier,
{
    /// Create a cart engine with an empty cart and no identity.
    pub fn new(repository: R, session_store: S, notifier: N, options: CartOptions) -> Self {
        let (state, _) = watch::channel(CartState::default());
        let (identity, _) = watch::channel(None);

        Self {
            repository,
            guest_cart: GuestCart::new(session_store),
            notifier,
            options,
            state,
            identity,
            write_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Snapshot of the current cart.
    pub fn state(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Receive every cart transition.
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// The signed-in user, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// Receive every identity change.
    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub const fn options(&self) -> CartOptions {
        self.options
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// One-shot startup hook.
    ///
    /// A hard reload wipes the guest cart without loading it, so a guest cart
    /// survives in-app navigation but not a refresh. Later calls are ignored.
    #[instrument(skip(self))]
    pub async fn mount(&self, navigation: NavigationType) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            debug!("Cart already mounted");
            return;
        }

        if navigation.is_reload() {
            info!("Hard reload detected, discarding guest cart");
            self.guest_cart.clear();
        }

        if self.identity().is_some() {
            self.sync_cart().await;
        } else if !navigation.is_reload() {
            self.load_guest_cart();
        }
    }

    /// Switch between guest and signed-in mode.
    ///
    /// Setting the same user again (e.g. a refreshed token) only swaps the
    /// stored credentials.
    #[instrument(skip_all, fields(signed_in = identity.is_some()))]
    pub async fn set_identity(&self, identity: Option<Identity>) {
        let previous = self.identity.send_replace(identity.clone());

        match (previous, identity) {
            (None, Some(new)) => {
                info!("Identity established");
                set_sentry_user(&new.user_id);
                if self.options.merge_guest_cart_on_sign_in {
                    self.merge_guest_cart(&new).await;
                }
                self.sync_cart().await;
            }
            (Some(old), Some(new)) if old.user_id != new.user_id => {
                info!("Identity switched");
                set_sentry_user(&new.user_id);
                self.sync_cart().await;
            }
            (Some(_), None) => {
                info!("Identity lost, loading guest cart");
                clear_sentry_user();
                self.load_guest_cart();
            }
            (Some(_), Some(_)) | (None, None) => {}
        }
    }

    // =========================================================================
    // Cart operations
    // =========================================================================

    /// Add a catalog product, refusing unavailable ones.
    ///
    /// Returns whether the product was added.
    pub async fn add_product(&self, product: &Product) -> bool {
        if !product.is_available() {
            self.notifier.notify(Toast::destructive(
                "Out of Stock",
                "This item is currently out of stock.",
            ));
            return false;
        }

        self.add_to_cart(CartProduct::from_product(product)).await;
        true
    }

    /// Add one unit of a product.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: CartProduct) {
        let product_id = product.id.clone();
        let message = format!("{} has been added to your cart", product.name);
        add_breadcrumb("cart", "add_item", Some(&[("product_id", product_id.as_str())]));

        self.dispatch(CartAction::AddItem(product));
        self.notifier.notify(Toast::success("Added to cart", message));

        let Some(identity) = self.identity() else {
            return;
        };

        let quantity = self.state.borrow().quantity_of(&product_id);
        let result = {
            let _gate = self.write_gate.lock().await;
            self.repository
                .upsert_item(&identity, &product_id, quantity)
                .await
        };

        if let Err(e) = result {
            self.reconcile("Failed to add item to cart", &e).await;
        }
    }

    /// Remove a product from the cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) {
        add_breadcrumb("cart", "remove_item", Some(&[("product_id", product_id.as_str())]));
        self.dispatch(CartAction::RemoveItem(product_id.clone()));

        let Some(identity) = self.identity() else {
            return;
        };

        let result = {
            let _gate = self.write_gate.lock().await;
            self.repository.delete_item(&identity, product_id).await
        };

        if let Err(e) = result {
            self.reconcile("Failed to remove item from cart", &e).await;
        }
    }

    /// Set a product's quantity; zero or less removes it.
    ///
    /// Updating a product that is not in the cart changes nothing locally
    /// and issues no remote call.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_quantity(&self, product_id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_from_cart(product_id).await;
            return;
        }

        if !self.state.borrow().contains(product_id) {
            debug!("Quantity update for product not in cart");
            return;
        }

        add_breadcrumb("cart", "update_quantity", Some(&[("product_id", product_id.as_str())]));
        self.dispatch(CartAction::UpdateQuantity {
            id: product_id.clone(),
            quantity,
        });

        let Some(identity) = self.identity() else {
            return;
        };

        let quantity = self.state.borrow().quantity_of(product_id);
        let result = {
            let _gate = self.write_gate.lock().await;
            self.repository
                .update_quantity(&identity, product_id, quantity)
                .await
        };

        if let Err(e) = result {
            self.reconcile("Failed to update quantity", &e).await;
        }
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        add_breadcrumb("cart", "clear_cart", None);
        self.dispatch(CartAction::ClearCart);

        let Some(identity) = self.identity() else {
            self.guest_cart.clear();
            return;
        };

        let result = {
            let _gate = self.write_gate.lock().await;
            self.repository.clear(&identity).await
        };

        if let Err(e) = result {
            self.reconcile("Failed to clear cart", &e).await;
        }
    }

    /// Replace the cart with the backend's copy.
    ///
    /// Only meaningful when signed in. On failure the current items stay as
    /// they are; `loading` is cleared either way. A read that raced a local
    /// mutation is discarded and made again after the mutation's write.
    #[instrument(skip(self))]
    pub async fn sync_cart(&self) {
        let Some(identity) = self.identity() else {
            debug!("No identity, skipping cart sync");
            return;
        };

        self.dispatch(CartAction::SetLoading(true));
        self.guest_cart.clear();

        for attempt in 1..=MAX_SYNC_ATTEMPTS {
            let generation = self.generation.load(Ordering::SeqCst);
            let result = {
                let _gate = self.write_gate.lock().await;
                self.repository.fetch_cart(&identity).await
            };

            let rows = match result {
                Ok(rows) => rows,
                Err(e) => {
                    self.report_failure("Failed to sync cart data", &e);
                    break;
                }
            };

            if !self.is_current_user(&identity) {
                debug!("Identity changed during sync, dropping result");
                break;
            }

            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(attempt, "Cart changed during sync, reading again");
                continue;
            }

            let items = rows_to_items(rows);
            debug!(items = items.len(), "Cart synced");
            self.dispatch(CartAction::SetItems(items));
            break;
        }

        self.dispatch(CartAction::SetLoading(false));
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply an action and mirror the guest cart to session storage.
    fn dispatch(&self, action: CartAction) {
        debug!(action = action.name(), "dispatch");
        let persists_items = !matches!(action, CartAction::SetLoading(_));
        if !matches!(action, CartAction::SetLoading(_) | CartAction::SetItems(_)) {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.state.send_modify(|state| state.apply(action));

        if persists_items && self.identity.borrow().is_none() {
            let items = self.state.borrow().items().to_vec();
            self.guest_cart.save(&items);
        }
    }

    /// Load the guest cart from session storage, or empty the cart.
    fn load_guest_cart(&self) {
        if self.identity.borrow().is_some() {
            return;
        }

        let items = self.guest_cart.load().unwrap_or_default();
        debug!(items = items.len(), "Loaded guest cart");
        self.dispatch(CartAction::SetItems(items));
    }

    /// Upsert the in-memory guest items on top of the server cart.
    async fn merge_guest_cart(&self, identity: &Identity) {
        let guest_items = self.state.borrow().items().to_vec();
        if guest_items.is_empty() {
            return;
        }

        let _gate = self.write_gate.lock().await;
        let server_rows = match self.repository.fetch_cart(identity).await {
            Ok(rows) => rows,
            Err(e) => {
                self.report_failure("Failed to merge guest cart", &e);
                return;
            }
        };

        info!(items = guest_items.len(), "Merging guest cart");
        for item in guest_items {
            let quantity = server_quantity(&server_rows, &item.id).saturating_add(item.quantity);
            if let Err(e) = self
                .repository
                .upsert_item(identity, &item.id, quantity)
                .await
            {
                self.report_failure("Failed to merge guest cart", &e);
                return;
            }
        }
    }

    fn is_current_user(&self, identity: &Identity) -> bool {
        self.identity
            .borrow()
            .as_ref()
            .is_some_and(|current| current.user_id == identity.user_id)
    }

    /// Compensate a failed remote mutation by re-reading the server cart.
    async fn reconcile(&self, message: &str, err: &BackendError) {
        self.report_failure(message, err);
        self.sync_cart().await;
    }

    fn report_failure(&self, message: &str, err: &BackendError) {
        if err.is_server_side() {
            capture(message, err);
        } else {
            tracing::warn!(error = %err, "{message}");
        }
        self.notifier.notify(Toast::error(message));
    }
}

/// Keep rows whose product still exists and is in stock.
fn rows_to_items(rows: Vec<CartRow>) -> Vec<CartItem> {
    rows.into_iter()
        .filter_map(|row| {
            let product = row.product.filter(|p| p.in_stock)?;
            let quantity = u32::try_from(row.quantity).ok().filter(|q| *q > 0)?;
            Some(CartItem::from_product(&product, quantity))
        })
        .collect()
}

fn server_quantity(rows: &[CartRow], product_id: &ProductId) -> u32 {
    rows.iter()
        .find(|row| row.product.as_ref().is_some_and(|p| &p.id == product_id))
        .and_then(|row| u32::try_from(row.quantity).ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex as StdMutex};

    use fresh_market_core::{CategoryId, UserId};
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::*;
    use crate::models::session_keys;
    use crate::notify::ChannelNotifier;
    use crate::session::MemorySessionStore;

    /// Minimal in-memory repository; the integration-tests crate has the
    /// full fake with failure injection.
    #[derive(Clone, Default)]
    struct MapRepository {
        rows: Arc<StdMutex<BTreeMap<String, u32>>>,
        fail_writes: Arc<AtomicBool>,
    }

    impl MapRepository {
        fn quantity(&self, id: &str) -> Option<u32> {
            self.rows.lock().unwrap().get(id).copied()
        }

        fn check(&self) -> Result<(), BackendError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(BackendError::Unavailable("write refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn catalog_product(id: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Decimal::new(499, 2),
            image_url: None,
            unit: "each".to_string(),
            category_id: CategoryId::new("veg"),
            in_stock: true,
            stock_quantity: None,
            is_featured: false,
            is_bestseller: false,
            discount_percentage: None,
            category: None,
        }
    }

    impl CartRepository for MapRepository {
        async fn fetch_cart(&self, _identity: &Identity) -> Result<Vec<CartRow>, BackendError> {
            let rows = self.rows.lock().unwrap().clone();
            Ok(rows
                .into_iter()
                .map(|(id, quantity)| CartRow {
                    quantity: i32::try_from(quantity).unwrap(),
                    product: Some(catalog_product(&id)),
                })
                .collect())
        }

        async fn upsert_item(
            &self,
            _identity: &Identity,
            product_id: &ProductId,
            quantity: u32,
        ) -> Result<(), BackendError> {
            self.check()?;
            self.rows
                .lock()
                .unwrap()
                .insert(product_id.to_string(), quantity);
            Ok(())
        }

        async fn update_quantity(
            &self,
            identity: &Identity,
            product_id: &ProductId,
            quantity: u32,
        ) -> Result<(), BackendError> {
            self.upsert_item(identity, product_id, quantity).await
        }

        async fn delete_item(
            &self,
            _identity: &Identity,
            product_id: &ProductId,
        ) -> Result<(), BackendError> {
            self.check()?;
            self.rows.lock().unwrap().remove(product_id.as_str());
            Ok(())
        }

        async fn clear(&self, _identity: &Identity) -> Result<(), BackendError> {
            self.check()?;
            self.rows.lock().unwrap().clear();
            Ok(())
        }
    }

    type TestService = CartService<MapRepository, MemorySessionStore, ChannelNotifier>;

    fn service() -> (
        TestService,
        MapRepository,
        MemorySessionStore,
        tokio::sync::mpsc::UnboundedReceiver<Toast>,
    ) {
        let repo = MapRepository::default();
        let store = MemorySessionStore::new();
        let (notifier, rx) = ChannelNotifier::new();
        let service = CartService::new(repo.clone(), store.clone(), notifier, CartOptions::default());
        (service, repo, store, rx)
    }

    fn identity() -> Identity {
        Identity::new(UserId::new("u-1"), SecretString::from("token"))
    }

    fn p(id: &str) -> CartProduct {
        CartProduct::from_product(&catalog_product(id))
    }

    #[tokio::test]
    async fn test_guest_add_persists_to_session_store() {
        let (service, repo, store, mut rx) = service();
        service.add_to_cart(p("p1")).await;

        assert_eq!(service.state().quantity_of(&ProductId::new("p1")), 1);
        assert!(store.get(session_keys::GUEST_CART).unwrap().is_some());
        assert_eq!(repo.quantity("p1"), None);
        assert_eq!(rx.try_recv().unwrap().title, "Added to cart");
    }

    #[tokio::test]
    async fn test_authenticated_add_upserts_post_increment_quantity() {
        let (service, repo, store, _rx) = service();
        service.set_identity(Some(identity())).await;

        service.add_to_cart(p("p1")).await;
        service.add_to_cart(p("p1")).await;

        assert_eq!(repo.quantity("p1"), Some(2));
        assert_eq!(service.state().total(), Decimal::new(998, 2));
        assert!(store.get(session_keys::GUEST_CART).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_add_resyncs_from_server() {
        let (service, repo, _store, mut rx) = service();
        service.set_identity(Some(identity())).await;
        repo.fail_writes.store(true, Ordering::SeqCst);

        service.add_to_cart(p("p1")).await;

        assert!(service.state().is_empty());
        assert!(!service.state().loading());
        assert_eq!(rx.try_recv().unwrap().title, "Added to cart");
        assert_eq!(
            rx.try_recv().unwrap().description,
            "Failed to add item to cart"
        );
    }

    #[tokio::test]
    async fn test_update_quantity_zero_deletes_remotely() {
        let (service, repo, _store, _rx) = service();
        service.set_identity(Some(identity())).await;
        service.add_to_cart(p("p1")).await;

        service.update_quantity(&ProductId::new("p1"), 0).await;

        assert!(service.state().is_empty());
        assert_eq!(repo.quantity("p1"), None);
    }

    #[tokio::test]
    async fn test_update_quantity_on_absent_item_is_noop() {
        let (service, repo, _store, _rx) = service();
        service.set_identity(Some(identity())).await;

        service.update_quantity(&ProductId::new("p1"), 3).await;

        assert!(service.state().is_empty());
        assert_eq!(repo.quantity("p1"), None);
    }

    #[tokio::test]
    async fn test_sign_out_loads_guest_cart_or_empties() {
        let (service, _repo, _store, _rx) = service();
        service.set_identity(Some(identity())).await;
        service.add_to_cart(p("p1")).await;

        service.set_identity(None).await;
        assert!(service.state().is_empty());
    }

    #[tokio::test]
    async fn test_mount_is_one_shot() {
        let (service, _repo, store, _rx) = service();
        let saved = vec![CartItem::new(p("p1"), 2)];
        store
            .set(session_keys::GUEST_CART, serde_json::to_string(&saved).unwrap())
            .unwrap();

        service.mount(NavigationType::Navigate).await;
        assert_eq!(service.state().quantity_of(&ProductId::new("p1")), 2);

        service.mount(NavigationType::Reload).await;
        assert_eq!(service.state().quantity_of(&ProductId::new("p1")), 2);
        assert!(store.get(session_keys::GUEST_CART).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_product_refuses_out_of_stock() {
        let (service, _repo, _store, mut rx) = service();
        let mut product = catalog_product("p1");
        product.stock_quantity = Some(0);

        assert!(!service.add_product(&product).await);
        assert!(service.state().is_empty());
        assert_eq!(rx.try_recv().unwrap().title, "Out of Stock");
    }

    #[test]
    fn test_rows_to_items_filters_unavailable() {
        let mut sold_out = catalog_product("p2");
        sold_out.in_stock = false;
        let rows = vec![
            CartRow {
                quantity: 2,
                product: Some(catalog_product("p1")),
            },
            CartRow {
                quantity: 1,
                product: Some(sold_out),
            },
            CartRow {
                quantity: 1,
                product: None,
            },
            CartRow {
                quantity: 0,
                product: Some(catalog_product("p3")),
            },
        ];

        let items = rows_to_items(rows);
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().quantity, 2);
    }
}
