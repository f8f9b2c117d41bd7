//! Integration tests for Fresh Market.
//!
//! Test doubles for the storefront's outer seams, plus scenario tests under
//! `tests/` that drive [`CartService`] through them.
//!
//! - [`FakeBackend`] - in-memory `cart_items` table and catalog with
//!   per-operation failure injection, latency and a call log
//! - [`RecordingNotifier`] - keeps every toast for assertions
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fresh-market-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;

use fresh_market_core::{Category, CategoryId, Product, ProductId, UserId};
use fresh_market_storefront::backend::{BackendError, CartRepository, CartRow, CatalogRepository};
use fresh_market_storefront::cart::CartService;
use fresh_market_storefront::config::CartOptions;
use fresh_market_storefront::models::Identity;
use fresh_market_storefront::notify::{Notifier, Toast};
use fresh_market_storefront::session::MemorySessionStore;

/// Backend operations that can be failed or delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Upsert,
    Update,
    Delete,
    Clear,
}

/// How an injected failure behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The request is rejected and nothing changes server-side.
    Reject,
    /// The write is applied, but the client still sees an error (e.g. the
    /// response was lost).
    LandThenError,
}

/// A remote call as the backend received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(UserId),
    Upsert(UserId, ProductId, u32),
    Update(UserId, ProductId, u32),
    Delete(UserId, ProductId),
    Clear(UserId),
}

#[derive(Default)]
struct FakeState {
    rows: BTreeMap<(UserId, ProductId), u32>,
    categories: Vec<Category>,
    products: HashMap<ProductId, Product>,
    failures: HashMap<Operation, Failure>,
    delays: HashMap<Operation, Duration>,
    calls: Vec<Call>,
    invalidations: usize,
}

/// In-memory backend.
///
/// Clones share state, so a test can keep a handle after giving one to the
/// cart engine.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product (and its category, if new) to the catalog.
    pub fn add_product(&self, product: Product) {
        let mut state = self.state.lock().unwrap();
        if !state.categories.iter().any(|c| c.id == product.category_id) {
            state.categories.push(Category {
                id: product.category_id.clone(),
                name: product.category_id.to_string(),
                description: String::new(),
                image_url: None,
            });
        }
        state.products.insert(product.id.clone(), product);
    }

    /// Mark a catalog product in or out of stock.
    pub fn set_in_stock(&self, product_id: &ProductId, in_stock: bool) {
        if let Some(product) = self.state.lock().unwrap().products.get_mut(product_id) {
            product.in_stock = in_stock;
        }
    }

    /// Delete a product from the catalog; cart rows referencing it remain.
    pub fn remove_product(&self, product_id: &ProductId) {
        self.state.lock().unwrap().products.remove(product_id);
    }

    /// Put a row straight into the `cart_items` table.
    pub fn seed_row(&self, user_id: &UserId, product_id: &ProductId, quantity: u32) {
        self.state
            .lock()
            .unwrap()
            .rows
            .insert((user_id.clone(), product_id.clone()), quantity);
    }

    /// Quantity stored server-side for a user and product.
    #[must_use]
    pub fn quantity(&self, user_id: &UserId, product_id: &ProductId) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .rows
            .get(&(user_id.clone(), product_id.clone()))
            .copied()
    }

    /// Number of rows stored for a user.
    #[must_use]
    pub fn row_count(&self, user_id: &UserId) -> usize {
        self.state
            .lock()
            .unwrap()
            .rows
            .keys()
            .filter(|(uid, _)| uid == user_id)
            .count()
    }

    /// Make every subsequent call of `operation` fail.
    pub fn fail(&self, operation: Operation, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, failure);
    }

    /// Stop failing `operation`.
    pub fn heal(&self, operation: Operation) {
        self.state.lock().unwrap().failures.remove(&operation);
    }

    /// Delay every subsequent call of `operation`.
    pub fn delay(&self, operation: Operation, delay: Duration) {
        self.state.lock().unwrap().delays.insert(operation, delay);
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than reads.
    #[must_use]
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Fetch(_)))
            .collect()
    }

    /// How often the catalog cache was invalidated.
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.state.lock().unwrap().invalidations
    }

    /// Record the call, wait out any delay, then apply `write` unless the
    /// operation is set to be rejected.
    async fn perform<T>(
        &self,
        operation: Operation,
        call: Call,
        write: impl FnOnce(&mut FakeState) -> T,
    ) -> Result<T, BackendError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.delays.get(&operation).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        match state.failures.get(&operation).copied() {
            None => Ok(write(&mut *state)),
            Some(Failure::Reject) => Err(injected(operation)),
            Some(Failure::LandThenError) => {
                write(&mut *state);
                Err(injected(operation))
            }
        }
    }
}

fn injected(operation: Operation) -> BackendError {
    BackendError::Status {
        status: 503,
        message: format!("injected {operation:?} failure"),
    }
}

impl CartRepository for FakeBackend {
    async fn fetch_cart(&self, identity: &Identity) -> Result<Vec<CartRow>, BackendError> {
        let user_id = identity.user_id.clone();
        self.perform(Operation::Fetch, Call::Fetch(user_id.clone()), |state| {
            state
                .rows
                .iter()
                .filter(|((uid, _), _)| *uid == user_id)
                .map(|((_, pid), quantity)| CartRow {
                    quantity: i32::try_from(*quantity).unwrap(),
                    product: state.products.get(pid).cloned(),
                })
                .collect()
        })
        .await
    }

    async fn upsert_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let key = (identity.user_id.clone(), product_id.clone());
        let call = Call::Upsert(key.0.clone(), key.1.clone(), quantity);
        self.perform(Operation::Upsert, call, |state| {
            state.rows.insert(key, quantity);
        })
        .await
    }

    async fn update_quantity(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let key = (identity.user_id.clone(), product_id.clone());
        let call = Call::Update(key.0.clone(), key.1.clone(), quantity);
        self.perform(Operation::Update, call, |state| {
            if let Some(row) = state.rows.get_mut(&key) {
                *row = quantity;
            }
        })
        .await
    }

    async fn delete_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> Result<(), BackendError> {
        let key = (identity.user_id.clone(), product_id.clone());
        let call = Call::Delete(key.0.clone(), key.1.clone());
        self.perform(Operation::Delete, call, |state| {
            state.rows.remove(&key);
        })
        .await
    }

    async fn clear(&self, identity: &Identity) -> Result<(), BackendError> {
        let user_id = identity.user_id.clone();
        self.perform(Operation::Clear, Call::Clear(user_id.clone()), |state| {
            state.rows.retain(|(uid, _), _| *uid != user_id);
        })
        .await
    }
}

impl CatalogRepository for FakeBackend {
    async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
        Ok(self.state.lock().unwrap().categories.clone())
    }

    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .products
            .values()
            .filter(|p| p.in_stock)
            .cloned()
            .collect())
    }

    fn invalidate(&self) {
        self.state.lock().unwrap().invalidations += 1;
    }
}

/// Keeps every toast it is given.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }

    /// Descriptions of every toast, in order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .map(|toast| toast.description)
            .collect()
    }

    pub fn clear(&self) {
        self.toasts.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

pub type TestCart = CartService<FakeBackend, MemorySessionStore, RecordingNotifier>;

/// A cart engine wired to fresh fakes.
pub struct Harness {
    pub cart: TestCart,
    pub backend: FakeBackend,
    pub store: MemorySessionStore,
    pub notifier: RecordingNotifier,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(CartOptions::default())
    }

    #[must_use]
    pub fn with_options(options: CartOptions) -> Self {
        let backend = FakeBackend::new();
        for (id, name, cents) in [("p1", "Milk", 499), ("p2", "Eggs", 350), ("p3", "Bread", 275)] {
            backend.add_product(product(id, name, Decimal::new(cents, 2)));
        }
        Self::with_backend(backend, MemorySessionStore::new(), options)
    }

    /// A new page load over an existing backend and session store.
    #[must_use]
    pub fn with_backend(
        backend: FakeBackend,
        store: MemorySessionStore,
        options: CartOptions,
    ) -> Self {
        let notifier = RecordingNotifier::new();
        let cart = CartService::new(backend.clone(), store.clone(), notifier.clone(), options);
        Self {
            cart,
            backend,
            store,
            notifier,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-stock catalog product in the `grocery` category.
#[must_use]
pub fn product(id: &str, name: &str, price: Decimal) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: String::new(),
        price,
        image_url: None,
        unit: "each".to_string(),
        category_id: CategoryId::new("grocery"),
        in_stock: true,
        stock_quantity: None,
        is_featured: false,
        is_bestseller: false,
        discount_percentage: None,
        category: None,
    }
}

#[must_use]
pub fn identity(user_id: &str) -> Identity {
    Identity::new(UserId::new(user_id), SecretString::from(format!("token-{user_id}")))
}

#[must_use]
pub fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}
