//! Application state shared across the storefront.

use std::sync::Arc;

use crate::backend::RestBackend;
use crate::cart::CartService;
use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::session::SessionStore;

/// Application state.
///
/// Cheaply cloneable via `Arc`; clones share the same backend client and
/// catalog cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: RestBackend,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let backend = RestBackend::new(&config.backend)?;
        Ok(Self {
            inner: Arc::new(AppStateInner { config, backend }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn backend(&self) -> &RestBackend {
        &self.inner.backend
    }

    /// Create a cart engine for one application session.
    ///
    /// The engine starts as a guest; apply the configured identity with
    /// [`CartService::set_identity`].
    pub fn cart_service<S, N>(&self, session_store: S, notifier: N) -> CartService<RestBackend, S, N>
    where
        S: SessionStore,
        N: Notifier,
    {
        CartService::new(
            self.inner.backend.clone(),
            session_store,
            notifier,
            self.inner.config.cart,
        )
    }

    /// Load the catalog through the shared cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog::load(&self.inner.backend).await?)
    }

    #[must_use]
    pub fn checkout(&self) -> Checkout {
        Checkout::new(self.inner.config.checkout_delay)
    }
}
