//! Tab-scoped session storage for the guest cart.
//!
//! A [`SessionStore`] is a flat string key/value store that lives as long as
//! the browser tab (or, for the CLI shell, the process). The guest cart is a
//! JSON array of [`CartItem`]s under [`session_keys::GUEST_CART`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use fresh_market_core::CartItem;

use crate::models::session_keys;

/// Errors raised by a session store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Storage is unavailable (quota exceeded, disabled, poisoned lock).
    #[error("session storage unavailable: {0}")]
    Unavailable(String),

    /// Stored value is not a valid guest cart.
    #[error("malformed guest cart: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Key/value storage scoped to one browsing session.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is unavailable.
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is unavailable.
    fn set(&self, key: &str, value: String) -> Result<(), SessionStoreError>;

    /// Delete a value; deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is unavailable.
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
}

/// In-memory session store.
///
/// Clones share the same map, so a test (or a UI layer) can inspect what the
/// cart engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SessionStoreError> {
        self.entries
            .lock()
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), SessionStoreError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// The guest cart as persisted in a [`SessionStore`].
///
/// Every operation swallows storage failures after logging them: losing the
/// guest cart is acceptable, crashing the storefront is not.
#[derive(Debug, Clone)]
pub struct GuestCart<S> {
    store: S,
}

impl<S: SessionStore> GuestCart<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Load the saved guest cart.
    ///
    /// Returns `None` if nothing is saved. A malformed entry is deleted and
    /// treated as absent.
    pub fn load(&self) -> Option<Vec<CartItem>> {
        let raw = match self.store.get(session_keys::GUEST_CART) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read guest cart");
                return None;
            }
        };

        match serde_json::from_str::<Vec<CartItem>>(&raw) {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::warn!(
                    error = %SessionStoreError::Malformed(e),
                    "Discarding unreadable guest cart"
                );
                self.clear();
                None
            }
        }
    }

    /// Persist the guest cart; an empty cart removes the entry.
    pub fn save(&self, items: &[CartItem]) {
        if items.is_empty() {
            self.clear();
            return;
        }

        let result = serde_json::to_string(items)
            .map_err(SessionStoreError::from)
            .and_then(|json| self.store.set(session_keys::GUEST_CART, json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save guest cart");
        }
    }

    /// Delete the saved guest cart.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(session_keys::GUEST_CART) {
            tracing::warn!(error = %e, "Failed to clear guest cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fresh_market_core::{CartProduct, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: &str) -> CartItem {
        CartItem::new(
            CartProduct::new(ProductId::new(id), "Carrots", Decimal::new(349, 2)),
            1,
        )
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v".to_string()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_guest_cart_save_and_load() {
        let store = MemorySessionStore::new();
        let guest = GuestCart::new(store.clone());
        guest.save(&[item("p1")]);

        assert!(store.get(session_keys::GUEST_CART).unwrap().is_some());
        assert_eq!(guest.load().unwrap(), vec![item("p1")]);
    }

    #[test]
    fn test_guest_cart_save_empty_removes_entry() {
        let store = MemorySessionStore::new();
        let guest = GuestCart::new(store.clone());
        guest.save(&[item("p1")]);
        guest.save(&[]);
        assert_eq!(store.get(session_keys::GUEST_CART).unwrap(), None);
    }

    #[test]
    fn test_guest_cart_malformed_entry_is_deleted() {
        let store = MemorySessionStore::new();
        store
            .set(session_keys::GUEST_CART, "{not json".to_string())
            .unwrap();

        let guest = GuestCart::new(store.clone());
        assert!(guest.load().is_none());
        assert_eq!(store.get(session_keys::GUEST_CART).unwrap(), None);
    }
}
