//! Session-related types.
//!
//! The storefront never authenticates anyone itself; the backend's auth
//! service issues an access token and the storefront just carries it.

use secrecy::{ExposeSecret, SecretString};

use fresh_market_core::UserId;

/// An established user session.
///
/// Presence or absence of an `Identity` is the sole switch between the
/// guest cart and the server-persisted cart.
#[derive(Clone)]
pub struct Identity {
    /// Backend user ID (the `user_id` column of `cart_items`).
    pub user_id: UserId,
    /// Bearer token for row-level-security checks.
    access_token: SecretString,
}

impl Identity {
    /// Create an identity from a user ID and access token.
    #[must_use]
    pub const fn new(user_id: UserId, access_token: SecretString) -> Self {
        Self {
            user_id,
            access_token,
        }
    }

    /// The raw bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

/// Session storage keys.
pub mod session_keys {
    /// Key for the serialized guest cart.
    pub const GUEST_CART: &str = "guest_cart";
}
