//! Persistence adapter for the hosted backend-as-a-service.
//!
//! # Architecture
//!
//! - The cart engine only sees the [`CartRepository`] and
//!   [`CatalogRepository`] traits; it treats the backend as an opaque
//!   network service.
//! - [`RestBackend`] implements both over the PostgREST dialect
//!   (`/rest/v1/{table}`), with row-level security enforced server-side by
//!   the caller's access token.
//! - Catalog responses are cached in memory via `moka`; cart rows never are.
//!
//! # Example
//!
//! ```rust,ignore
//! use fresh_market_storefront::backend::{CartRepository, RestBackend};
//!
//! let backend = RestBackend::new(&config.backend)?;
//! let rows = backend.fetch_cart(&identity).await?;
//! ```

mod cache;
mod rest;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fresh_market_core::{Category, Product, ProductId};

use crate::models::Identity;

pub use rest::RestBackend;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connection, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Backend unreachable or refused the operation.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Whether the failure happened on the server side (5xx or transport).
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Parse(_) | Self::InvalidUrl(_) | Self::RateLimited(_) => false,
        }
    }
}

/// A `cart_items` row joined with its product.
///
/// `product` is `None` when the product row was deleted or is hidden by
/// row-level security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRow {
    pub quantity: i32,
    #[serde(default)]
    pub product: Option<Product>,
}

/// Row-level CRUD over the `cart_items` table, keyed by
/// `(user_id, product_id)`.
pub trait CartRepository: Send + Sync {
    /// All cart rows of the identity's user, joined with product data.
    fn fetch_cart(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Vec<CartRow>, BackendError>> + Send;

    /// Insert or overwrite the quantity of `(user_id, product_id)`.
    fn upsert_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Set the quantity of an existing `(user_id, product_id)` row.
    fn update_quantity(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete the `(user_id, product_id)` row.
    fn delete_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete every row of the identity's user.
    fn clear(&self, identity: &Identity) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Read access to `categories` and `products`.
pub trait CatalogRepository: Send + Sync {
    /// All categories ordered by name.
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, BackendError>> + Send;

    /// In-stock products ordered by name, with embedded category summary.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Drop any cached catalog data so the next read hits the backend.
    fn invalidate(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 409: duplicate key");

        let err = BackendError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn test_server_side_classification() {
        assert!(
            BackendError::Status {
                status: 503,
                message: String::new()
            }
            .is_server_side()
        );
        assert!(
            !BackendError::Status {
                status: 401,
                message: String::new()
            }
            .is_server_side()
        );
        assert!(BackendError::Unavailable("down".to_string()).is_server_side());
    }

    #[test]
    fn test_cart_row_with_missing_product() {
        let rows: Vec<CartRow> =
            serde_json::from_str(r#"[{"quantity": 2, "product": null}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.first().unwrap().product.is_none());
    }

    #[test]
    fn test_cart_row_carries_discount() {
        let json = r#"[{"quantity": 1, "product": {
            "id": "p1", "name": "Strawberries", "description": "", "price": 10.00,
            "image_url": null, "unit": "per box", "category_id": "fruit",
            "in_stock": true, "discount_percentage": 25
        }}]"#;
        let rows: Vec<CartRow> = serde_json::from_str(json).unwrap();
        let product = rows.first().unwrap().product.as_ref().unwrap();
        assert_eq!(product.discount_percentage, Some(rust_decimal::Decimal::new(25, 0)));
        assert_eq!(product.discounted_price(), rust_decimal::Decimal::new(750, 2));
    }
}
