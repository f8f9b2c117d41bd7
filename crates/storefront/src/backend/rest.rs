//! PostgREST client for the hosted backend.
//!
//! Talks to `{base}/rest/v1/{table}` with `reqwest`. Caches categories and
//! products using `moka`; cart rows always go to the network.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use fresh_market_core::{Category, Product, ProductId, UserId};

use super::cache::{CacheKey, CacheValue};
use super::{BackendError, CartRepository, CartRow, CatalogRepository};
use crate::config::BackendConfig;
use crate::models::Identity;

/// Columns of `products` joined into each cart row.
const CART_SELECT: &str = "quantity,product:products(id,name,description,price,image_url,unit,\
                           category_id,in_stock,discount_percentage)";
const PRODUCTS_SELECT: &str = "*,category:categories(name,description)";
const CART_CONFLICT_TARGET: &str = "user_id,product_id";

/// Longest slice of a response body that ends up in logs or errors.
const MAX_LOGGED_BODY: usize = 500;

// =============================================================================
// RestBackend
// =============================================================================

/// Client for the backend's PostgREST endpoint.
///
/// Cheap to clone; clones share the HTTP connection pool and catalog cache.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    rest_url: Url,
    anon_key: SecretString,
    cache: Cache<CacheKey, CacheValue>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

impl RestBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL
    /// cannot be extended with `rest/v1/`.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                rest_url: rest_url(&config.url)?,
                anon_key: config.anon_key.clone(),
                cache,
            }),
        })
    }

    /// Build `{rest_url}/{table}?{query}`.
    fn table_url(&self, table: &str, query: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = self.inner.rest_url.join(table)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn cart_items_url(
        &self,
        user_id: &UserId,
        product_id: Option<&ProductId>,
    ) -> Result<Url, BackendError> {
        let mut query = vec![("user_id", format!("eq.{user_id}"))];
        if let Some(product_id) = product_id {
            query.push(("product_id", format!("eq.{product_id}")));
        }
        self.table_url("cart_items", &query)
    }

    /// Start a request carrying the API key and a bearer token.
    ///
    /// Without an identity the anon key doubles as the bearer token.
    fn request(&self, method: Method, url: Url, identity: Option<&Identity>) -> RequestBuilder {
        let anon_key = self.inner.anon_key.expose_secret();
        let bearer = identity.map_or(anon_key, Identity::access_token);

        self.inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&body),
                "Backend returned non-success status"
            );
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        identity: Option<&Identity>,
    ) -> Result<T, BackendError> {
        let body = self
            .execute(self.request(Method::GET, url, identity))
            .await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }
}

impl CartRepository for RestBackend {
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn fetch_cart(&self, identity: &Identity) -> Result<Vec<CartRow>, BackendError> {
        let url = self.table_url(
            "cart_items",
            &[
                ("select", CART_SELECT.to_string()),
                ("user_id", format!("eq.{}", identity.user_id)),
            ],
        )?;
        let rows: Vec<CartRow> = self.get_json(url, Some(identity)).await?;
        debug!(rows = rows.len(), "Fetched cart rows");
        Ok(rows)
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, product_id = %product_id))]
    async fn upsert_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let url = self.table_url(
            "cart_items",
            &[("on_conflict", CART_CONFLICT_TARGET.to_string())],
        )?;
        let request = self
            .request(Method::POST, url, Some(identity))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!({
                "user_id": identity.user_id,
                "product_id": product_id,
                "quantity": quantity,
            }));
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, product_id = %product_id))]
    async fn update_quantity(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let url = self.cart_items_url(&identity.user_id, Some(product_id))?;
        let request = self
            .request(Method::PATCH, url, Some(identity))
            .header("Prefer", "return=minimal")
            .json(&json!({ "quantity": quantity }));
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id, product_id = %product_id))]
    async fn delete_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> Result<(), BackendError> {
        let url = self.cart_items_url(&identity.user_id, Some(product_id))?;
        self.execute(self.request(Method::DELETE, url, Some(identity)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn clear(&self, identity: &Identity) -> Result<(), BackendError> {
        let url = self.cart_items_url(&identity.user_id, None)?;
        self.execute(self.request(Method::DELETE, url, Some(identity)))
            .await?;
        Ok(())
    }
}

impl CatalogRepository for RestBackend {
    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let url = self.table_url(
            "categories",
            &[("select", "*".to_string()), ("order", "name".to_string())],
        )?;
        let categories: Vec<Category> = self.get_json(url, None).await?;

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let url = self.table_url(
            "products",
            &[
                ("select", PRODUCTS_SELECT.to_string()),
                ("in_stock", "eq.true".to_string()),
                ("order", "name".to_string()),
            ],
        )?;
        let products: Vec<Product> = self.get_json(url, None).await?;

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    fn invalidate(&self) {
        self.inner.cache.invalidate_all();
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// `{base}/rest/v1/`, keeping any path prefix of the base URL.
fn rest_url(base: &Url) -> Result<Url, BackendError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("rest/v1/")?)
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => match err.hint {
            Some(hint) if !hint.is_empty() => format!("{} ({hint})", err.message),
            _ => err.message,
        },
        Err(_) if body.trim().is_empty() => "(empty response body)".to_string(),
        Err(_) => truncate(body),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn backend(base: &str) -> RestBackend {
        RestBackend::new(&BackendConfig {
            url: Url::parse(base).unwrap(),
            anon_key: SecretString::from("anon"),
            catalog_cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        })
        .unwrap()
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_rest_url_keeps_prefix() {
        let url = rest_url(&Url::parse("https://abc.supabase.co").unwrap()).unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/rest/v1/");

        let url = rest_url(&Url::parse("http://localhost:8000/proxy").unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/proxy/rest/v1/");
    }

    #[test]
    fn test_cart_items_url_filters() {
        let backend = backend("https://abc.supabase.co");
        let url = backend
            .cart_items_url(&UserId::new("u-1"), Some(&ProductId::new("p-9")))
            .unwrap();

        assert_eq!(url.path(), "/rest/v1/cart_items");
        let query = query_map(&url);
        assert_eq!(query.get("user_id").unwrap(), "eq.u-1");
        assert_eq!(query.get("product_id").unwrap(), "eq.p-9");
    }

    #[test]
    fn test_clear_url_only_filters_user() {
        let backend = backend("https://abc.supabase.co");
        let url = backend.cart_items_url(&UserId::new("u-1"), None).unwrap();
        let query = query_map(&url);
        assert_eq!(query.len(), 1);
        assert_eq!(query.get("user_id").unwrap(), "eq.u-1");
    }

    #[test]
    fn test_select_survives_encoding() {
        let backend = backend("https://abc.supabase.co");
        let url = backend
            .table_url("cart_items", &[("select", CART_SELECT.to_string())])
            .unwrap();
        assert_eq!(query_map(&url).get("select").unwrap(), CART_SELECT);
    }

    #[test]
    fn test_error_message_from_postgrest_body() {
        let body = r#"{"code":"42501","message":"permission denied","hint":"check RLS","details":null}"#;
        assert_eq!(error_message(body), "permission denied (check RLS)");
        assert_eq!(error_message(""), "(empty response body)");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
