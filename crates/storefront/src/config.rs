//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FRESH_MARKET_BACKEND_URL` - Base URL of the backend-as-a-service
//! - `FRESH_MARKET_ANON_KEY` - Public (anon) API key for the backend
//!
//! ## Optional
//! - `FRESH_MARKET_ACCESS_TOKEN` - Access token of a signed-in user
//! - `FRESH_MARKET_USER_ID` - ID of that user (required with the token)
//! - `FRESH_MARKET_MERGE_GUEST_CART` - Merge the guest cart on sign-in (default: false)
//! - `FRESH_MARKET_CATALOG_CACHE_TTL_SECS` - Catalog cache TTL (default: 300)
//! - `FRESH_MARKET_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 10)
//! - `FRESH_MARKET_CHECKOUT_DELAY_MS` - Simulated payment delay (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use fresh_market_core::UserId;

use crate::models::Identity;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend-as-a-service connection settings
    pub backend: BackendConfig,
    /// Identity of a signed-in user, if one was provided
    pub identity: Option<Identity>,
    /// Cart engine behavior
    pub cart: CartOptions,
    /// Simulated payment processing delay
    pub checkout_delay: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend-as-a-service connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL (e.g., `https://abc.supabase.co`)
    pub url: Url,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: SecretString,
    /// TTL for cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Cart engine options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartOptions {
    /// Upsert guest items to the server cart when a user signs in instead of
    /// discarding them.
    pub merge_guest_cart_on_sign_in: bool,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig::from_env()?;
        let identity = identity_from_env()?;
        let cart = CartOptions {
            merge_guest_cart_on_sign_in: parse_bool(
                "FRESH_MARKET_MERGE_GUEST_CART",
                &get_env_or_default("FRESH_MARKET_MERGE_GUEST_CART", "false"),
            )?,
        };
        let checkout_delay = Duration::from_millis(parse_number(
            "FRESH_MARKET_CHECKOUT_DELAY_MS",
            &get_env_or_default("FRESH_MARKET_CHECKOUT_DELAY_MS", "2000"),
        )?);

        Ok(Self {
            backend,
            identity,
            cart,
            checkout_delay,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("FRESH_MARKET_BACKEND_URL")?;
        let url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("FRESH_MARKET_BACKEND_URL".to_string(), e.to_string())
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "FRESH_MARKET_BACKEND_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            url,
            anon_key: get_validated_secret("FRESH_MARKET_ANON_KEY")?,
            catalog_cache_ttl: Duration::from_secs(parse_number(
                "FRESH_MARKET_CATALOG_CACHE_TTL_SECS",
                &get_env_or_default("FRESH_MARKET_CATALOG_CACHE_TTL_SECS", "300"),
            )?),
            request_timeout: Duration::from_secs(parse_number(
                "FRESH_MARKET_REQUEST_TIMEOUT_SECS",
                &get_env_or_default("FRESH_MARKET_REQUEST_TIMEOUT_SECS", "10"),
            )?),
        })
    }
}

/// Token and user ID must be provided together.
fn identity_from_env() -> Result<Option<Identity>, ConfigError> {
    let token = get_optional_env("FRESH_MARKET_ACCESS_TOKEN");
    let user_id = get_optional_env("FRESH_MARKET_USER_ID");

    match (token, user_id) {
        (Some(token), Some(user_id)) => Ok(Some(Identity::new(
            UserId::new(user_id),
            SecretString::from(token),
        ))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingEnvVar(
            "FRESH_MARKET_USER_ID".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::MissingEnvVar(
            "FRESH_MARKET_ACCESS_TOKEN".to_string(),
        )),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    let lower = value.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the backend dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let secret = SecretString::from(get_required_env(key)?);
    validate_secret_strength(&secret, key)?;
    Ok(secret)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let secret = SecretString::from("your-anon-key-here");
        let err = validate_secret_strength(&secret, "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let secret = SecretString::from("a".repeat(40));
        assert!(validate_secret_strength(&secret, "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let secret = SecretString::from("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.aB3xY9mK2nL5pQ7");
        assert!(validate_secret_strength(&secret, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "true").unwrap());
        assert!(parse_bool("K", "YES").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("K", " 300 ").unwrap(), 300);
        assert!(matches!(
            parse_number("K", "-1"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_backend_config_debug_redacts_key() {
        let config = BackendConfig {
            url: Url::parse("https://abc.supabase.co").unwrap(),
            anon_key: SecretString::from("super_secret_anon_key"),
            catalog_cache_ttl: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("abc.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_anon_key"));
    }

    #[test]
    fn test_cart_options_default_discards_guest_cart() {
        assert!(!CartOptions::default().merge_guest_cart_on_sign_in);
    }
}
