//! CLI command implementations.

use thiserror::Error;

use fresh_market_storefront::error::AppError;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod output;
pub mod shell;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    App(#[from] AppError),

    /// Reading from the terminal failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Whether the failure should reach Sentry.
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::App(err) => err.is_reportable(),
            Self::Io(_) => false,
        }
    }
}

/// The command needs a signed-in user.
fn not_signed_in() -> CommandError {
    AppError::Unauthorized(
        "set FRESH_MARKET_USER_ID and FRESH_MARKET_ACCESS_TOKEN".to_string(),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use fresh_market_storefront::backend::BackendError;
    use fresh_market_storefront::checkout::CheckoutError;

    use super::*;

    #[test]
    fn test_app_errors_display_unchanged() {
        let err = CommandError::from(AppError::from(CheckoutError::EmptyCart));
        assert_eq!(err.to_string(), "Checkout error: cart is empty");
        assert_eq!(
            not_signed_in().to_string(),
            "Unauthorized: set FRESH_MARKET_USER_ID and FRESH_MARKET_ACCESS_TOKEN"
        );
    }

    #[test]
    fn test_only_server_failures_are_reportable() {
        let outage = CommandError::from(AppError::from(BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }));
        assert!(outage.is_reportable());

        assert!(!not_signed_in().is_reportable());
        assert!(!CommandError::from(AppError::NotFound("product p9".to_string())).is_reportable());
        assert!(!CommandError::from(std::io::Error::other("closed")).is_reportable());
    }
}
