//! Order placement.

use fresh_market_core::DeliveryMethod;
use fresh_market_storefront::backend::RestBackend;
use fresh_market_storefront::cart::CartService;
use fresh_market_storefront::error::AppError;
use fresh_market_storefront::notify::Notifier;
use fresh_market_storefront::session::SessionStore;
use fresh_market_storefront::state::AppState;

use super::{CommandError, output};

/// Place the order and print the confirmation.
pub async fn place_order<S, N>(
    state: &AppState,
    cart: &CartService<RestBackend, S, N>,
    delivery: DeliveryMethod,
) -> Result<(), CommandError>
where
    S: SessionStore,
    N: Notifier,
{
    tracing::info!(%delivery, items = cart.state().item_count(), "Placing order");
    let confirmation = state
        .checkout()
        .place_order(cart, delivery)
        .await
        .map_err(AppError::from)?;
    output::confirmation(&confirmation);
    Ok(())
}
