//! Cart commands for the configured user.

use fresh_market_core::ProductId;
use fresh_market_storefront::backend::RestBackend;
use fresh_market_storefront::cart::CartService;
use fresh_market_storefront::error::AppError;
use fresh_market_storefront::notify::{Notifier, TracingNotifier};
use fresh_market_storefront::session::{MemorySessionStore, SessionStore};
use fresh_market_storefront::state::AppState;

use super::{CommandError, not_signed_in};

pub type SignedInCart = CartService<RestBackend, MemorySessionStore, TracingNotifier>;

/// A cart engine signed in as the configured user, already synced.
pub async fn signed_in(state: &AppState) -> Result<SignedInCart, CommandError> {
    let identity = state
        .config()
        .identity
        .clone()
        .ok_or_else(not_signed_in)?;

    let cart = state.cart_service(MemorySessionStore::new(), TracingNotifier);
    cart.set_identity(Some(identity)).await;
    Ok(cart)
}

/// Look a product up in the catalog and add it.
///
/// Out-of-stock products are refused by the cart engine with a toast.
pub async fn add<S, N>(
    state: &AppState,
    cart: &CartService<RestBackend, S, N>,
    product_id: &ProductId,
) -> Result<(), CommandError>
where
    S: SessionStore,
    N: Notifier,
{
    let catalog = state.catalog().await?;
    let product = catalog
        .product(product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    cart.add_product(product).await;
    Ok(())
}
