//! Simulated checkout.
//!
//! No payment is taken: placing an order waits out a fixed processing delay,
//! thanks the user and empties the cart through the regular cart engine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use fresh_market_core::{CartState, DeliveryMethod};

use crate::backend::CartRepository;
use crate::cart::CartService;
use crate::notify::{Notifier, Toast};
use crate::session::SessionStore;

/// Reasons an order cannot be placed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("cart is still loading")]
    CartLoading,
}

/// Price breakdown shown on the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub delivery: DeliveryMethod,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub savings: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl OrderSummary {
    #[must_use]
    pub fn from_cart(cart: &CartState, delivery: DeliveryMethod) -> Self {
        let subtotal = cart.total();
        let delivery_fee = delivery.fee();
        Self {
            delivery,
            item_count: cart.item_count(),
            subtotal,
            savings: cart.savings(),
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_number: Uuid,
    pub placed_at: DateTime<Utc>,
    pub summary: OrderSummary,
}

/// Order placement.
#[derive(Debug, Clone, Copy)]
pub struct Checkout {
    processing_delay: Duration,
}

impl Default for Checkout {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Checkout {
    #[must_use]
    pub const fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }

    /// Place an order for the current cart contents.
    ///
    /// The summary is taken before the processing delay; the cart is cleared
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if there is nothing to order and
    /// [`CheckoutError::CartLoading`] while a sync is in flight.
    #[instrument(skip(self, cart))]
    pub async fn place_order<R, S, N>(
        &self,
        cart: &CartService<R, S, N>,
        delivery: DeliveryMethod,
    ) -> Result<OrderConfirmation, CheckoutError>
    where
        R: CartRepository,
        S: SessionStore,
        N: Notifier,
    {
        let state = cart.state();
        if state.loading() {
            return Err(CheckoutError::CartLoading);
        }
        if state.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let summary = OrderSummary::from_cart(&state, delivery);
        tokio::time::sleep(self.processing_delay).await;

        let confirmation = OrderConfirmation {
            order_number: Uuid::new_v4(),
            placed_at: Utc::now(),
            summary,
        };
        info!(
            order_number = %confirmation.order_number,
            total = %confirmation.summary.total,
            "Order placed"
        );

        cart.notifier().notify(Toast::success(
            "Order placed successfully!",
            "Thank you for your order. You'll receive a confirmation email shortly.",
        ));
        cart.clear_cart().await;

        Ok(confirmation)
    }
}
