//! Decimal price arithmetic.
//!
//! Prices are plain [`Decimal`] amounts in the store's standard unit
//! (dollars, not cents). The store is single-currency, so no currency code
//! travels with the amount.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept after applying a discount.
pub const PRICE_SCALE: u32 = 2;

/// Apply a percentage discount to a unit price.
///
/// Non-positive percentages leave the price untouched. The result is rounded
/// to cents (midpoint away from zero) and never drops below zero.
///
/// ```
/// use fresh_market_core::apply_discount;
/// use rust_decimal::Decimal;
///
/// let price = Decimal::new(1000, 2); // 10.00
/// assert_eq!(apply_discount(price, Decimal::new(25, 0)), Decimal::new(750, 2));
/// assert_eq!(apply_discount(price, Decimal::ZERO), price);
/// ```
#[must_use]
pub fn apply_discount(price: Decimal, percentage: Decimal) -> Decimal {
    if percentage <= Decimal::ZERO {
        return price;
    }

    let factor = Decimal::ONE - percentage / Decimal::ONE_HUNDRED;
    (price * factor)
        .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
}

/// Format an amount for display (e.g., "$19.99").
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_discount_rounds_to_cents() {
        // 4.99 * 0.85 = 4.2415
        let price = Decimal::new(499, 2);
        assert_eq!(apply_discount(price, Decimal::new(15, 0)), Decimal::new(424, 2));
    }

    #[test]
    fn test_apply_discount_negative_is_ignored() {
        let price = Decimal::new(499, 2);
        assert_eq!(apply_discount(price, Decimal::new(-10, 0)), price);
    }

    #[test]
    fn test_apply_discount_over_one_hundred_clamps() {
        let price = Decimal::new(499, 2);
        assert_eq!(apply_discount(price, Decimal::new(150, 0)), Decimal::ZERO);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Decimal::new(998, 2)), "$9.98");
        assert_eq!(format_price(Decimal::new(5, 0)), "$5.00");
        assert_eq!(format_price(Decimal::new(12345, 3)), "$12.35");
    }
}
