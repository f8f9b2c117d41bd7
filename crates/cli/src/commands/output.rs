//! Terminal rendering.

#![allow(clippy::print_stdout)]

use fresh_market_core::{CartState, Category, Product, format_price};
use fresh_market_storefront::checkout::{OrderConfirmation, OrderSummary};
use fresh_market_storefront::notify::Toast;

pub fn categories(categories: &[Category]) {
    for category in categories {
        if category.description.is_empty() {
            println!("{:<24} {}", category.id, category.name);
        } else {
            println!(
                "{:<24} {} - {}",
                category.id, category.name, category.description
            );
        }
    }
}

pub fn products(products: &[&Product]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }

    for product in products {
        let price = if product.has_discount() {
            format!(
                "{} (was {})",
                format_price(product.discounted_price()),
                format_price(product.price)
            )
        } else {
            format_price(product.price)
        };
        println!(
            "{:<24} {:<32} {:<20} /{:<8} {}",
            product.id,
            product.name,
            price,
            product.unit,
            product.stock_level()
        );
    }
}

pub fn cart(state: &CartState) {
    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for item in state.items() {
        println!(
            "{:<24} {:<32} {:>3} x {:>8} = {:>9}",
            item.id,
            item.name,
            item.quantity,
            format_price(item.price),
            format_price(item.line_total())
        );
    }
    println!("{} item(s), total {}", state.item_count(), format_price(state.total()));
    if !state.savings().is_zero() {
        println!("You save {}", format_price(state.savings()));
    }
}

pub fn summary(summary: &OrderSummary) {
    println!("Subtotal ({} items)  {}", summary.item_count, format_price(summary.subtotal));
    if !summary.savings.is_zero() {
        println!("Savings              -{}", format_price(summary.savings));
    }
    println!(
        "Delivery ({})  {}",
        summary.delivery,
        format_price(summary.delivery_fee)
    );
    println!("Total                {}", format_price(summary.total));
}

pub fn confirmation(confirmation: &OrderConfirmation) {
    println!("Order {}", confirmation.order_number);
    println!("Placed at {}", confirmation.placed_at.to_rfc3339());
    summary(&confirmation.summary);
}

pub fn toast(toast: &Toast) {
    println!("{toast}");
}
