//! Cart state and its pure transition function.
//!
//! [`CartState`] is only ever changed through [`CartAction`]s. Every
//! transition recomputes the total from the items, so the following hold
//! after any sequence of actions:
//!
//! - `total == Σ price × quantity` over `items`, exactly (decimal arithmetic)
//! - no two items share a product id
//! - every item has `quantity >= 1`
//!
//! # Example
//!
//! ```
//! use fresh_market_core::{CartAction, CartProduct, CartState, ProductId, reduce};
//! use rust_decimal::Decimal;
//!
//! let tomatoes = CartProduct::new(ProductId::new("p1"), "Tomatoes", Decimal::new(499, 2));
//!
//! let state = reduce(CartState::default(), CartAction::AddItem(tomatoes.clone()));
//! let state = reduce(state, CartAction::AddItem(tomatoes));
//!
//! assert_eq!(state.quantity_of(&ProductId::new("p1")), 2);
//! assert_eq!(state.total(), Decimal::new(998, 2));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Product, ProductId};

/// A product snapshot taken when it is added to the cart.
///
/// `price` is the charged unit price (after any discount); `original_price`
/// keeps the undiscounted price for savings display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl CartProduct {
    /// Create a bare snapshot with just an id, name and price.
    #[must_use]
    pub fn new(id: ProductId, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            price,
            original_price: None,
            image_url: None,
            unit: String::new(),
            category_id: None,
        }
    }

    /// Snapshot a catalog product at its current (discounted) price.
    ///
    /// `original_price` is only set when a positive discount applies.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        let original_price = product.has_discount().then_some(product.price);
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.discounted_price(),
            original_price,
            image_url: product.image_url.clone(),
            unit: product.unit.clone(),
            category_id: Some(product.category_id.clone()),
        }
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    pub quantity: u32,
}

impl CartItem {
    /// Build a cart line from a product snapshot.
    #[must_use]
    pub fn new(product: CartProduct, quantity: u32) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            original_price: product.original_price,
            image_url: product.image_url,
            unit: product.unit,
            category_id: product.category_id,
            in_stock: None,
            quantity,
        }
    }

    /// Build a cart line from a persisted product row.
    ///
    /// Prices the line the same way adding the product from the catalog
    /// does, so a discount survives a resync.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            in_stock: Some(product.in_stock),
            ..Self::new(CartProduct::from_product(product), quantity)
        }
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Amount saved on this line through a discount, zero if none.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        match self.original_price {
            Some(original) if original > self.price => {
                (original - self.price) * Decimal::from(self.quantity)
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Inputs to the cart reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Toggle the resync-in-flight flag.
    SetLoading(bool),
    /// Replace all items.
    SetItems(Vec<CartItem>),
    /// Add one unit of a product.
    AddItem(CartProduct),
    /// Drop a product from the cart.
    RemoveItem(ProductId),
    /// Set a product's quantity; `<= 0` removes it.
    UpdateQuantity { id: ProductId, quantity: i64 },
    /// Empty the cart.
    ClearCart,
}

impl CartAction {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetItems(_) => "set_items",
            Self::AddItem(_) => "add_item",
            Self::RemoveItem(_) => "remove_item",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::ClearCart => "clear_cart",
        }
    }
}

/// The in-memory cart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartState {
    items: Vec<CartItem>,
    total: Decimal,
    loading: bool,
}

impl CartState {
    /// A non-loading cart holding `items` (normalized as by `SetItems`).
    #[must_use]
    pub fn with_items(items: Vec<CartItem>) -> Self {
        let mut state = Self::default();
        state.apply(CartAction::SetItems(items));
        state
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// `Σ price × quantity` over the items.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Whether a full server resync is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Total discount savings across all lines.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.items.iter().map(CartItem::savings).sum()
    }

    #[must_use]
    pub fn item(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.item(id).is_some()
    }

    /// Quantity of a product, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.item(id).map_or(0, |item| item.quantity)
    }

    /// Apply an action in place.
    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::SetLoading(loading) => {
                self.loading = loading;
                return;
            }
            CartAction::SetItems(items) => self.items = normalize(items),
            CartAction::AddItem(product) => {
                if let Some(existing) = self.items.iter_mut().find(|item| item.id == product.id) {
                    existing.quantity = existing.quantity.saturating_add(1);
                } else {
                    self.items.push(CartItem::new(product, 1));
                }
            }
            CartAction::RemoveItem(id) => self.items.retain(|item| item.id != id),
            CartAction::UpdateQuantity { id, quantity } => {
                if quantity <= 0 {
                    self.items.retain(|item| item.id != id);
                } else if let Some(existing) = self.items.iter_mut().find(|item| item.id == id) {
                    existing.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                }
            }
            CartAction::ClearCart => self.items.clear(),
        }
        self.total = self.items.iter().map(CartItem::line_total).sum();
    }
}

/// Pure transition: `state` after `action`.
#[must_use]
pub fn reduce(mut state: CartState, action: CartAction) -> CartState {
    state.apply(action);
    state
}

/// Drop empty lines and fold duplicate ids into their first occurrence.
fn normalize(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut out: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            continue;
        }
        if let Some(existing) = out.iter_mut().find(|seen| seen.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            out.push(item);
        }
    }
    out
}
