//! Catalog types as served by the backend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::apply_discount;

/// Stock quantity at or below which a product is shown as running low.
pub const LOW_STOCK_THRESHOLD: i32 = 5;
/// Stock quantity at or below which a product is shown with its exact count.
pub const LIMITED_STOCK_THRESHOLD: i32 = 20;

/// A product row from the `products` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub unit: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_bestseller: bool,
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    /// Embedded category, present when the query joins `categories`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategorySummary>,
}

impl Product {
    /// Whether a positive discount applies to this product.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.discount_percentage
            .is_some_and(|pct| pct > Decimal::ZERO)
    }

    /// Unit price after the product's discount, rounded to cents.
    #[must_use]
    pub fn discounted_price(&self) -> Decimal {
        self.discount_percentage
            .map_or(self.price, |pct| apply_discount(self.price, pct))
    }

    /// Whether the product can be added to a cart.
    ///
    /// An explicit stock count of zero overrides the in-stock flag.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.in_stock && !self.stock_quantity.is_some_and(|n| n <= 0)
    }

    /// Stock level bucket for display.
    #[must_use]
    ///
    /// Agrees with [`Self::is_available`]: an unknown count on an in-stock
    /// product is shown as plenty.
    pub fn stock_level(&self) -> StockLevel {
        if !self.is_available() {
            return StockLevel::OutOfStock;
        }
        match self.stock_quantity {
            Some(n) if n <= LOW_STOCK_THRESHOLD => StockLevel::Low(n),
            Some(n) if n <= LIMITED_STOCK_THRESHOLD => StockLevel::Limited(n),
            Some(_) | None => StockLevel::Plenty,
        }
    }
}

/// Coarse stock availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockLevel {
    OutOfStock,
    Low(i32),
    Limited(i32),
    Plenty,
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfStock => write!(f, "Out of Stock"),
            Self::Low(n) => write!(f, "Only {n} left"),
            Self::Limited(n) => write!(f, "{n} in stock"),
            Self::Plenty => write!(f, "In stock"),
        }
    }
}

/// Category name and description embedded in a product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A row from the `categories` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tomatoes() -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Organic Tomatoes".to_string(),
            description: "Fresh, juicy organic tomatoes".to_string(),
            price: Decimal::new(499, 2),
            image_url: None,
            unit: "per lb".to_string(),
            category_id: CategoryId::new("veg"),
            in_stock: true,
            stock_quantity: Some(12),
            is_featured: false,
            is_bestseller: false,
            discount_percentage: None,
            category: None,
        }
    }

    #[test]
    fn test_discounted_price_without_discount() {
        let product = tomatoes();
        assert!(!product.has_discount());
        assert_eq!(product.discounted_price(), Decimal::new(499, 2));
    }

    #[test]
    fn test_discounted_price_with_discount() {
        let product = Product {
            price: Decimal::new(1000, 2),
            discount_percentage: Some(Decimal::new(20, 0)),
            ..tomatoes()
        };
        assert!(product.has_discount());
        assert_eq!(product.discounted_price(), Decimal::new(800, 2));
    }

    #[test]
    fn test_is_available() {
        let mut product = tomatoes();
        assert!(product.is_available());
        product.stock_quantity = Some(0);
        assert!(!product.is_available());
        product.stock_quantity = None;
        assert!(product.is_available());
        product.in_stock = false;
        assert!(!product.is_available());
    }

    #[test]
    fn test_stock_level_buckets() {
        let mut product = tomatoes();
        product.stock_quantity = Some(0);
        assert_eq!(product.stock_level(), StockLevel::OutOfStock);
        product.stock_quantity = Some(3);
        assert_eq!(product.stock_level().to_string(), "Only 3 left");
        product.stock_quantity = Some(12);
        assert_eq!(product.stock_level(), StockLevel::Limited(12));
        product.stock_quantity = Some(100);
        assert_eq!(product.stock_level(), StockLevel::Plenty);
    }

    #[test]
    fn test_stock_level_matches_availability() {
        let mut product = tomatoes();
        product.stock_quantity = None;
        assert!(product.is_available());
        assert_eq!(product.stock_level(), StockLevel::Plenty);
        assert_eq!(product.stock_level().to_string(), "In stock");

        product.in_stock = false;
        product.stock_quantity = Some(40);
        assert!(!product.is_available());
        assert_eq!(product.stock_level(), StockLevel::OutOfStock);
    }

    #[test]
    fn test_deserialize_backend_row() {
        let json = r#"{
            "id": "3f1c",
            "name": "Green Lettuce",
            "price": 2.99,
            "image_url": "lettuce.jpg",
            "unit": "per head",
            "category_id": "veg",
            "in_stock": true,
            "category": {"name": "Vegetables", "description": "Fresh"}
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.price, Decimal::new(299, 2));
        assert_eq!(product.category.unwrap().name, "Vegetables");
        assert!(product.description.is_empty());
        assert!(!product.is_featured);
        assert_eq!(product.discount_percentage, None);
    }
}
