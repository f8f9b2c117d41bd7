//! Core types for Fresh Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod status;

pub use id::*;
pub use price::{apply_discount, format_price};
pub use product::{Category, CategorySummary, Product, StockLevel};
pub use status::*;
