//! Fresh Market Core - Shared types and the cart reducer.
//!
//! This crate provides the types used across all Fresh Market components:
//! - `storefront` - Cart orchestration, catalog, checkout and the REST backend
//! - `cli` - Command-line driver for the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. The cart reducer lives here so that every state
//! transition can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, products, prices and status enums
//! - [`cart`] - `CartState`, `CartAction` and the `reduce` transition function

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{CartAction, CartItem, CartProduct, CartState, reduce};
pub use types::*;
