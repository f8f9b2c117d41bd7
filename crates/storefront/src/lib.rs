//! Fresh Market Storefront library.
//!
//! Client-side storefront logic against a hosted backend-as-a-service:
//!
//! - [`cart`] - the cart synchronization engine (optimistic updates,
//!   compensating resync, guest/authenticated transitions)
//! - [`catalog`] - categories and in-stock products
//! - [`checkout`] - order summary and simulated order placement
//! - [`backend`] - persistence traits and the PostgREST client
//! - [`session`] - tab-scoped session storage for the guest cart
//! - [`notify`] - user-facing notifications (toasts)
//!
//! Everything is wired explicitly: a [`cart::CartService`] is created once
//! per application session and handed to whoever needs it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod session;
pub mod state;
