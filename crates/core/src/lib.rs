//! Padkos Core - Shared types library.
//!
//! This crate provides common types used across all Padkos components:
//! - `cart` - Cart synchronization engine and document-store backends
//! - `integration-tests` - End-to-end scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! document-store access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, the cart data model, and the
//!   identity sum type

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
