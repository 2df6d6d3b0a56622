//! Core types for Padkos.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod identity;
pub mod price;

pub use cart::{Cart, CartLine, LinePatch};
pub use id::*;
pub use identity::Identity;
pub use price::{CurrencyCode, Price};
