//! Padkos Cart - remote-persisted cart synchronization.
//!
//! Maintains an authoritative, eventually-consistent view of a per-identity
//! shopping cart: usable instantly on the client, persisted per owner in a
//! remote document store, and converged across tabs and devices through a
//! live subscription feed.
//!
//! # Architecture
//!
//! - [`store`] - The document-store boundary: the [`CartStore`] trait, an
//!   in-memory backend, and a Firestore REST backend.
//! - [`identity`] - The identity provider: current identity plus a
//!   change-notification channel.
//! - [`sync`] - The [`CartSynchronizer`], the one component with real state
//!   transitions. Construct it at the composition root with injected
//!   dependencies and hand out watch receivers to the view layer.
//!
//! The synchronizer never mutates its local view optimistically (except
//! `clear`, which is terminal); every write is echoed back through the feed
//! and applied wholesale, last writer wins at snapshot granularity.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod store;
pub mod sync;

pub use config::{ConfigError, FirestoreConfig};
pub use error::SyncError;
pub use identity::IdentityProvider;
pub use store::{CartFeed, CartStore, FeedEvent, StoreError};
pub use store::firestore::FirestoreStore;
pub use store::memory::MemoryStore;
pub use sync::CartSynchronizer;
