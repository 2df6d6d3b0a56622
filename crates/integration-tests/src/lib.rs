//! Integration tests for Padkos cart synchronization.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p padkos-integration-tests
//! ```
//!
//! The scenario tests run against the in-memory store and need nothing but
//! a tokio runtime. The Firestore smoke test additionally needs the
//! `PADKOS_FIRESTORE_*` environment variables (see `padkos-cart`'s config
//! docs) and skips itself when they are absent; a `.env` file is honored.

use std::time::Duration;

use tokio::sync::watch;

use padkos_cart::{CartSynchronizer, IdentityProvider, MemoryStore};
use padkos_core::{Cart, CartLine, Price};
use rust_decimal::Decimal;

/// A synchronizer wired to an in-memory store and a test-driven identity
/// provider. The store handle doubles as "another device": writes through
/// it show up on the synchronizer's feed.
pub struct TestHarness {
    pub provider: IdentityProvider,
    pub store: MemoryStore,
    pub sync: CartSynchronizer<MemoryStore>,
}

impl TestHarness {
    /// Build a harness with no identity established.
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        let provider = IdentityProvider::new();
        let store = MemoryStore::new();
        let sync = CartSynchronizer::new(store.clone(), provider.subscribe());
        Self {
            provider,
            store,
            sync,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Block (with a one-second cap) until the watched cart satisfies the
/// predicate, returning the matching snapshot.
///
/// # Panics
///
/// Panics if the cart never reaches the expected state in time.
pub async fn wait_for_cart(
    rx: &mut watch::Receiver<Cart>,
    mut predicate: impl FnMut(&Cart) -> bool,
) -> Cart {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("cart channel open");
        }
    })
    .await
    .expect("cart to reach expected state")
}

/// Shorthand for a line with a price expressed in cents (rand).
#[must_use]
pub fn line(item: &str, name: &str, price_cents: i64, quantity: u32) -> CartLine {
    CartLine::new(
        item,
        name,
        Price::zar(Decimal::new(price_cents, 2)),
        format!("https://cdn.padkos.co.za/{item}.png"),
        quantity,
    )
}
