//! The cart synchronizer.
//!
//! Reconciles a locally-held cart with the remotely-persisted per-owner
//! cart across sign-in/sign-out transitions and multi-device edits. The
//! local view is a cache: writes go to the store and come back through the
//! subscription feed, which replaces the view wholesale on every snapshot.
//!
//! A single driver task owns the feed and the identity subscription, so at
//! most one feed is live at any time and a feed opened for one identity can
//! never deliver events after the next identity takes over.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use padkos_core::{Cart, CartLine, Identity, ItemId, LinePatch, OwnerId};

use crate::error::{Result, SyncError};
use crate::store::{CartFeed, CartStore, FeedEvent};

/// Maintains the authoritative local view of one client's cart.
///
/// Construct at the composition root with an injected store and identity
/// subscription; hand [`CartSynchronizer::watch`] receivers to the view
/// layer. Dropping the synchronizer tears the feed down; writes already in
/// flight still complete remotely.
pub struct CartSynchronizer<S: CartStore> {
    store: Arc<S>,
    identity: watch::Receiver<Identity>,
    cart: Arc<watch::Sender<Cart>>,
    driver: JoinHandle<()>,
}

impl<S: CartStore> CartSynchronizer<S> {
    /// Create a synchronizer and start its feed driver.
    ///
    /// Must be called within a tokio runtime. If the identity channel
    /// already carries a signed-in identity, the driver subscribes to that
    /// owner's cart immediately.
    #[must_use]
    pub fn new(store: S, identity: watch::Receiver<Identity>) -> Self {
        let store = Arc::new(store);
        let cart = Arc::new(watch::channel(Cart::empty()).0);
        let driver = tokio::spawn(drive(
            Arc::clone(&store),
            identity.clone(),
            Arc::clone(&cart),
        ));
        Self {
            store,
            identity,
            cart,
            driver,
        }
    }

    /// Snapshot of the current local cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.cart.borrow().clone()
    }

    /// Subscribe to local cart changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Cart> {
        self.cart.subscribe()
    }

    /// The identity the synchronizer currently operates under.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity.borrow().clone()
    }

    /// Add a line to the cart.
    ///
    /// If a line for the same item already exists locally, quantities are
    /// summed before the write — the remote upsert replaces fields, it does
    /// not increment. The local view is not mutated here; the subscription
    /// echo updates it after the write lands.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidLine`] for zero quantity or negative price,
    /// [`SyncError::IdentityMissing`] when anonymous, or the store failure.
    #[instrument(skip(self, line), fields(item = %line.item_id))]
    pub async fn add_line(&self, line: CartLine) -> Result<()> {
        if line.quantity == 0 {
            warn!("rejected cart line with zero quantity");
            return Err(SyncError::InvalidLine("quantity must be at least 1".into()));
        }
        if line.unit_price.is_negative() {
            warn!("rejected cart line with negative price");
            return Err(SyncError::InvalidLine("unit price must not be negative".into()));
        }
        let owner = self.owner()?;

        // Additive merge against the local view, computed before the upsert.
        let mut merged = line;
        if let Some(existing) = self.cart.borrow().get(&merged.item_id) {
            merged.quantity = existing.quantity.saturating_add(merged.quantity);
        }

        let item = merged.item_id.clone();
        self.store
            .upsert(&owner, &item, LinePatch::full(&merged))
            .await
            .inspect_err(|err| error!(%owner, error = %err, "cart add failed"))?;
        Ok(())
    }

    /// Set the quantity for an item. Zero or negative removes the line.
    ///
    /// # Errors
    ///
    /// [`SyncError::IdentityMissing`] when anonymous, or the store failure.
    #[instrument(skip(self), fields(item = %item_id))]
    pub async fn update_quantity(&self, item_id: &ItemId, quantity: i64) -> Result<()> {
        let Ok(quantity @ 1..) = u32::try_from(quantity) else {
            return self.remove_line(item_id).await;
        };
        let owner = self.owner()?;
        self.store
            .upsert(&owner, item_id, LinePatch::quantity(quantity))
            .await
            .inspect_err(|err| error!(%owner, error = %err, "cart quantity update failed"))?;
        Ok(())
    }

    /// Remove the line for an item. Idempotent: removing an absent line
    /// succeeds.
    ///
    /// # Errors
    ///
    /// [`SyncError::IdentityMissing`] when anonymous, or the store failure.
    #[instrument(skip(self), fields(item = %item_id))]
    pub async fn remove_line(&self, item_id: &ItemId) -> Result<()> {
        let owner = self.owner()?;
        self.store
            .delete(&owner, item_id)
            .await
            .inspect_err(|err| error!(%owner, error = %err, "cart remove failed"))?;
        Ok(())
    }

    /// Delete every remote line as one atomic batch, then reset the local
    /// view immediately.
    ///
    /// Clear is the one operation that updates local state ahead of the
    /// subscription echo: it is terminal, so there is no stale state worth
    /// protecting. A store failure before the batch commits leaves both
    /// remote and local state unchanged.
    ///
    /// # Errors
    ///
    /// [`SyncError::IdentityMissing`] when anonymous, or the store failure.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let owner = self.owner()?;
        let lines = self
            .store
            .list_all(&owner)
            .await
            .inspect_err(|err| error!(%owner, error = %err, "cart clear listing failed"))?;
        let items: Vec<ItemId> = lines.into_iter().map(|line| line.item_id).collect();
        self.store
            .batch_delete(&owner, &items)
            .await
            .inspect_err(|err| error!(%owner, error = %err, "cart clear failed"))?;
        self.cart.send_replace(Cart::empty());
        Ok(())
    }

    fn owner(&self) -> Result<OwnerId> {
        match &*self.identity.borrow() {
            Identity::Authenticated(owner) => Ok(owner.clone()),
            Identity::Anonymous => {
                warn!("cart operation skipped: no identity established");
                Err(SyncError::IdentityMissing)
            }
        }
    }
}

impl<S: CartStore> Drop for CartSynchronizer<S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// The feed driver: reacts to identity changes and feed events in one loop.
async fn drive<S: CartStore>(
    store: Arc<S>,
    mut identity: watch::Receiver<Identity>,
    cart: Arc<watch::Sender<Cart>>,
) {
    let mut feed = connect(&store, &identity.borrow_and_update().clone(), &cart);
    let mut identity_open = true;

    loop {
        tokio::select! {
            // Identity transitions take priority over queued feed events, so
            // a snapshot from the outgoing identity can never land after the
            // switch is observed.
            biased;

            changed = identity.changed(), if identity_open => {
                if changed.is_err() {
                    // Provider gone; keep serving the current feed.
                    identity_open = false;
                    continue;
                }
                let current = identity.borrow_and_update().clone();
                // Drop the old feed before touching state: no event from the
                // previous identity may interleave past this point.
                feed = None;
                cart.send_replace(Cart::empty());
                feed = connect(&store, &current, &cart);
            }
            event = next_event(&mut feed) => {
                match event {
                    Some(FeedEvent::Snapshot(lines)) => {
                        cart.send_replace(Cart::from_lines(lines));
                    }
                    Some(FeedEvent::Lost(err)) => {
                        // Non-fatal degradation: last-known view stays up.
                        error!(error = %err, "cart feed delivery failed");
                    }
                    None => {
                        warn!("cart feed ended");
                        feed = None;
                    }
                }
            }
        }
    }
}

fn connect<S: CartStore>(
    store: &Arc<S>,
    identity: &Identity,
    cart: &Arc<watch::Sender<Cart>>,
) -> Option<CartFeed> {
    match identity {
        Identity::Authenticated(owner) => {
            info!(%owner, "subscribing to remote cart");
            Some(store.subscribe(owner))
        }
        Identity::Anonymous => {
            cart.send_replace(Cart::empty());
            None
        }
    }
}

async fn next_event(feed: &mut Option<CartFeed>) -> Option<FeedEvent> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityProvider;
    use crate::store::memory::MemoryStore;
    use padkos_core::Price;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn shirt(quantity: u32) -> CartLine {
        CartLine::new("shirt-1", "Shirt", Price::zar(Decimal::new(4999, 2)), "", quantity)
    }

    async fn wait_for(
        rx: &mut watch::Receiver<Cart>,
        mut predicate: impl FnMut(&Cart) -> bool,
    ) -> Cart {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if predicate(&rx.borrow_and_update().clone()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("cart channel open");
            }
        })
        .await
        .expect("cart to reach expected state")
    }

    #[tokio::test]
    async fn test_add_line_echoes_into_local_view() {
        let provider = IdentityProvider::new();
        let sync = CartSynchronizer::new(MemoryStore::new(), provider.subscribe());
        provider.sign_in(OwnerId::new("u1"));

        sync.add_line(shirt(2)).await.unwrap();

        let mut rx = sync.watch();
        let cart = wait_for(&mut rx, |cart| !cart.is_empty()).await;
        assert_eq!(cart.get(&ItemId::new("shirt-1")).map(|l| l.quantity), Some(2));
    }

    #[tokio::test]
    async fn test_anonymous_add_is_rejected() {
        let provider = IdentityProvider::new();
        let sync = CartSynchronizer::new(MemoryStore::new(), provider.subscribe());

        let result = sync.add_line(shirt(1)).await;
        assert!(matches!(result, Err(SyncError::IdentityMissing)));
        assert!(sync.cart().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_lines_are_rejected() {
        let provider = IdentityProvider::new();
        let sync = CartSynchronizer::new(MemoryStore::new(), provider.subscribe());
        provider.sign_in(OwnerId::new("u1"));

        assert!(matches!(
            sync.add_line(shirt(0)).await,
            Err(SyncError::InvalidLine(_))
        ));
        let negative = CartLine::new("hat-1", "Hat", Price::zar(Decimal::new(-100, 2)), "", 1);
        assert!(matches!(
            sync.add_line(negative).await,
            Err(SyncError::InvalidLine(_))
        ));
    }

    #[tokio::test]
    async fn test_update_quantity_clamps_to_remove() {
        let provider = IdentityProvider::new();
        let store = MemoryStore::new();
        let sync = CartSynchronizer::new(store.clone(), provider.subscribe());
        provider.sign_in(OwnerId::new("u1"));

        sync.add_line(shirt(2)).await.unwrap();
        let mut rx = sync.watch();
        wait_for(&mut rx, |cart| !cart.is_empty()).await;

        sync.update_quantity(&ItemId::new("shirt-1"), 0).await.unwrap();
        wait_for(&mut rx, Cart::is_empty).await;
        assert!(store.list_all(&OwnerId::new("u1")).await.unwrap().is_empty());
    }
}
