//! The document-store boundary.
//!
//! The synchronizer is a pure consumer of a per-owner collection of cart
//! line documents. [`CartStore`] is the whole contract: merge-writes,
//! idempotent deletes, an atomic batch delete, and a live feed that delivers
//! the full current snapshot on every change.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use padkos_core::{CartLine, ItemId, LinePatch, OwnerId};

/// Failures at the document-store boundary.
///
/// Not-found on delete is deliberately absent: deletes are idempotent and
/// deleting a missing document succeeds.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The request never completed (network, timeout, offline).
    #[error("transport error: {0}")]
    Transport(String),

    /// The store rejected the request (permission, quota, bad request).
    #[error("store rejected request: {status} - {message}")]
    Api { status: u16, message: String },

    /// A response arrived but could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),
}

/// One event on a cart feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The full current set of line documents. Delivered once immediately
    /// after subscribing and again after every change.
    Snapshot(Vec<CartLine>),
    /// Feed delivery failed. The consumer keeps its last-known view; no
    /// automatic resubscription happens.
    Lost(StoreError),
}

/// A live feed over one owner's cart collection.
///
/// Dropping the feed unsubscribes; any write already in flight still lands
/// remotely, its echo is just never observed.
#[derive(Debug)]
pub struct CartFeed {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
}

impl CartFeed {
    pub(crate) const fn new(rx: mpsc::UnboundedReceiver<FeedEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

/// A remote document store holding cart lines per owner.
///
/// All writes are last-writer-wins at the document level; there is no
/// idempotency key, so a retried upsert after an ambiguous failure can
/// double-apply.
#[async_trait]
pub trait CartStore: Send + Sync + 'static {
    /// Merge-write the given fields onto the line document for `item`,
    /// creating it if absent. Unspecified fields are retained.
    async fn upsert(
        &self,
        owner: &OwnerId,
        item: &ItemId,
        patch: LinePatch,
    ) -> Result<(), StoreError>;

    /// Delete the line document for `item`. Idempotent: deleting a missing
    /// document succeeds.
    async fn delete(&self, owner: &OwnerId, item: &ItemId) -> Result<(), StoreError>;

    /// All current line documents for `owner`.
    async fn list_all(&self, owner: &OwnerId) -> Result<Vec<CartLine>, StoreError>;

    /// Delete the given line documents as one atomic batch. All-or-nothing:
    /// a failure leaves every document in place.
    async fn batch_delete(&self, owner: &OwnerId, items: &[ItemId]) -> Result<(), StoreError>;

    /// Open a live feed over `owner`'s cart collection.
    fn subscribe(&self, owner: &OwnerId) -> CartFeed;
}
