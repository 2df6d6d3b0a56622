//! In-process document store.
//!
//! Backs the test suite and local development with the same contract as the
//! remote store: merge-writes on JSON document maps, snapshot feeds, and an
//! offline switch for exercising failure paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::warn;

use padkos_core::{CartLine, ItemId, LinePatch, OwnerId};

use super::{CartFeed, CartStore, FeedEvent, StoreError};

type Document = Map<String, Value>;

#[derive(Default)]
struct Inner {
    docs: Mutex<HashMap<OwnerId, BTreeMap<ItemId, Document>>>,
    watchers: Mutex<HashMap<OwnerId, Vec<mpsc::UnboundedSender<FeedEvent>>>>,
    offline: AtomicBool,
}

/// An in-memory [`CartStore`].
///
/// Cheaply cloneable; clones share the same documents, so one clone can act
/// as a second device in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: while offline, every operation fails
    /// with [`StoreError::Transport`], no document changes, and live feeds
    /// are told their delivery is lost.
    pub fn set_offline(&self, offline: bool) {
        let was_offline = self.inner.offline.swap(offline, Ordering::SeqCst);
        if offline && !was_offline {
            self.notify_lost();
        }
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("store offline".into()));
        }
        Ok(())
    }

    fn snapshot(&self, owner: &OwnerId) -> Vec<CartLine> {
        let docs = self.inner.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        docs.get(owner).map_or_else(Vec::new, |collection| {
            collection.values().filter_map(decode_line).collect()
        })
    }

    /// Deliver the current snapshot to every live watcher of `owner`,
    /// pruning watchers whose feed has been dropped.
    fn notify(&self, owner: &OwnerId) {
        let lines = self.snapshot(owner);
        let mut watchers = self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(senders) = watchers.get_mut(owner) {
            senders.retain(|tx| tx.send(FeedEvent::Snapshot(lines.clone())).is_ok());
        }
    }

    /// Tell every live watcher, across all owners, that delivery is lost.
    fn notify_lost(&self) {
        let mut watchers = self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for senders in watchers.values_mut() {
            senders.retain(|tx| {
                tx.send(FeedEvent::Lost(StoreError::Transport("store offline".into())))
                    .is_ok()
            });
        }
    }
}

fn decode_line(doc: &Document) -> Option<CartLine> {
    match serde_json::from_value(Value::Object(doc.clone())) {
        Ok(line) => Some(line),
        Err(err) => {
            warn!(error = %err, "skipping undecodable cart line document");
            None
        }
    }
}

fn patch_fields(item: &ItemId, patch: &LinePatch) -> Result<Document, StoreError> {
    let mut fields = match serde_json::to_value(patch) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => return Err(StoreError::Decode("patch is not an object".into())),
    };
    fields.insert("id".into(), Value::String(item.to_string()));
    Ok(fields)
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn upsert(
        &self,
        owner: &OwnerId,
        item: &ItemId,
        patch: LinePatch,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let fields = patch_fields(item, &patch)?;
        {
            let mut docs = self
                .inner
                .docs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let doc = docs
                .entry(owner.clone())
                .or_default()
                .entry(item.clone())
                .or_default();
            // Merge semantics: present fields overwrite, absent are retained.
            for (key, value) in fields {
                doc.insert(key, value);
            }
        }
        self.notify(owner);
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, item: &ItemId) -> Result<(), StoreError> {
        self.check_online()?;
        let removed = {
            let mut docs = self
                .inner
                .docs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            docs.get_mut(owner).is_some_and(|collection| collection.remove(item).is_some())
        };
        if removed {
            self.notify(owner);
        }
        Ok(())
    }

    async fn list_all(&self, owner: &OwnerId) -> Result<Vec<CartLine>, StoreError> {
        self.check_online()?;
        Ok(self.snapshot(owner))
    }

    async fn batch_delete(&self, owner: &OwnerId, items: &[ItemId]) -> Result<(), StoreError> {
        self.check_online()?;
        {
            // One lock for the whole batch keeps it all-or-nothing.
            let mut docs = self
                .inner
                .docs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(collection) = docs.get_mut(owner) {
                for item in items {
                    collection.remove(item);
                }
            }
        }
        self.notify(owner);
        Ok(())
    }

    fn subscribe(&self, owner: &OwnerId) -> CartFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        // Initial snapshot fires immediately, before any change.
        let _ = tx.send(FeedEvent::Snapshot(self.snapshot(owner)));
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(owner.clone())
            .or_default()
            .push(tx);
        CartFeed::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padkos_core::Price;
    use rust_decimal::Decimal;

    fn owner() -> OwnerId {
        OwnerId::new("user-1")
    }

    fn shirt(quantity: u32) -> CartLine {
        CartLine::new("shirt-1", "Shirt", Price::zar(Decimal::new(4999, 2)), "", quantity)
    }

    #[tokio::test]
    async fn test_upsert_merges_partial_fields() {
        let store = MemoryStore::new();
        let line = shirt(2);
        store
            .upsert(&owner(), &line.item_id, LinePatch::full(&line))
            .await
            .unwrap();
        // Quantity-only patch must retain name and price.
        store
            .upsert(&owner(), &line.item_id, LinePatch::quantity(5))
            .await
            .unwrap();

        let lines = store.list_all(&owner()).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
        assert_eq!(lines[0].display_name, "Shirt");
        assert_eq!(lines[0].unit_price, Price::zar(Decimal::new(4999, 2)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        store.delete(&owner(), &ItemId::new("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_then_changes() {
        let store = MemoryStore::new();
        let line = shirt(1);
        store
            .upsert(&owner(), &line.item_id, LinePatch::full(&line))
            .await
            .unwrap();

        let mut feed = store.subscribe(&owner());
        let Some(FeedEvent::Snapshot(initial)) = feed.next().await else {
            panic!("expected initial snapshot");
        };
        assert_eq!(initial.len(), 1);

        store.delete(&owner(), &line.item_id).await.unwrap();
        let Some(FeedEvent::Snapshot(next)) = feed.next().await else {
            panic!("expected change snapshot");
        };
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_without_partial_state() {
        let store = MemoryStore::new();
        let line = shirt(1);
        store
            .upsert(&owner(), &line.item_id, LinePatch::full(&line))
            .await
            .unwrap();

        store.set_offline(true);
        assert!(matches!(
            store.batch_delete(&owner(), &[line.item_id.clone()]).await,
            Err(StoreError::Transport(_))
        ));

        store.set_offline(false);
        assert_eq!(store.list_all(&owner()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_going_offline_reports_lost_delivery_to_feeds() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&owner());
        let Some(FeedEvent::Snapshot(_)) = feed.next().await else {
            panic!("expected initial snapshot");
        };

        store.set_offline(true);
        let Some(FeedEvent::Lost(err)) = feed.next().await else {
            panic!("expected lost delivery");
        };
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
