//! Firestore REST backend for the cart store.
//!
//! Carts live at `carts/{owner}/items/{item}`: one document per line, keyed
//! by item id. Merge-writes use `PATCH` with an `updateMask`, the atomic
//! batch delete uses the `documents:commit` endpoint (all-or-nothing), and
//! the feed polls the collection on an interval — the REST surface has no
//! server push channel.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use padkos_core::{CartLine, CurrencyCode, ItemId, LinePatch, OwnerId, Price};

use crate::config::FirestoreConfig;

use super::{CartFeed, CartStore, FeedEvent, StoreError};

/// Collection holding one cart per owner.
const CARTS_COLLECTION: &str = "carts";

/// Sub-collection holding one document per cart line.
const ITEMS_SUBCOLLECTION: &str = "items";

struct Inner {
    client: reqwest::Client,
    config: FirestoreConfig,
}

/// A [`CartStore`] over the Firestore REST v1 API.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<Inner>,
}

impl FirestoreStore {
    /// Create a new Firestore-backed store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the bearer
    /// token is not a valid header value.
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.access_token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|err| StoreError::Decode(format!("invalid bearer token: {err}")))?;
            value.set_sensitive(true);
            headers.insert("Authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner { client, config }),
        })
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.inner.config.project_id, self.inner.config.database_id
        )
    }

    fn items_parent(&self, owner: &OwnerId) -> String {
        format!(
            "{}/documents/{CARTS_COLLECTION}/{owner}/{ITEMS_SUBCOLLECTION}",
            self.database_path()
        )
    }

    fn document_path(&self, owner: &OwnerId, item: &ItemId) -> String {
        format!("{}/{item}", self.items_parent(owner))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.config.base_url)
    }

    async fn list_page(
        &self,
        owner: &OwnerId,
        page_token: Option<&str>,
    ) -> Result<(Vec<CartLine>, Option<String>), StoreError> {
        let url = format!(
            "{}{}",
            self.url(&self.items_parent(owner)),
            page_query(page_token)
        );

        let body = check(self.inner.client.get(&url).send().await).await?;
        let lines = body
            .get("documents")
            .and_then(Value::as_array)
            .map_or_else(Vec::new, |docs| {
                docs.iter().filter_map(decode_document).collect()
            });
        let next = body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .map(String::from);
        Ok((lines, next))
    }
}

/// Query string for one list page; the server-issued page token is opaque
/// and must be percent-encoded before it goes back into a URL.
fn page_query(page_token: Option<&str>) -> String {
    page_token.map_or_else(
        || "?pageSize=300".to_owned(),
        |token| format!("?pageSize=300&pageToken={}", urlencoding::encode(token)),
    )
}

/// Send-and-status-check helper: non-2xx becomes [`StoreError::Api`].
async fn check(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<Value, StoreError> {
    let response = result.map_err(|err| StoreError::Transport(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(StoreError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

#[async_trait]
impl CartStore for FirestoreStore {
    async fn upsert(
        &self,
        owner: &OwnerId,
        item: &ItemId,
        patch: LinePatch,
    ) -> Result<(), StoreError> {
        let (fields, mask) = encode_patch(item, &patch);
        let mut url = format!("{}?", self.url(&self.document_path(owner, item)));
        for (index, field) in mask.iter().enumerate() {
            if index > 0 {
                url.push('&');
            }
            url.push_str("updateMask.fieldPaths=");
            url.push_str(field);
        }

        let body = json!({ "fields": fields });
        check(self.inner.client.patch(&url).json(&body).send().await).await?;
        debug!(%owner, %item, "upserted cart line");
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, item: &ItemId) -> Result<(), StoreError> {
        let url = self.url(&self.document_path(owner, item));
        let response = self
            .inner
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        let status = response.status();
        // Deletes are idempotent: a missing document is success.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn list_all(&self, owner: &OwnerId) -> Result<Vec<CartLine>, StoreError> {
        let mut lines = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (mut page, next) = self.list_page(owner, page_token.as_deref()).await?;
            lines.append(&mut page);
            match next {
                Some(token) => page_token = Some(token),
                None => return Ok(lines),
            }
        }
    }

    async fn batch_delete(&self, owner: &OwnerId, items: &[ItemId]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        let writes: Vec<Value> = items
            .iter()
            .map(|item| json!({ "delete": self.document_path(owner, item) }))
            .collect();
        let url = format!("{}/documents:commit", self.url(&self.database_path()));
        let body = json!({ "writes": writes });
        // A commit applies atomically: either every delete lands or none do.
        check(self.inner.client.post(&url).json(&body).send().await).await?;
        debug!(%owner, count = items.len(), "batch-deleted cart lines");
        Ok(())
    }

    fn subscribe(&self, owner: &OwnerId) -> CartFeed {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let store = self.clone();
        let owner = owner.clone();
        let interval = self.inner.config.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<Vec<CartLine>> = None;
            loop {
                ticker.tick().await;
                match store.list_all(&owner).await {
                    Ok(lines) => {
                        // The first poll always delivers; later polls only on change.
                        if last.as_ref() != Some(&lines) {
                            last = Some(lines.clone());
                            if tx.send(FeedEvent::Snapshot(lines)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        error!(%owner, error = %err, "cart feed poll failed");
                        if tx.send(FeedEvent::Lost(err)).is_err() {
                            break;
                        }
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
            debug!(%owner, "cart feed closed");
        });

        CartFeed::new(rx)
    }
}

// =============================================================================
// Wire encoding
// =============================================================================

/// Encode the present patch fields (plus the `id` snapshot field) as
/// Firestore typed values, returning the field map and the update mask.
fn encode_patch(item: &ItemId, patch: &LinePatch) -> (Value, Vec<&'static str>) {
    let mut fields = serde_json::Map::new();
    let mut mask = vec!["id"];
    fields.insert("id".into(), json!({ "stringValue": item.as_str() }));

    if let Some(name) = &patch.display_name {
        fields.insert("name".into(), json!({ "stringValue": name }));
        mask.push("name");
    }
    if let Some(price) = patch.unit_price {
        fields.insert(
            "price".into(),
            json!({ "doubleValue": price.amount.to_f64().unwrap_or(0.0) }),
        );
        fields.insert(
            "currency".into(),
            json!({ "stringValue": price.currency_code.code() }),
        );
        mask.push("price");
        mask.push("currency");
    }
    if let Some(image) = &patch.image_ref {
        fields.insert("imageURL".into(), json!({ "stringValue": image }));
        mask.push("imageURL");
    }
    if let Some(quantity) = patch.quantity {
        fields.insert(
            "quantity".into(),
            json!({ "integerValue": quantity.to_string() }),
        );
        mask.push("quantity");
    }

    (Value::Object(fields), mask)
}

fn decode_document(doc: &Value) -> Option<CartLine> {
    let fields = doc.get("fields")?;

    // Prefer the denormalized id field; fall back to the document name.
    let item_id = string_field(fields, "id").or_else(|| {
        doc.get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
            .map(String::from)
    });
    let Some(item_id) = item_id else {
        warn!("skipping cart line document without an id");
        return None;
    };

    let amount = fields
        .get("price")
        .and_then(|v| v.get("doubleValue"))
        .and_then(Value::as_f64)
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ZERO);
    let currency = string_field(fields, "currency")
        .map_or(CurrencyCode::ZAR, |code| decode_currency(&code));

    let quantity = fields
        .get("quantity")
        .and_then(|v| v.get("integerValue"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(1);

    Some(CartLine::new(
        item_id,
        string_field(fields, "name").unwrap_or_default(),
        Price::new(amount.round_dp(2), currency),
        string_field(fields, "imageURL").unwrap_or_default(),
        quantity,
    ))
}

fn string_field(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn decode_currency(code: &str) -> CurrencyCode {
    match code {
        "ZAR" => CurrencyCode::ZAR,
        "USD" => CurrencyCode::USD,
        "EUR" => CurrencyCode::EUR,
        "GBP" => CurrencyCode::GBP,
        other => {
            warn!(code = other, "unrecognized currency code, treating as ZAR");
            CurrencyCode::ZAR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_patch_masks_only_present_fields() {
        let (fields, mask) = encode_patch(&ItemId::new("shirt-1"), &LinePatch::quantity(3));
        assert_eq!(mask, vec!["id", "quantity"]);
        assert_eq!(
            fields["quantity"],
            json!({ "integerValue": "3" })
        );
        assert!(fields.get("name").is_none());
    }

    #[test]
    fn test_decode_document_roundtrip() {
        let line = CartLine::new(
            "shirt-1",
            "Shirt",
            Price::zar(Decimal::new(4999, 2)),
            "https://cdn/shirt.png",
            2,
        );
        let (fields, _) = encode_patch(&line.item_id, &LinePatch::full(&line));
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/carts/u/items/shirt-1",
            "fields": fields,
        });
        let decoded = decode_document(&doc).expect("decodes");
        assert_eq!(decoded, line);
    }

    #[test]
    fn test_decode_document_falls_back_to_doc_name() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/carts/u/items/hat-1",
            "fields": { "quantity": { "integerValue": "4" } },
        });
        let decoded = decode_document(&doc).expect("decodes");
        assert_eq!(decoded.item_id, ItemId::new("hat-1"));
        assert_eq!(decoded.quantity, 4);
        assert_eq!(decoded.unit_price.amount, Decimal::ZERO);
    }

    #[test]
    fn test_page_query_encodes_opaque_token() {
        assert_eq!(page_query(None), "?pageSize=300");
        assert_eq!(
            page_query(Some("AbC+dEf/g==")),
            "?pageSize=300&pageToken=AbC%2BdEf%2Fg%3D%3D"
        );
    }

    #[test]
    fn test_decode_currency_defaults_unknown_to_zar() {
        assert_eq!(decode_currency("USD"), CurrencyCode::USD);
        assert_eq!(decode_currency("BTC"), CurrencyCode::ZAR);
        assert_eq!(decode_currency(""), CurrencyCode::ZAR);
    }
}
