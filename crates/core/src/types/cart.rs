//! The cart data model.
//!
//! A [`Cart`] is the full set of [`CartLine`]s for one identity, keyed by
//! item id so there is never more than one line per distinct item. Lines
//! carry a denormalized snapshot of catalog data (name, price, image) taken
//! when the line was added; it is not re-validated against the catalog on
//! read.
//!
//! Wire field names follow the storefront's document schema (`id`, `name`,
//! `price`, `imageURL`, `quantity`).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ItemId;
use super::price::Price;

/// One entry in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Stable identifier of the purchasable item (catalog key).
    #[serde(rename = "id")]
    pub item_id: ItemId,
    /// Item name, snapshotted from the catalog at add time.
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Unit price, snapshotted from the catalog at add time.
    #[serde(rename = "price", default)]
    pub unit_price: Price,
    /// Image URL, snapshotted from the catalog at add time.
    #[serde(rename = "imageURL", default)]
    pub image_ref: String,
    /// Positive count; a line never persists with quantity zero.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

impl CartLine {
    /// Create a new line.
    #[must_use]
    pub fn new(
        item_id: impl Into<ItemId>,
        display_name: impl Into<String>,
        unit_price: Price,
        image_ref: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            display_name: display_name.into(),
            unit_price,
            image_ref: image_ref.into(),
            quantity,
        }
    }

    /// Line total: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.amount * Decimal::from(self.quantity)
    }
}

/// Partial line fields for a merge-write.
///
/// Only the fields that are `Some` are written; everything else on the
/// stored document is left untouched. This mirrors the document store's
/// merge/upsert semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePatch {
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "price", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Price>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl LinePatch {
    /// A quantity-only patch, the common case for +/- updates.
    #[must_use]
    pub const fn quantity(quantity: u32) -> Self {
        Self {
            display_name: None,
            unit_price: None,
            image_ref: None,
            quantity: Some(quantity),
        }
    }

    /// A full patch carrying every field of `line`.
    #[must_use]
    pub fn full(line: &CartLine) -> Self {
        Self {
            display_name: Some(line.display_name.clone()),
            unit_price: Some(line.unit_price),
            image_ref: Some(line.image_ref.clone()),
            quantity: Some(line.quantity),
        }
    }

    /// Overwrite the present fields onto `line`.
    pub fn merge_into(&self, line: &mut CartLine) {
        if let Some(name) = &self.display_name {
            line.display_name.clone_from(name);
        }
        if let Some(price) = self.unit_price {
            line.unit_price = price;
        }
        if let Some(image) = &self.image_ref {
            line.image_ref.clone_from(image);
        }
        if let Some(quantity) = self.quantity {
            line.quantity = quantity;
        }
    }
}

/// The full set of cart lines for one identity.
///
/// Keyed by item id, so uniqueness per item holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<ItemId, CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from a decoded snapshot of line documents.
    ///
    /// The store keys line documents by item id, so duplicates should not
    /// occur; if a snapshot carries one anyway, the later line wins.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|line| (line.item_id.clone(), line))
                .collect(),
        }
    }

    /// Add a line, merging additively with any existing line for the same
    /// item: the resulting quantity is the sum of existing and incoming,
    /// not a replacement.
    ///
    /// Returns the line as it stands after the merge.
    pub fn merge_add(&mut self, line: CartLine) -> &CartLine {
        let incoming = line.quantity;
        self.lines
            .entry(line.item_id.clone())
            .and_modify(|existing| {
                existing.quantity = existing.quantity.saturating_add(incoming);
            })
            .or_insert(line)
    }

    /// Set the quantity for an item. Zero removes the line; the caller
    /// handles negative inputs before they reach the unsigned domain.
    pub fn set_quantity(&mut self, item_id: &ItemId, quantity: u32) {
        if quantity == 0 {
            self.lines.remove(item_id);
        } else if let Some(line) = self.lines.get_mut(item_id) {
            line.quantity = quantity;
        }
    }

    /// Remove the line for an item. Idempotent.
    pub fn remove(&mut self, item_id: &ItemId) {
        self.lines.remove(item_id);
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Look up the line for an item.
    #[must_use]
    pub fn get(&self, item_id: &ItemId) -> Option<&CartLine> {
        self.lines.get(item_id)
    }

    /// Iterate over lines in item-id order.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total unit count across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .values()
            .map(|line| line.quantity)
            .fold(0, u32::saturating_add)
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.values().map(CartLine::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zar(cents: i64) -> Price {
        Price::zar(Decimal::new(cents, 2))
    }

    fn line(item: &str, quantity: u32) -> CartLine {
        CartLine::new(item, item.to_uppercase(), zar(1000), "", quantity)
    }

    #[test]
    fn test_merge_add_is_additive() {
        let mut cart = Cart::empty();
        cart.merge_add(line("shirt-1", 2));
        let merged = cart.merge_add(line("shirt-1", 3));
        assert_eq!(merged.quantity, 5);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_merge_add_keeps_one_line_per_item() {
        let mut cart = Cart::empty();
        for _ in 0..4 {
            cart.merge_add(line("hat-1", 1));
        }
        cart.merge_add(line("shirt-1", 1));
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(&ItemId::new("hat-1")).map(|l| l.quantity), Some(4));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::empty();
        cart.merge_add(line("shirt-1", 2));
        cart.set_quantity(&ItemId::new("shirt-1"), 0);
        assert!(cart.get(&ItemId::new("shirt-1")).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = Cart::empty();
        cart.remove(&ItemId::new("missing"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_subtotal_and_item_count() {
        let mut cart = Cart::empty();
        cart.merge_add(CartLine::new(
            "shirt-1",
            "Shirt",
            zar(4999),
            "",
            2,
        ));
        cart.merge_add(CartLine::new(
            "hat-1",
            "Hat",
            zar(1500),
            "",
            1,
        ));
        assert_eq!(cart.subtotal(), Decimal::new(11498, 2));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_from_lines_later_duplicate_wins() {
        let cart = Cart::from_lines([line("shirt-1", 1), line("shirt-1", 7)]);
        assert_eq!(cart.len(), 1);
        assert_eq!(
            cart.get(&ItemId::new("shirt-1")).map(|l| l.quantity),
            Some(7)
        );
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut target = line("shirt-1", 2);
        LinePatch::quantity(9).merge_into(&mut target);
        assert_eq!(target.quantity, 9);
        assert_eq!(target.display_name, "SHIRT-1");
        assert_eq!(target.unit_price, zar(1000));
    }

    #[test]
    fn test_line_decodes_with_missing_fields() {
        let decoded: CartLine = serde_json::from_str(r#"{"id":"shirt-1"}"#).unwrap();
        assert_eq!(decoded.item_id, ItemId::new("shirt-1"));
        assert_eq!(decoded.quantity, 1);
        assert_eq!(decoded.unit_price.amount, Decimal::ZERO);
    }
}
