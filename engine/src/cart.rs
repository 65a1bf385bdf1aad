//! Cart state model and the pure mutations the storefront applies to it.
//!
//! Items keep whatever fields the backend sent; only the product ID and the
//! quantity are interpreted here.

use crate::{ProductId, UserId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single line of the cart (or of the offer-less product list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier
    #[serde(rename = "ID_Producto", deserialize_with = "id_from_string_or_number")]
    pub product_id: ProductId,
    /// Quantity in the cart
    #[serde(rename = "Cantidad", default = "default_quantity")]
    pub quantity: u32,
    /// Remaining backend fields (name, price, discount, ...), kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_quantity() -> u32 {
    1
}

impl CartItem {
    /// Create an item with no extra fields.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            extra: Map::new(),
        }
    }

    /// Attach an extra backend field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Increase,
    Decrease,
}

/// Return a copy of `items` with the quantity of `product_id` changed.
///
/// Decreasing never goes below 1; removal is a separate mutation.
pub fn apply_quantity_change(
    items: &[CartItem],
    product_id: &str,
    change: QuantityChange,
) -> Vec<CartItem> {
    items
        .iter()
        .map(|item| {
            if item.product_id != product_id {
                return item.clone();
            }
            let quantity = match change {
                QuantityChange::Increase => item.quantity.saturating_add(1),
                QuantityChange::Decrease => item.quantity.saturating_sub(1).max(1),
            };
            CartItem {
                quantity,
                ..item.clone()
            }
        })
        .collect()
}

/// Return a copy of `items` without `product_id`.
pub fn remove_product(items: &[CartItem], product_id: &str) -> Vec<CartItem> {
    items
        .iter()
        .filter(|item| item.product_id != product_id)
        .cloned()
        .collect()
}

/// Check whether `items` holds `product_id`.
pub fn contains_product(items: &[CartItem], product_id: &str) -> bool {
    items.iter().any(|item| item.product_id == product_id)
}

/// Payload of a queued item removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItem {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub user_id: UserId,
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub product_id: ProductId,
    /// Whether the product lives in the offer-less list rather than the cart
    #[serde(default)]
    pub is_product_without_offer: bool,
}

/// Accept identifiers written either as JSON strings or numbers.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}
