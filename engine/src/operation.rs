//! Pending operations: mutations that could not reach the backend yet.
//!
//! An operation carries the full post-mutation state needed to replay it, so
//! replaying never depends on anything but the operation itself.

use crate::{
    cart::{CartItem, RemoveItem},
    error::Result,
    Error, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying the kind of mutation.
///
/// The set is open: tags this build does not know are kept as
/// [`OperationKind::Other`] so they survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    UpdateCart,
    UpdateProductsWithoutOffers,
    RemoveItem,
    Other(String),
}

impl OperationKind {
    /// The wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::UpdateCart => "UPDATE_CART",
            OperationKind::UpdateProductsWithoutOffers => "UPDATE_PRODUCTS_WITHOUT_OFFERS",
            OperationKind::RemoveItem => "REMOVE_ITEM",
            OperationKind::Other(tag) => tag,
        }
    }

    /// Whether a newer operation of this kind replaces older queued ones.
    ///
    /// Whole-state kinds collapse; removals and unknown kinds always append.
    pub fn collapses(&self) -> bool {
        matches!(
            self,
            OperationKind::UpdateCart | OperationKind::UpdateProductsWithoutOffers
        )
    }
}

impl From<String> for OperationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "UPDATE_CART" => OperationKind::UpdateCart,
            "UPDATE_PRODUCTS_WITHOUT_OFFERS" => OperationKind::UpdateProductsWithoutOffers,
            "REMOVE_ITEM" => OperationKind::RemoveItem,
            _ => OperationKind::Other(tag),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation waiting to be replayed against the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Mutation kind
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Full state needed to replay the call
    #[serde(alias = "data")]
    pub payload: serde_json::Value,
    /// Insertion time (ms epoch)
    pub timestamp: Timestamp,
    /// Replays the backend rejected so far
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl PendingOperation {
    /// Create an operation from raw parts.
    pub fn new(kind: OperationKind, payload: serde_json::Value, timestamp: Timestamp) -> Self {
        Self {
            kind,
            payload,
            timestamp,
            attempts: 0,
        }
    }

    /// Replace the whole cart.
    pub fn update_cart(items: &[CartItem], timestamp: Timestamp) -> Result<Self> {
        let kind = OperationKind::UpdateCart;
        let payload = to_payload(&kind, items)?;
        Ok(Self::new(kind, payload, timestamp))
    }

    /// Replace the whole offer-less product list.
    pub fn update_products_without_offers(
        items: &[CartItem],
        timestamp: Timestamp,
    ) -> Result<Self> {
        let kind = OperationKind::UpdateProductsWithoutOffers;
        let payload = to_payload(&kind, items)?;
        Ok(Self::new(kind, payload, timestamp))
    }

    /// Remove one product.
    pub fn remove_item(removal: &RemoveItem, timestamp: Timestamp) -> Result<Self> {
        let kind = OperationKind::RemoveItem;
        let payload = to_payload(&kind, removal)?;
        Ok(Self::new(kind, payload, timestamp))
    }

    /// Decode the payload of a whole-state operation.
    pub fn items(&self) -> Result<Vec<CartItem>> {
        self.decode()
    }

    /// Decode the payload of a removal.
    pub fn removal(&self) -> Result<RemoveItem> {
        self.decode()
    }

    fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| Error::InvalidPayload {
            kind: self.kind.to_string(),
            reason: e.to_string(),
        })
    }
}

fn to_payload<T: Serialize + ?Sized>(kind: &OperationKind, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}
