//! Replaying one pending operation against the backend.
//!
//! The same dispatch serves immediate (online) mutations and queue drains, so
//! a mutation behaves identically whether it is sent now or later.

use storefront_engine::{CartItem, OperationKind, PendingOperation, RemoveItem};

use crate::backend::Backend;
use crate::coordinator::CartList;
use crate::error::{Error, Result};

/// Canonical state of one list after a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub list: CartList,
    pub items: Vec<CartItem>,
}

/// Send a whole-list replacement. Falls back to the sent items when the server
/// does not echo them.
pub async fn replace_list(
    backend: &dyn Backend,
    user_id: &str,
    list: CartList,
    items: Vec<CartItem>,
) -> Result<Reconciled> {
    let confirmed = match list {
        CartList::Cart => backend.replace_cart(user_id, &items).await?,
        CartList::ProductsWithoutOffers => {
            backend
                .replace_products_without_offers(user_id, &items)
                .await?
        }
    };
    Ok(Reconciled {
        list,
        items: confirmed.unwrap_or(items),
    })
}

/// Delete a product, then fetch the affected list from the server.
pub async fn remove_and_refetch(backend: &dyn Backend, removal: &RemoveItem) -> Result<Reconciled> {
    backend
        .remove_item(&removal.user_id, &removal.product_id)
        .await?;

    let (list, items) = if removal.is_product_without_offer {
        (
            CartList::ProductsWithoutOffers,
            backend
                .fetch_products_without_offers(&removal.user_id)
                .await?,
        )
    } else {
        (CartList::Cart, backend.fetch_cart(&removal.user_id).await?)
    };
    Ok(Reconciled { list, items })
}

/// Replay a queued operation.
pub async fn replay(
    backend: &dyn Backend,
    user_id: &str,
    op: &PendingOperation,
) -> Result<Reconciled> {
    match &op.kind {
        OperationKind::UpdateCart => {
            replace_list(backend, user_id, CartList::Cart, op.items()?).await
        }
        OperationKind::UpdateProductsWithoutOffers => {
            replace_list(backend, user_id, CartList::ProductsWithoutOffers, op.items()?).await
        }
        OperationKind::RemoveItem => remove_and_refetch(backend, &op.removal()?).await,
        OperationKind::Other(tag) => Err(Error::Unsupported(tag.clone())),
    }
}
