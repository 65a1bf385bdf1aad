//! The storefront REST API, as seen by the offline layer.
//!
//! Each pending-operation kind maps to exactly one call shape:
//!
//! | kind                             | request                                        |
//! |----------------------------------|------------------------------------------------|
//! | `UPDATE_CART`                    | `PUT /carrito/{user}` `{items}`                |
//! | `UPDATE_PRODUCTS_WITHOUT_OFFERS` | `PUT /carrito-sin-oferta/{user}` `{items}`     |
//! | `REMOVE_ITEM`                    | `DELETE /carrito` `{ID_Usuario, ID_Producto}`  |
//!
//! Removals are followed by a `GET` of the affected list so the caller can
//! replace its cache with the canonical state.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use storefront_engine::CartItem;

use crate::error::{Error, Result};

/// REST collaborator.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Replace the user's cart. Returns the server's items when it sends them.
    async fn replace_cart(&self, user_id: &str, items: &[CartItem]) -> Result<Option<Vec<CartItem>>>;

    /// Replace the user's offer-less product list.
    async fn replace_products_without_offers(
        &self,
        user_id: &str,
        items: &[CartItem],
    ) -> Result<Option<Vec<CartItem>>>;

    /// Remove one product from the user's cart.
    async fn remove_item(&self, user_id: &str, product_id: &str) -> Result<()>;

    /// Fetch the canonical cart.
    async fn fetch_cart(&self, user_id: &str) -> Result<Vec<CartItem>>;

    /// Fetch the canonical offer-less product list.
    async fn fetch_products_without_offers(&self, user_id: &str) -> Result<Vec<CartItem>>;
}

#[derive(Serialize)]
struct ItemsBody<'a> {
    items: &'a [CartItem],
}

#[derive(Serialize)]
struct RemoveBody<'a> {
    #[serde(rename = "ID_Usuario")]
    user_id: &'a str,
    #[serde(rename = "ID_Producto")]
    product_id: &'a str,
}

/// Extract items from a response that is either an array or `{items: [...]}`.
pub(crate) fn items_from_response(body: Value) -> Option<Vec<CartItem>> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut map) => map.remove("items")?,
        _ => return None,
    };
    serde_json::from_value(list).ok()
}

/// [`Backend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the API at `base_url`, with a default per-request
    /// timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidResponse(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and turn non-2xx answers into [`Error::Rejected`].
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), "Backend rejected request");
        Err(Error::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn json_body(response: reqwest::Response) -> Result<Value> {
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    async fn put_items(&self, path: String, items: &[CartItem]) -> Result<Option<Vec<CartItem>>> {
        let response = self
            .send(self.client.put(self.url(&path)).json(&ItemsBody { items }))
            .await?;
        Ok(items_from_response(Self::json_body(response).await?))
    }

    async fn get_items(&self, path: String) -> Result<Vec<CartItem>> {
        let response = self.send(self.client.get(self.url(&path))).await?;
        match Self::json_body(response).await? {
            Value::Null => Ok(Vec::new()),
            body => items_from_response(body)
                .ok_or_else(|| Error::InvalidResponse(format!("{path}: expected an item list"))),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn replace_cart(&self, user_id: &str, items: &[CartItem]) -> Result<Option<Vec<CartItem>>> {
        self.put_items(format!("/carrito/{user_id}"), items).await
    }

    async fn replace_products_without_offers(
        &self,
        user_id: &str,
        items: &[CartItem],
    ) -> Result<Option<Vec<CartItem>>> {
        self.put_items(format!("/carrito-sin-oferta/{user_id}"), items)
            .await
    }

    async fn remove_item(&self, user_id: &str, product_id: &str) -> Result<()> {
        self.send(
            self.client
                .delete(self.url("/carrito"))
                .json(&RemoveBody { user_id, product_id }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_cart(&self, user_id: &str) -> Result<Vec<CartItem>> {
        self.get_items(format!("/carrito/{user_id}")).await
    }

    async fn fetch_products_without_offers(&self, user_id: &str) -> Result<Vec<CartItem>> {
        self.get_items(format!("/carrito-sin-oferta/{user_id}"))
            .await
    }
}
