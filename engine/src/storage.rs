//! Durable key/value storage abstraction.
//!
//! The engine never touches a disk itself. Every persisted value (the pending
//! queue, cached carts, the drain lease) goes through [`KeyValueStore`], which
//! the runtime backs with files and tests back with [`MemoryStore`].

use crate::{error::Result, Error};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Well-known storage keys.
pub mod keys {
    /// JSON array of pending operations.
    pub const PENDING_CHANGES: &str = "pendingChanges";
    /// Marker guarding the queue while one client drains it.
    pub const DRAIN_LEASE: &str = "pendingChanges.lease";
    /// Cached cart items.
    pub const CART_ITEMS: &str = "cartItems";
    /// Cached offer-less product list.
    pub const PRODUCTS_WITHOUT_OFFERS: &str = "productsWithoutOffers";
    /// When the offer-less product list was last written (ms epoch).
    pub const PRODUCTS_WITHOUT_OFFERS_TIMESTAMP: &str = "productsWithoutOffersTimestamp";
    /// Last known connection state, `"online"` or `"offline"`.
    pub const CONNECTION_STATE: &str = "connectionState";
}

/// A string key/value store shared by every client of one profile.
///
/// Implementations use interior mutability; writes are read-modify-write with
/// no locking across clients.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value.
///
/// A missing key is `Ok(None)`; undecodable content is [`Error::CorruptEntry`].
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::CorruptEntry {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Encode and write a JSON value.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?;
    store.set(key, &raw)
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
