//! Drain lease: a marker in the shared store saying one client is draining.
//!
//! Every client of a profile reads and writes the same queue entry. Before
//! replaying it, a client takes the lease; another client seeing a fresh lease
//! held by someone else skips its drain. A lease older than its TTL is treated
//! as abandoned (the holder crashed or was closed mid-drain).
//!
//! The check-then-write is not atomic. It narrows the double-submit window to
//! the time between two store calls, which is what a shared key/value store
//! without compare-and-swap allows.

use crate::{
    error::Result,
    storage::{keys, read_json, write_json, KeyValueStore},
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// Who is draining, and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainLease {
    pub holder: String,
    pub acquired_at: Timestamp,
}

impl DrainLease {
    /// Whether the lease is older than `ttl` at `now`.
    pub fn is_stale(&self, now: Timestamp, ttl: Timestamp) -> bool {
        now.saturating_sub(self.acquired_at) >= ttl
    }
}

/// Read the current lease, if any. An unreadable lease counts as absent.
pub fn current(store: &dyn KeyValueStore) -> Result<Option<DrainLease>> {
    match read_json(store, keys::DRAIN_LEASE) {
        Err(e) if e.is_corrupt() => Ok(None),
        other => other,
    }
}

/// Try to take the lease for `holder`.
///
/// Succeeds when there is no lease, when `holder` already holds it, or when
/// the existing lease is stale.
pub fn try_acquire(
    store: &dyn KeyValueStore,
    holder: &str,
    now: Timestamp,
    ttl: Timestamp,
) -> Result<bool> {
    if let Some(existing) = current(store)? {
        if existing.holder != holder && !existing.is_stale(now, ttl) {
            return Ok(false);
        }
    }
    let lease = DrainLease {
        holder: holder.to_string(),
        acquired_at: now,
    };
    write_json(store, keys::DRAIN_LEASE, &lease)?;
    Ok(true)
}

/// Give the lease back. Does nothing if someone else holds it now.
pub fn release(store: &dyn KeyValueStore, holder: &str) -> Result<()> {
    match current(store)? {
        Some(lease) if lease.holder == holder => store.remove(keys::DRAIN_LEASE),
        _ => Ok(()),
    }
}
