//! Pending-operation queue.
//!
//! The queue is an ordered list of [`PendingOperation`]s. Appending collapses
//! older whole-state operations of the same kind, so at most one
//! `UPDATE_CART` (and one `UPDATE_PRODUCTS_WITHOUT_OFFERS`) is ever queued.
//! Removals are never collapsed. Draining walks the list oldest first.

use crate::{
    error::Result,
    storage::{keys, read_json, write_json, KeyValueStore},
    PendingOperation,
};
use serde::{Deserialize, Serialize};

/// Ordered list of mutations waiting for the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue {
    operations: Vec<PendingOperation>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the queue persisted in `store`.
    ///
    /// A missing entry is an empty queue. Malformed content is reported as
    /// [`crate::Error::CorruptEntry`] so the caller can decide how loudly to
    /// discard it.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(read_json(store, keys::PENDING_CHANGES)?.unwrap_or_default())
    }

    /// Persist the queue. An empty queue deletes the entry.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        if self.operations.is_empty() {
            store.remove(keys::PENDING_CHANGES)
        } else {
            write_json(store, keys::PENDING_CHANGES, self)
        }
    }

    /// Collapse-then-append.
    ///
    /// Returns how many older entries the new operation replaced.
    pub fn enqueue(&mut self, op: PendingOperation) -> usize {
        let before = self.operations.len();
        if op.kind.collapses() {
            self.operations.retain(|queued| queued.kind != op.kind);
        }
        let collapsed = before - self.operations.len();
        self.operations.push(op);
        collapsed
    }

    /// Remove the first entry equal to `op`. Returns whether one was found.
    pub fn remove_first(&mut self, op: &PendingOperation) -> bool {
        match self.operations.iter().position(|queued| queued == op) {
            Some(index) => {
                self.operations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace the first entry equal to `old` with `new`, keeping its position.
    pub fn replace_first(&mut self, old: &PendingOperation, new: PendingOperation) -> bool {
        match self.operations.iter_mut().find(|queued| *queued == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.iter()
    }

    /// Copy of the entries, oldest first.
    pub fn to_vec(&self) -> Vec<PendingOperation> {
        self.operations.clone()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.operations.clear();
    }
}

impl FromIterator<PendingOperation> for PendingQueue {
    fn from_iter<I: IntoIterator<Item = PendingOperation>>(iter: I) -> Self {
        let mut queue = PendingQueue::new();
        for op in iter {
            queue.enqueue(op);
        }
        queue
    }
}
