//! # Storefront Engine
//!
//! Deterministic core of the storefront's offline mode.
//!
//! This crate holds the logic that decides what happens to a cart mutation
//! that cannot reach the backend: how it is queued, how the queue collapses
//! and persists, how connectivity signals turn into state transitions, and
//! which notifications the user sees.
//!
//! ## Design Principles
//!
//! - **No IO**: no network, no clock, no files. Time is passed in as a
//!   millisecond [`Timestamp`]; persistence goes through [`KeyValueStore`].
//! - **Deterministic**: the same inputs always produce the same queue.
//! - **Testable**: everything here runs without mocks or a runtime.
//!
//! ## Core Concepts
//!
//! ### Pending operations
//!
//! A [`PendingOperation`] is a mutation that has not reached the backend. Its
//! payload is the full post-mutation state, so it can be replayed on its own.
//!
//! ### The queue
//!
//! [`PendingQueue`] keeps operations in insertion order. Whole-state kinds
//! (`UPDATE_CART`, `UPDATE_PRODUCTS_WITHOUT_OFFERS`) collapse: enqueuing one
//! removes older entries of the same kind first. `REMOVE_ITEM` always appends.
//!
//! ### Connectivity
//!
//! [`ConnectivityState`] merges native events, broadcasts and probes into one
//! online flag and reports a [`Transition`] only when the flag flips.
//!
//! ## Quick Start
//!
//! ```rust
//! use storefront_engine::{CartItem, MemoryStore, PendingOperation, PendingQueue};
//!
//! let store = MemoryStore::new();
//! let mut queue = PendingQueue::load(&store).unwrap();
//!
//! let cart = vec![CartItem::new("P1", 2)];
//! queue.enqueue(PendingOperation::update_cart(&cart, 1706745600000).unwrap());
//!
//! let cart = vec![CartItem::new("P1", 3)];
//! queue.enqueue(PendingOperation::update_cart(&cart, 1706745601000).unwrap());
//!
//! // The second update replaced the first
//! assert_eq!(queue.len(), 1);
//! queue.save(&store).unwrap();
//! ```

pub mod cart;
pub mod connectivity;
pub mod error;
pub mod lease;
pub mod message;
pub mod notification;
pub mod operation;
pub mod queue;
pub mod storage;

// Re-export main types at crate root
pub use cart::{CartItem, QuantityChange, RemoveItem};
pub use connectivity::{ConnectivityState, ConnectivityStatus, SignalSource, Transition};
pub use error::{Error, Result};
pub use lease::DrainLease;
pub use message::ConnectivityMessage;
pub use notification::{Notification, NotificationCenter, NotificationKind, DEFAULT_DISPLAY_MS};
pub use operation::{OperationKind, PendingOperation};
pub use queue::PendingQueue;
pub use storage::{keys, KeyValueStore, MemoryStore};

/// Type aliases for clarity
pub type ProductId = String;
pub type UserId = String;
pub type Timestamp = u64;
