//! # Storefront Runtime
//!
//! The IO half of the storefront's offline mode: everything that waits on the
//! network, a timer or the disk.
//!
//! - [`ConnectivityMonitor`] probes the backend and reports reachability flips.
//! - [`Broadcaster`] outlives any one client and fans status out to all of them.
//! - [`ConnectivityContext`] is the per-client source of truth for `is_online`.
//! - [`CartCoordinator`] applies cart mutations optimistically and queues the
//!   ones that cannot reach the backend; [`CartCoordinator::drain`] replays them.
//! - [`OfflineRuntime`] wires one client together.
//!
//! The `storefront-agent` binary exposes the broadcaster to pages over
//! WebSocket.

pub mod app;
pub mod backend;
pub mod broadcaster;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod drain;
pub mod error;
pub mod file_store;
pub mod handlers;
pub mod monitor;
pub mod platform;
pub mod replay;
pub mod routes;

use std::sync::Arc;

pub use app::OfflineRuntime;
pub use backend::{Backend, HttpBackend};
pub use broadcaster::{Broadcaster, ClientRequest};
pub use config::{Config, ConfigError};
pub use context::{Connectivity, ConnectivityContext, ContextEvent, Subscription};
pub use coordinator::{
    CartCoordinator, CartList, CartState, CoordinatorSettings, LoadOutcome, MutationOutcome,
};
pub use drain::{DrainOutcome, DrainReport};
pub use error::{Error, Result};
pub use file_store::FileStore;
pub use monitor::{ConnectivityMonitor, HttpProbe, Probe};
pub use platform::{NetworkFlag, Platform};

/// Shared state of the agent's HTTP handlers.
#[derive(Clone)]
pub struct AgentState {
    pub broadcaster: Arc<Broadcaster>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub config: Arc<Config>,
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
