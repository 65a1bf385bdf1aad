//! Connectivity state machine.
//!
//! Two states, online and offline. Native network events, broadcast messages
//! and liveness probes all feed the same state; the last event wins. A
//! [`Transition`] is produced only when the boolean actually flips, which is
//! what keeps repeated identical signals from producing duplicate
//! notifications.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Current reachability belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityStatus {
    pub is_online: bool,
    /// When this belief was last confirmed (ms epoch)
    pub timestamp: Timestamp,
}

/// Where a connectivity signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// The platform's own online/offline event
    Native,
    /// A status message from the background broadcaster
    Broadcast,
    /// An active health probe against the backend
    Probe,
}

/// A change of the online flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: bool,
    pub current: bool,
    pub source: SignalSource,
    pub timestamp: Timestamp,
}

impl Transition {
    /// Whether connectivity came back.
    pub fn is_restored(&self) -> bool {
        !self.previous && self.current
    }
}

/// Holds the status and detects transitions.
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    status: ConnectivityStatus,
}

impl ConnectivityState {
    /// Start in the platform's current reachability.
    pub fn new(is_online: bool, now: Timestamp) -> Self {
        Self {
            status: ConnectivityStatus {
                is_online,
                timestamp: now,
            },
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    /// Current online flag.
    pub fn is_online(&self) -> bool {
        self.status.is_online
    }

    /// Record a signal. Returns a transition if the flag changed.
    pub fn observe(
        &mut self,
        is_online: bool,
        source: SignalSource,
        now: Timestamp,
    ) -> Option<Transition> {
        let previous = self.status.is_online;
        self.status = ConnectivityStatus {
            is_online,
            timestamp: now,
        };
        (previous != is_online).then_some(Transition {
            previous,
            current: is_online,
            source,
            timestamp: now,
        })
    }
}
