//! The platform's own network-interface signal.

use std::sync::atomic::{AtomicBool, Ordering};

/// Raw reachability as reported by the host platform (the equivalent of a
/// browser's `navigator.onLine`).
pub trait Platform: Send + Sync {
    fn is_online(&self) -> bool;
}

/// A platform flag updated by whoever receives the host's network events.
#[derive(Debug)]
pub struct NetworkFlag {
    online: AtomicBool,
}

impl NetworkFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Record a native online/offline event.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for NetworkFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Platform for NetworkFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
