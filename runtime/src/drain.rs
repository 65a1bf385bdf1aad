//! Replaying the pending queue once the backend is reachable again.
//!
//! Entries replay in insertion order. Each one is removed from the persisted
//! queue as soon as it succeeds, so a crash mid-drain never replays it twice.
//! A connectivity failure halts the pass; a rejection only costs that entry an
//! attempt. One drain pass holds the store's drain lease so two clients
//! sharing the store never submit the same entry; the lease is refreshed
//! before every entry so a long pass never looks abandoned. Within one
//! coordinator, overlapping passes are refused outright.

use storefront_engine::{lease, KeyValueStore, NotificationKind, PendingOperation};

use crate::coordinator::{bounded, CartCoordinator};
use crate::now_ms;
use crate::replay;

/// Tally of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries the backend accepted
    pub replayed: usize,
    /// Rejected entries kept for another attempt
    pub retained: usize,
    /// Entries dropped after too many rejections
    pub dropped: usize,
    /// Whether a connectivity failure stopped the pass early
    pub halted: bool,
    /// Entries still queued afterwards
    pub remaining: usize,
}

impl DrainReport {
    /// Every entry was accepted and nothing is left.
    pub fn is_clean(&self) -> bool {
        !self.halted && self.retained == 0 && self.dropped == 0 && self.remaining == 0
    }
}

/// Result of [`CartCoordinator::drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Not online; nothing attempted.
    Offline,
    /// No signed-in user to replay for.
    Unauthenticated,
    /// Another client holds the drain lease.
    Busy,
    /// The queue was empty.
    Empty,
    /// Every entry reached the backend.
    Completed(DrainReport),
    /// Some entries are still queued.
    Incomplete(DrainReport),
}

enum Step {
    Replayed,
    Retained,
    Dropped,
    Halt,
}

impl CartCoordinator {
    /// Replay the pending queue.
    ///
    /// Shows exactly one notification whenever there was something to replay.
    pub async fn drain(&self) -> DrainOutcome {
        if !self.connectivity.is_online() {
            return DrainOutcome::Offline;
        }
        let Some(user_id) = self.user_id.clone() else {
            return DrainOutcome::Unauthenticated;
        };
        let entries = self.load_queue().to_vec();
        if entries.is_empty() {
            return DrainOutcome::Empty;
        }

        let Ok(_pass) = self.drain_pass.try_lock() else {
            tracing::debug!("A drain pass is already running");
            return DrainOutcome::Busy;
        };

        let store = self.store.as_ref();
        let ttl = self.settings.drain_lease_ttl.as_millis() as u64;
        if !self.hold_lease(store, ttl) {
            return DrainOutcome::Busy;
        }

        tracing::info!(entries = entries.len(), "Draining pending changes");
        let mut report = DrainReport::default();
        for (index, op) in entries.iter().enumerate() {
            if index > 0 && !self.hold_lease(store, ttl) {
                report.halted = true;
                break;
            }
            match self.replay_entry(&user_id, op).await {
                Step::Replayed => report.replayed += 1,
                Step::Retained => report.retained += 1,
                Step::Dropped => report.dropped += 1,
                Step::Halt => {
                    report.halted = true;
                    break;
                }
            }
        }
        report.remaining = self.load_queue().len();

        if let Err(e) = lease::release(store, &self.id) {
            tracing::warn!("Could not release the drain lease: {}", e);
        }

        tracing::info!(
            replayed = report.replayed,
            retained = report.retained,
            dropped = report.dropped,
            remaining = report.remaining,
            halted = report.halted,
            "Drain finished"
        );

        if report.is_clean() {
            self.connectivity.show_notification(
                "Sync complete",
                "All pending changes were synced",
                NotificationKind::Success,
            );
            DrainOutcome::Completed(report)
        } else {
            self.connectivity.show_notification(
                "Sync error",
                "Some changes could not be synced",
                NotificationKind::Error,
            );
            DrainOutcome::Incomplete(report)
        }
    }

    /// Take or refresh the drain lease.
    fn hold_lease(&self, store: &dyn KeyValueStore, ttl: u64) -> bool {
        match lease::try_acquire(store, &self.id, now_ms(), ttl) {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!("Another client is draining pending changes");
                false
            }
            Err(e) => {
                tracing::warn!("Could not take the drain lease: {}", e);
                false
            }
        }
    }

    async fn replay_entry(&self, user_id: &str, op: &PendingOperation) -> Step {
        let call = replay::replay(self.backend.as_ref(), user_id, op);
        match bounded(self.settings.request_timeout, call).await {
            Ok(reconciled) => {
                self.with_queue(|queue| queue.remove_first(op));
                self.reconcile(reconciled);
                Step::Replayed
            }
            Err(e) if e.is_connectivity() => {
                tracing::info!(kind = %op.kind, "Backend unreachable during drain: {}", e);
                Step::Halt
            }
            Err(e) => {
                let attempts = op.attempts + 1;
                if attempts >= self.settings.max_replay_attempts {
                    tracing::warn!(kind = %op.kind, attempts, "Dropping pending change: {}", e);
                    self.with_queue(|queue| queue.remove_first(op));
                    Step::Dropped
                } else {
                    tracing::warn!(kind = %op.kind, attempts, "Pending change rejected: {}", e);
                    let retried = PendingOperation {
                        attempts,
                        ..op.clone()
                    };
                    self.with_queue(|queue| queue.replace_first(op, retried));
                    Step::Retained
                }
            }
        }
    }
}
