//! Transient user notifications.
//!
//! Notifications are never persisted. Each one lives for the display duration
//! and is then expired, either by the runtime's timer calling
//! [`NotificationCenter::dismiss`] or by [`NotificationCenter::expire`].

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// How long a notification stays visible.
pub const DEFAULT_DISPLAY_MS: Timestamp = 5_000;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: Timestamp,
}

/// The list of visible notifications.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    active: Vec<Notification>,
    next_id: u64,
    display_ms: Timestamp,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_MS)
    }
}

impl NotificationCenter {
    /// Create a center whose notifications last `display_ms`.
    pub fn new(display_ms: Timestamp) -> Self {
        Self {
            active: Vec::new(),
            next_id: 1,
            display_ms,
        }
    }

    /// Display duration in milliseconds.
    pub fn display_ms(&self) -> Timestamp {
        self.display_ms
    }

    /// Add a notification.
    ///
    /// Returns `None` without doing anything if the title or the message is
    /// empty.
    pub fn show(
        &mut self,
        title: &str,
        message: &str,
        kind: NotificationKind,
        now: Timestamp,
    ) -> Option<Notification> {
        if title.trim().is_empty() || message.trim().is_empty() {
            return None;
        }
        let notification = Notification {
            id: self.next_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            created_at: now,
        };
        self.next_id += 1;
        self.active.push(notification.clone());
        Some(notification)
    }

    /// Remove a notification by ID. Returns whether it was still visible.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        before != self.active.len()
    }

    /// Drop every notification whose display time has elapsed at `now`.
    pub fn expire(&mut self, now: Timestamp) -> usize {
        let before = self.active.len();
        let display_ms = self.display_ms;
        self.active
            .retain(|n| now.saturating_sub(n.created_at) < display_ms);
        before - self.active.len()
    }

    /// Visible notifications, oldest first.
    pub fn active(&self) -> &[Notification] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_requires_title_and_message() {
        let mut center = NotificationCenter::default();
        assert!(center.show("", "body", NotificationKind::Info, 0).is_none());
        assert!(center.show("Title", "  ", NotificationKind::Info, 0).is_none());
        assert!(center.active().is_empty());

        let n = center
            .show("Title", "body", NotificationKind::Success, 0)
            .unwrap();
        assert_eq!(n.id, 1);
        assert_eq!(center.active().len(), 1);
    }

    #[test]
    fn expires_after_display_time() {
        let mut center = NotificationCenter::default();
        center.show("A", "a", NotificationKind::Info, 1_000);
        center.show("B", "b", NotificationKind::Warning, 3_000);

        assert_eq!(center.expire(5_999), 0);
        assert_eq!(center.expire(6_001), 1);
        assert_eq!(center.active()[0].title, "B");
        assert_eq!(center.expire(8_001), 1);
        assert!(center.active().is_empty());
    }

    #[test]
    fn dismiss_by_id() {
        let mut center = NotificationCenter::default();
        let a = center.show("A", "a", NotificationKind::Info, 0).unwrap();
        let b = center.show("B", "b", NotificationKind::Error, 0).unwrap();
        assert_ne!(a.id, b.id);

        assert!(center.dismiss(a.id));
        assert!(!center.dismiss(a.id));
        assert_eq!(center.active(), &[b]);
    }

    #[test]
    fn wire_format() {
        let mut center = NotificationCenter::default();
        let n = center.show("Hi", "there", NotificationKind::Warning, 7).unwrap();
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["createdAt"], 7);
    }
}
