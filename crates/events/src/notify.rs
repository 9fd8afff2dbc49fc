//! User-facing notices.
//!
//! The mirror never fails loudly: a resync that cannot reach the server
//! raises one [`Notification`] through a [`NotificationSink`] and carries on.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use printdeck_core::types::Timestamp;

use crate::bus::{EventBus, MirrorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single notice shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Receives notices raised by the engine.
///
/// Called from the engine task, so implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notices to bus subscribers as [`MirrorEvent::Notice`].
impl NotificationSink for EventBus {
    fn notify(&self, notification: Notification) {
        self.publish(MirrorEvent::Notice(notification));
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_get_unique_ids() {
        let a = Notification::warning("first");
        let b = Notification::warning("first");
        assert_ne!(a.id, b.id);
        assert_eq!(a.severity, Severity::Warning);
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.notify(Notification::warning("one"));
        sink.notify(Notification::error("two"));

        let seen = sink.notifications();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].message, "one");
        assert_eq!(seen[1].severity, Severity::Error);
    }

    #[tokio::test]
    async fn bus_sink_publishes_notice_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.notify(Notification::warning("Could not refresh timing"));

        match rx.recv().await.expect("should receive notice") {
            MirrorEvent::Notice(n) => assert_eq!(n.message, "Could not refresh timing"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
