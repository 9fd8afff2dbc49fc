//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The engine publishes one [`MirrorEvent`] per effective store mutation,
//! immediately and without batching. Readers subscribe and re-read the
//! snapshot (or just the touched entity) when an event arrives.

use serde::Serialize;
use tokio::sync::broadcast;

use printdeck_core::job::DerivedTimeMetrics;
use printdeck_core::types::DbId;

use crate::notify::Notification;

// ---------------------------------------------------------------------------
// MirrorEvent
// ---------------------------------------------------------------------------

/// A change to the mirrored printer/job state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirrorEvent {
    /// The full printer list was replaced by a server snapshot.
    SnapshotLoaded { printer_count: usize },

    /// A printer-level field changed (status, temperatures, error, ...).
    PrinterUpdated { printer_id: DbId },

    /// A printer was deregistered, together with its queue.
    PrinterRemoved { printer_id: DbId },

    /// A job-level field changed, including its static time facts.
    JobUpdated { job_id: DbId },

    /// A job left its printer's queue.
    JobRemoved { job_id: DbId },

    /// The projector recomputed a job's derived time metrics.
    TimeMetricsUpdated {
        job_id: DbId,
        metrics: DerivedTimeMetrics,
    },

    /// The push channel came up or went down.
    ConnectionChanged { connected: bool },

    /// A user-facing notice was raised.
    Notice(Notification),
}

impl MirrorEvent {
    /// Dot-separated name for logs, e.g. `"job.updated"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SnapshotLoaded { .. } => "snapshot.loaded",
            Self::PrinterUpdated { .. } => "printer.updated",
            Self::PrinterRemoved { .. } => "printer.removed",
            Self::JobUpdated { .. } => "job.updated",
            Self::JobRemoved { .. } => "job.removed",
            Self::TimeMetricsUpdated { .. } => "job.time_updated",
            Self::ConnectionChanged { .. } => "connection.changed",
            Self::Notice(_) => "notice",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Shared via `Arc<EventBus>` between the engine (the only publisher) and any
/// number of readers.
pub struct EventBus {
    sender: broadcast::Sender<MirrorEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: MirrorEvent) {
        // A send error only means there are no receivers right now.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
