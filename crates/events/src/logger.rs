//! Event logging service.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every [`MirrorEvent`] to the tracing log. It runs as a long-lived
//! background task and exits when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::MirrorEvent;
use crate::notify::Severity;

pub struct EventLogger;

impl EventLogger {
    /// Run the logging loop until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<MirrorEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &MirrorEvent) {
        match event {
            MirrorEvent::Notice(notice) => match notice.severity {
                Severity::Info => tracing::info!(id = %notice.id, "{}", notice.message),
                Severity::Warning => tracing::warn!(id = %notice.id, "{}", notice.message),
                Severity::Error => tracing::error!(id = %notice.id, "{}", notice.message),
            },
            MirrorEvent::ConnectionChanged { connected } => {
                tracing::info!(connected, "Push channel state changed");
            }
            MirrorEvent::TimeMetricsUpdated { job_id, metrics } => {
                tracing::trace!(
                    job_id,
                    elapsed_ms = metrics.elapsed_time_ms,
                    remaining_ms = ?metrics.remaining_time_ms,
                    extra_ms = metrics.extra_time_ms,
                    "Time metrics updated"
                );
            }
            other => {
                let payload = serde_json::to_string(other).unwrap_or_default();
                tracing::debug!(event = other.name(), %payload, "Mirror event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn logger_exits_when_bus_dropped() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let handle = tokio::spawn(EventLogger::run(rx));

        bus.publish(MirrorEvent::JobRemoved { job_id: 1 });
        drop(bus);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .expect("logger task should not panic");
    }
}
