//! Time projection between server pushes.
//!
//! [`compute`] derives elapsed / remaining / extra time for one job from
//! its static facts and the current time. [`Projector`] is the keyed
//! registry of periodic tickers: one cancellable task per ticking job,
//! owned here and never stored on the job itself. Tickers only post
//! [`Command::Tick`] to the engine inbox; the engine runs the computation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use printdeck_core::job::{DerivedTimeMetrics, StaticTimeFacts};
use printdeck_core::status::PrinterStatus;
use printdeck_core::types::{DbId, EpochMillis};

use crate::engine::Command;

/// Default period between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Project derived metrics for one tick.
///
/// Without static facts the previous metrics are returned untouched.
/// Values that cannot be computed keep their previous value.
pub fn compute(
    facts: Option<&StaticTimeFacts>,
    status: PrinterStatus,
    previous: &DerivedTimeMetrics,
    now: EpochMillis,
) -> DerivedTimeMetrics {
    let Some(facts) = facts else {
        return *previous;
    };
    let mut next = *previous;

    if facts.total_duration_seconds.is_finite() {
        next.total_time_ms = (facts.total_duration_seconds * 1000.0) as i64;
    }
    next.eta_ms = facts.eta;

    if status.is_active() {
        let since_start = facts
            .started_at
            .and_then(|started_at| now.checked_sub(started_at))
            .filter(|since| *since >= 0)
            .and_then(round_to_second);
        if let Some(elapsed) = since_start {
            next.elapsed_time_ms = elapsed;
            if elapsed <= next.total_time_ms {
                next.remaining_time_ms = Some(next.total_time_ms - elapsed);
            }
        }
    }

    if next.elapsed_time_ms > next.total_time_ms {
        if let Some(overdue) = facts.eta.and_then(|eta| now.checked_sub(eta)) {
            // Monotonic, even when a pause moves the ETA later.
            next.extra_time_ms = next.extra_time_ms.max(overdue);
        }
    }

    // Marks "ticked at least once" before the first full second.
    if next.elapsed_time_ms == 0 {
        next.elapsed_time_ms = 1;
    }

    next
}

/// Round a non-negative millisecond span to the nearest whole second.
/// `None` when the span is too large to round.
fn round_to_second(millis: i64) -> Option<i64> {
    millis.checked_add(500).map(|m| m / 1000 * 1000)
}

// ---------------------------------------------------------------------------
// Ticker registry
// ---------------------------------------------------------------------------

struct Ticker {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of running tickers, keyed by job id.
///
/// At most one ticker exists per job. Starting always stops the previous
/// one first, and every start gets a fresh generation so that ticks
/// already queued by a stopped ticker can be recognised and dropped.
pub struct Projector {
    tickers: HashMap<DbId, Ticker>,
    next_generation: u64,
    interval: Duration,
}

impl Projector {
    pub fn new(interval: Duration) -> Self {
        Self {
            tickers: HashMap::new(),
            next_generation: 0,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking `job_id`, posting ticks to `inbox`. Returns the new
    /// ticker's generation.
    pub fn start(&mut self, job_id: DbId, inbox: mpsc::Sender<Command>) -> u64 {
        self.stop(job_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        let period = self.interval;
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        if inbox.send(Command::Tick { job_id, generation }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(job_id, generation, "Ticker started");
        self.tickers.insert(
            job_id,
            Ticker {
                generation,
                cancel,
                handle,
            },
        );
        generation
    }

    /// Stop the ticker of `job_id`, if any. Takes effect immediately.
    pub fn stop(&mut self, job_id: DbId) -> bool {
        let Some(ticker) = self.tickers.remove(&job_id) else {
            return false;
        };
        ticker.cancel.cancel();
        ticker.handle.abort();
        tracing::debug!(job_id, generation = ticker.generation, "Ticker stopped");
        true
    }

    pub fn stop_all(&mut self) {
        for job_id in self.ticking_jobs() {
            self.stop(job_id);
        }
    }

    pub fn is_ticking(&self, job_id: DbId) -> bool {
        self.tickers.contains_key(&job_id)
    }

    /// Whether a tick from `generation` belongs to the live ticker.
    pub fn is_current(&self, job_id: DbId, generation: u64) -> bool {
        self.tickers
            .get(&job_id)
            .is_some_and(|ticker| ticker.generation == generation)
    }

    pub fn ticking_jobs(&self) -> Vec<DbId> {
        self.tickers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

impl Drop for Projector {
    fn drop(&mut self) {
        self.stop_all();
    }
}
