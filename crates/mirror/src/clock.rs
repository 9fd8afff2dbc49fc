//! Wall-clock source for the time projector.

use chrono::Utc;
use tokio::time::Instant;

use printdeck_core::types::EpochMillis;

/// Current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> EpochMillis;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// Wall time anchored at a fixed instant and advanced by the tokio clock.
///
/// Under `#[tokio::test(start_paused = true)]` this clock moves exactly as
/// far as `tokio::time::advance` (or auto-advance) moves it.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_millis: EpochMillis,
}

impl TokioClock {
    pub fn starting_at(origin_millis: EpochMillis) -> Self {
        Self {
            origin: Instant::now(),
            origin_millis,
        }
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> EpochMillis {
        self.origin_millis + self.origin.elapsed().as_millis() as EpochMillis
    }
}
