//! Pulling authoritative state from the print server.
//!
//! The push stream can miss updates (page reloads, reconnects). The engine
//! repairs this by fetching the full printer snapshot and, for each
//! printer currently working on a job, that job's static timing.

use std::time::Duration;

use async_trait::async_trait;

use printdeck_core::job::TimeUpdate;
use printdeck_core::printer::Printer;
use printdeck_core::status::JobStatus;
use printdeck_core::time::{parse_timestamp, NaiveZone};
use printdeck_core::types::{DbId, EpochMillis};
use printdeck_link::api::{FarmApi, FarmApiError, TimeData};

use crate::store::Store;

/// Errors from a resync request.
#[derive(Debug, thiserror::Error)]
pub enum ResyncError {
    #[error(transparent)]
    Api(#[from] FarmApiError),

    #[error("Resync source unavailable: {0}")]
    Unavailable(String),

    #[error("Resync request timed out after {0:?}")]
    TimedOut(Duration),
}

/// Where authoritative state comes from.
#[async_trait]
pub trait ResyncSource: Send + Sync {
    /// Every registered printer together with its queue.
    async fn fetch_printers(&self) -> Result<Vec<Printer>, ResyncError>;

    /// Static timing of the job at the head of `printer_id`'s queue.
    async fn fetch_static_time(&self, printer_id: DbId, job_id: DbId) -> Result<TimeData, ResyncError>;
}

#[async_trait]
impl ResyncSource for FarmApi {
    async fn fetch_printers(&self) -> Result<Vec<Printer>, ResyncError> {
        Ok(self.get_printer_info().await?)
    }

    async fn fetch_static_time(&self, printer_id: DbId, job_id: DbId) -> Result<TimeData, ResyncError> {
        Ok(self.refetch_time(printer_id, job_id).await?)
    }
}

/// A job whose static timing should be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResyncTarget {
    pub printer_id: DbId,
    pub job_id: DbId,
}

/// Head jobs of active printers that have left the queue state.
pub fn resync_targets(store: &Store) -> Vec<ResyncTarget> {
    store
        .printers()
        .iter()
        .filter_map(target_of)
        .collect()
}

/// The resync target for `job_id`, if it currently qualifies.
pub fn target_for_job(store: &Store, job_id: DbId) -> Option<ResyncTarget> {
    store
        .printer_of_job(job_id)
        .and_then(target_of)
        .filter(|target| target.job_id == job_id)
}

fn target_of(printer: &Printer) -> Option<ResyncTarget> {
    if !printer.status.is_active() {
        return None;
    }
    let head = printer.head()?;
    if head.status == JobStatus::InQueue {
        return None;
    }
    Some(ResyncTarget {
        printer_id: printer.id,
        job_id: head.id,
    })
}

/// Convert a timing response into updates.
///
/// The total is always applied. Timestamps are only meaningful once the
/// server has marked the job as started, so they are skipped otherwise.
pub fn time_updates(data: &TimeData, started: bool, zone: NaiveZone) -> Vec<TimeUpdate> {
    let mut updates = vec![TimeUpdate::TotalSeconds(data.total)];
    if started {
        updates.push(TimeUpdate::Eta(instant(data.eta.as_deref(), zone)));
        updates.push(TimeUpdate::StartedAt(instant(data.timestart.as_deref(), zone)));
        updates.push(TimeUpdate::PausedAt(instant(data.pause.as_deref(), zone)));
    }
    updates
}

fn instant(raw: Option<&str>, zone: NaiveZone) -> Option<EpochMillis> {
    let raw = raw?;
    match parse_timestamp(raw, zone) {
        Ok(instant) => instant,
        Err(e) => {
            tracing::debug!(error = %e, "Treating unparseable timestamp as unset");
            None
        }
    }
}
