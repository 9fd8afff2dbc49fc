//! Routing of typed push events to store mutations.

use serde_json::Value;

use printdeck_core::error::CoreError;
use printdeck_core::job::{TimeField, TimeUpdate};
use printdeck_core::time::{parse_timestamp, NaiveZone};
use printdeck_core::types::{DbId, EpochMillis};
use printdeck_link::messages::{PushEvent, SetTimeData, Target};

use crate::patch::{JobPatch, PrinterPatch};
use crate::store::Store;

/// What a dispatched event did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The store changed (and published an event).
    pub changed: bool,
    /// Printer status or queue changed: ticker membership must be
    /// re-evaluated.
    pub schedule_changed: bool,
    /// Static timing of this job changed.
    pub timing_changed: Option<DbId>,
}

/// Applies push events to the [`Store`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    zone: NaiveZone,
}

impl Dispatcher {
    pub fn new(zone: NaiveZone) -> Self {
        Self { zone }
    }

    /// Apply one event. Unknown targets and invalid payloads are logged
    /// and leave the store untouched.
    pub fn dispatch(&self, store: &mut Store, event: PushEvent) -> DispatchOutcome {
        let name = event.name();
        let target = event.target();
        if !target_known(store, target) {
            tracing::debug!(event = name, ?target, "Push event for unknown target ignored");
            return DispatchOutcome::default();
        }

        let result = match event {
            PushEvent::StatusUpdate(d) => printer(store, d.printer_id, PrinterPatch::Status(d.status)),
            PushEvent::TempUpdate(d) => printer(
                store,
                d.printer_id,
                PrinterPatch::Temperatures {
                    extruder: d.extruder_temp,
                    bed: d.bed_temp,
                },
            ),
            PushEvent::QueueUpdate(d) => printer(store, d.printer_id, PrinterPatch::Queue(d.queue)),
            PushEvent::ErrorUpdate(d) => printer(store, d.printer_id, PrinterPatch::Error(d.error)),
            PushEvent::CanPause(d) => printer(store, d.printer_id, PrinterPatch::CanPause(d.can_pause)),
            PushEvent::PortRepair(d) => printer(store, d.printer_id, PrinterPatch::Device(d.device)),
            PushEvent::ColorBuff(d) => {
                printer(store, d.printer_id, PrinterPatch::ColorChangeReady(d.colorbuff))
            }
            PushEvent::FilePauseUpdate(d) => job(store, d.job_id, JobPatch::FilePause(d.file_pause)),
            PushEvent::SetTimeStarted(d) => job(store, d.job_id, JobPatch::TimeStarted(d.started)),
            PushEvent::ProgressUpdate(d) => job(store, d.job_id, JobPatch::Progress(d.progress)),
            PushEvent::ReleaseJob(d) => job(store, d.job_id, JobPatch::Released(d.released)),
            PushEvent::JobStatusUpdate(d) => job(store, d.job_id, JobPatch::Status(d.status)),
            PushEvent::GcodeViewer(d) => job(store, d.job_id, JobPatch::GcodeIndex(d.gcode_num)),
            PushEvent::ExtrudedUpdate(d) => job(store, d.job_id, JobPatch::Extruded(d.extruded)),
            PushEvent::MaxLayerHeight(d) => {
                job(store, d.job_id, JobPatch::MaxLayerHeight(d.max_layer_height))
            }
            PushEvent::CurrentLayerHeight(d) => {
                job(store, d.job_id, JobPatch::CurrentLayerHeight(d.current_layer_height))
            }
            PushEvent::SetTime(d) => self.set_time(store, &d),
        };

        match result {
            Ok(outcome) => outcome,
            Err(CoreError::NotFound { entity, id }) => {
                tracing::debug!(event = name, entity, id, "Push event for unknown target ignored");
                DispatchOutcome::default()
            }
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Rejected push event");
                DispatchOutcome::default()
            }
        }
    }

    fn set_time(&self, store: &mut Store, data: &SetTimeData) -> Result<DispatchOutcome, CoreError> {
        let update = normalize_time(data.index, &data.new_time, self.zone)?;
        let changed = store.patch_job(data.job_id, JobPatch::Time(update))?;
        Ok(DispatchOutcome {
            changed,
            schedule_changed: false,
            timing_changed: changed.then_some(data.job_id),
        })
    }
}

fn target_known(store: &Store, target: Target) -> bool {
    match target {
        Target::Printer(id) => store.find_printer(id).is_some(),
        Target::Job(id) => store.find_job(id).is_some(),
    }
}

fn printer(store: &mut Store, printer_id: DbId, patch: PrinterPatch) -> Result<DispatchOutcome, CoreError> {
    let affects_schedule = patch.affects_schedule();
    let changed = store.patch_printer(printer_id, patch)?;
    Ok(DispatchOutcome {
        changed,
        schedule_changed: changed && affects_schedule,
        timing_changed: None,
    })
}

fn job(store: &mut Store, job_id: DbId, patch: JobPatch) -> Result<DispatchOutcome, CoreError> {
    let changed = store.patch_job(job_id, patch)?;
    Ok(DispatchOutcome {
        changed,
        ..Default::default()
    })
}

/// Turn a raw `set_time` value into a typed update.
///
/// Slot 0 is a duration in seconds. Slots 1-3 are instants: formatted
/// timestamps are parsed in `zone` (unparseable strings count as unset),
/// and numbers are taken as epoch milliseconds.
pub fn normalize_time(index: i64, raw: &Value, zone: NaiveZone) -> Result<TimeUpdate, CoreError> {
    let field = TimeField::from_index(index)
        .ok_or_else(|| CoreError::Validation(format!("set_time index {index} out of range 0-3")))?;

    match field {
        TimeField::Total => total_seconds(raw).map(TimeUpdate::TotalSeconds),
        TimeField::Eta => instant_from(raw, zone).map(TimeUpdate::Eta),
        TimeField::StartedAt => instant_from(raw, zone).map(TimeUpdate::StartedAt),
        TimeField::PausedAt => instant_from(raw, zone).map(TimeUpdate::PausedAt),
    }
}

fn total_seconds(raw: &Value) -> Result<f64, CoreError> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| CoreError::Validation(format!("set_time total is not a number: {raw}")))
}

fn instant_from(raw: &Value, zone: NaiveZone) -> Result<Option<EpochMillis>, CoreError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))),
        Value::String(s) => Ok(parse_timestamp(s, zone).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Treating unparseable timestamp as unset");
            None
        })),
        other => Err(CoreError::Validation(format!(
            "set_time value is neither a timestamp nor a number: {other}"
        ))),
    }
}
