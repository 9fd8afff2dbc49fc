//! Print jobs and their two time substructures.

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;
use crate::types::{DbId, EpochMillis};
use crate::wire::{flag, null_as_default};

/// A queued, running or finished print job as mirrored from the server.
///
/// Wire names follow the server's `job_info` objects; the two time fields are
/// never sent by the server and are owned by the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    #[serde(rename = "printerid", default)]
    pub printer_id: Option<DbId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub file_name_original: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub max_layer_height: Option<f64>,
    #[serde(default)]
    pub current_layer_height: Option<f64>,
    #[serde(rename = "errorid", default)]
    pub error_id: Option<DbId>,
    #[serde(default, deserialize_with = "flag")]
    pub file_pause: bool,
    #[serde(default, deserialize_with = "flag")]
    pub extruded: bool,
    #[serde(default, deserialize_with = "flag")]
    pub released: bool,
    #[serde(default, deserialize_with = "flag")]
    pub time_started: bool,
    #[serde(default, deserialize_with = "flag")]
    pub favorite: bool,
    #[serde(rename = "gcode_num", default)]
    pub gcode_index: Option<i64>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub filament: Option<String>,
    #[serde(default)]
    pub printer_name: Option<String>,

    #[serde(default, skip_deserializing)]
    pub static_time: Option<StaticTimeFacts>,
    #[serde(default, skip_deserializing)]
    pub derived_time: Option<DerivedTimeMetrics>,
}

impl Job {
    /// Bare job with the given id, everything else unset.
    pub fn new(id: DbId, name: impl Into<String>) -> Self {
        Self {
            id,
            printer_id: None,
            name: name.into(),
            file_name_original: None,
            status: JobStatus::default(),
            progress: None,
            max_layer_height: None,
            current_layer_height: None,
            error_id: None,
            file_pause: false,
            extruded: false,
            released: false,
            time_started: false,
            favorite: false,
            gcode_index: None,
            comments: None,
            filament: None,
            printer_name: None,
            static_time: None,
            derived_time: None,
        }
    }

    /// Apply one server time update, creating the static facts on first use.
    /// Returns `true` when anything changed.
    pub fn apply_time(&mut self, update: TimeUpdate) -> bool {
        match self.static_time.as_mut() {
            Some(facts) => facts.apply(update),
            None => {
                let mut facts = StaticTimeFacts::default();
                facts.apply(update);
                self.static_time = Some(facts);
                true
            }
        }
    }

    /// Keep the mirror-owned time state of `previous` when the server sends
    /// a fresh copy of the same job.
    pub fn carry_time_from(&mut self, previous: &Job) {
        if self.id != previous.id {
            return;
        }
        if self.static_time.is_none() {
            self.static_time = previous.static_time;
        }
        if self.derived_time.is_none() {
            self.derived_time = previous.derived_time;
        }
    }
}

/// Server-authoritative timing, refreshed by resync or `set_time` pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticTimeFacts {
    pub total_duration_seconds: f64,
    pub eta: Option<EpochMillis>,
    pub started_at: Option<EpochMillis>,
    pub paused_at: Option<EpochMillis>,
}

impl StaticTimeFacts {
    pub fn apply(&mut self, update: TimeUpdate) -> bool {
        match update {
            TimeUpdate::TotalSeconds(seconds) => replace(&mut self.total_duration_seconds, seconds),
            TimeUpdate::Eta(at) => replace(&mut self.eta, at),
            TimeUpdate::StartedAt(at) => replace(&mut self.started_at, at),
            TimeUpdate::PausedAt(at) => replace(&mut self.paused_at, at),
        }
    }
}

/// Locally projected timing, recomputed on every projector tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedTimeMetrics {
    pub total_time_ms: i64,
    pub eta_ms: Option<i64>,
    pub elapsed_time_ms: i64,
    pub extra_time_ms: i64,
    /// `None` while the remaining time is unknown.
    pub remaining_time_ms: Option<i64>,
}

impl DerivedTimeMetrics {
    /// State of a freshly started projector.
    pub fn initial() -> Self {
        Self {
            total_time_ms: 0,
            eta_ms: None,
            elapsed_time_ms: 0,
            extra_time_ms: 0,
            remaining_time_ms: None,
        }
    }
}

impl Default for DerivedTimeMetrics {
    fn default() -> Self {
        Self::initial()
    }
}

/// Slot addressed by the `index` of a `set_time` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Total,
    Eta,
    StartedAt,
    PausedAt,
}

impl TimeField {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Total),
            1 => Some(Self::Eta),
            2 => Some(Self::StartedAt),
            3 => Some(Self::PausedAt),
            _ => None,
        }
    }
}

/// One normalised update to [`StaticTimeFacts`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeUpdate {
    TotalSeconds(f64),
    Eta(Option<EpochMillis>),
    StartedAt(Option<EpochMillis>),
    PausedAt(Option<EpochMillis>),
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_server_job_info() {
        let json = r#"{
            "id": 17, "name": "benchy", "status": "printing", "printerid": 3,
            "errorid": null, "file_name_original": "benchy.gcode",
            "progress": 42.5, "favorite": 0, "released": 1, "file_pause": 0,
            "comments": null, "extruded": 1, "td_id": 99, "time_started": 1,
            "printer_name": "Prusa 1", "max_layer_height": 12.0,
            "current_layer_height": 3.2, "filament": "PLA",
            "date": "Wed, 01 May 2024 12:00:00 GMT"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, 17);
        assert_eq!(job.printer_id, Some(3));
        assert_eq!(job.status, JobStatus::Printing);
        assert!(job.released);
        assert!(job.extruded);
        assert!(job.time_started);
        assert!(!job.file_pause);
        assert_eq!(job.progress, Some(42.5));
        assert!(job.static_time.is_none());
        assert!(job.derived_time.is_none());
    }

    #[test]
    fn mirror_time_fields_are_not_read_from_server() {
        let json = r#"{"id": 1, "static_time": {"total_duration_seconds": 5.0,
            "eta": null, "started_at": null, "paused_at": null}}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert!(job.static_time.is_none());
    }

    #[test]
    fn first_time_update_creates_facts() {
        let mut job = Job::new(1, "cube");
        assert!(job.apply_time(TimeUpdate::TotalSeconds(600.0)));
        assert_eq!(job.static_time.unwrap().total_duration_seconds, 600.0);
        assert!(job.derived_time.is_none());
    }

    #[test]
    fn repeated_time_update_reports_no_change() {
        let mut job = Job::new(1, "cube");
        assert!(job.apply_time(TimeUpdate::StartedAt(Some(1_000))));
        assert!(!job.apply_time(TimeUpdate::StartedAt(Some(1_000))));
        assert!(job.apply_time(TimeUpdate::StartedAt(None)));
    }

    #[test]
    fn carry_time_keeps_previous_state_for_same_id() {
        let mut old = Job::new(5, "a");
        old.apply_time(TimeUpdate::TotalSeconds(10.0));
        old.derived_time = Some(DerivedTimeMetrics::initial());

        let mut fresh = Job::new(5, "a");
        fresh.carry_time_from(&old);
        assert_eq!(fresh.static_time, old.static_time);
        assert_eq!(fresh.derived_time, old.derived_time);

        let mut other = Job::new(6, "b");
        other.carry_time_from(&old);
        assert!(other.static_time.is_none());
    }

    #[test]
    fn time_field_indices() {
        assert_eq!(TimeField::from_index(0), Some(TimeField::Total));
        assert_eq!(TimeField::from_index(3), Some(TimeField::PausedAt));
        assert_eq!(TimeField::from_index(4), None);
        assert_eq!(TimeField::from_index(-1), None);
    }
}
