//! Typed print-server push events.
//!
//! The server emits Socket.IO events with a name and one JSON object. This
//! module deserializes the pair into a strongly-typed [`PushEvent`]. Field
//! names follow the server, which is inconsistent about `printerid` versus
//! `printer_id`; both spellings are accepted everywhere.

use serde::Deserialize;
use serde_json::Value;

use printdeck_core::job::Job;
use printdeck_core::status::{JobStatus, PrinterStatus};
use printdeck_core::types::DbId;
use printdeck_core::wire::{flag, null_as_default};

/// All consumed push events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    // ---- printer-targeted ----
    StatusUpdate(StatusData),
    TempUpdate(TempData),
    QueueUpdate(QueueData),
    ErrorUpdate(ErrorData),
    CanPause(CanPauseData),
    PortRepair(PortRepairData),
    ColorBuff(ColorBuffData),

    // ---- job-targeted ----
    FilePauseUpdate(FilePauseData),
    SetTimeStarted(TimeStartedData),
    ProgressUpdate(ProgressData),
    ReleaseJob(ReleaseData),
    JobStatusUpdate(JobStatusData),
    GcodeViewer(GcodeViewerData),
    ExtrudedUpdate(ExtrudedData),
    MaxLayerHeight(MaxLayerHeightData),
    CurrentLayerHeight(CurrentLayerHeightData),
    SetTime(SetTimeData),
}

/// Entity a push event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Printer(DbId),
    Job(DbId),
}

impl PushEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusUpdate(_) => "status_update",
            Self::TempUpdate(_) => "temp_update",
            Self::QueueUpdate(_) => "queue_update",
            Self::ErrorUpdate(_) => "error_update",
            Self::CanPause(_) => "can_pause",
            Self::PortRepair(_) => "port_repair",
            Self::ColorBuff(_) => "color_buff",
            Self::FilePauseUpdate(_) => "file_pause_update",
            Self::SetTimeStarted(_) => "set_time_started",
            Self::ProgressUpdate(_) => "progress_update",
            Self::ReleaseJob(_) => "release_job",
            Self::JobStatusUpdate(_) => "job_status_update",
            Self::GcodeViewer(_) => "gcode_viewer",
            Self::ExtrudedUpdate(_) => "extruded_update",
            Self::MaxLayerHeight(_) => "max_layer_height",
            Self::CurrentLayerHeight(_) => "current_layer_height",
            Self::SetTime(_) => "set_time",
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Self::StatusUpdate(d) => Target::Printer(d.printer_id),
            Self::TempUpdate(d) => Target::Printer(d.printer_id),
            Self::QueueUpdate(d) => Target::Printer(d.printer_id),
            Self::ErrorUpdate(d) => Target::Printer(d.printer_id),
            Self::CanPause(d) => Target::Printer(d.printer_id),
            Self::PortRepair(d) => Target::Printer(d.printer_id),
            Self::ColorBuff(d) => Target::Printer(d.printer_id),
            Self::FilePauseUpdate(d) => Target::Job(d.job_id),
            Self::SetTimeStarted(d) => Target::Job(d.job_id),
            Self::ProgressUpdate(d) => Target::Job(d.job_id),
            Self::ReleaseJob(d) => Target::Job(d.job_id),
            Self::JobStatusUpdate(d) => Target::Job(d.job_id),
            Self::GcodeViewer(d) => Target::Job(d.job_id),
            Self::ExtrudedUpdate(d) => Target::Job(d.job_id),
            Self::MaxLayerHeight(d) => Target::Job(d.job_id),
            Self::CurrentLayerHeight(d) => Target::Job(d.job_id),
            Self::SetTime(d) => Target::Job(d.job_id),
        }
    }
}

/// Payload for `status_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusData {
    #[serde(alias = "printerid")]
    pub printer_id: DbId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PrinterStatus,
}

/// Payload for `temp_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TempData {
    #[serde(rename = "printerid", alias = "printer_id")]
    pub printer_id: DbId,
    #[serde(default)]
    pub extruder_temp: Option<f64>,
    #[serde(default)]
    pub bed_temp: Option<f64>,
}

/// Payload for `queue_update`: the printer's full queue in print order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueData {
    #[serde(rename = "printerid", alias = "printer_id")]
    pub printer_id: DbId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue: Vec<Job>,
}

/// Payload for `error_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorData {
    #[serde(rename = "printerid", alias = "printer_id")]
    pub printer_id: DbId,
    #[serde(default)]
    pub error: Option<String>,
}

/// Payload for `can_pause`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CanPauseData {
    #[serde(rename = "printerid", alias = "printer_id")]
    pub printer_id: DbId,
    #[serde(rename = "canPause", default, deserialize_with = "flag")]
    pub can_pause: bool,
}

/// Payload for `port_repair`: the printer was found on a new serial port.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortRepairData {
    #[serde(alias = "printerid")]
    pub printer_id: DbId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device: String,
}

/// Payload for `color_buff`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColorBuffData {
    #[serde(rename = "printerid", alias = "printer_id")]
    pub printer_id: DbId,
    #[serde(default, deserialize_with = "flag")]
    pub colorbuff: bool,
}

/// Payload for `file_pause_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilePauseData {
    pub job_id: DbId,
    #[serde(default, deserialize_with = "flag")]
    pub file_pause: bool,
}

/// Payload for `set_time_started`.
///
/// The server sends `started`; older builds sent `time_started`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeStartedData {
    pub job_id: DbId,
    #[serde(alias = "time_started", default, deserialize_with = "flag")]
    pub started: bool,
}

/// Payload for `progress_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressData {
    pub job_id: DbId,
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Payload for `release_job`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReleaseData {
    pub job_id: DbId,
    #[serde(default, deserialize_with = "flag")]
    pub released: bool,
}

/// Payload for `job_status_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusData {
    pub job_id: DbId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
}

/// Payload for `gcode_viewer`: index of the G-code line being executed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GcodeViewerData {
    pub job_id: DbId,
    #[serde(default)]
    pub gcode_num: Option<i64>,
}

/// Payload for `extruded_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtrudedData {
    pub job_id: DbId,
    #[serde(default, deserialize_with = "flag")]
    pub extruded: bool,
}

/// Payload for `max_layer_height`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaxLayerHeightData {
    pub job_id: DbId,
    #[serde(default)]
    pub max_layer_height: Option<f64>,
}

/// Payload for `current_layer_height`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentLayerHeightData {
    pub job_id: DbId,
    #[serde(default)]
    pub current_layer_height: Option<f64>,
}

/// Payload for `set_time`.
///
/// `index` selects the slot (0 total seconds, 1 ETA, 2 start, 3 pause).
/// `new_time` is a number for slot 0 and a formatted timestamp otherwise;
/// it is kept raw and normalised by the dispatcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetTimeData {
    pub job_id: DbId,
    pub index: i64,
    #[serde(default)]
    pub new_time: Value,
}

/// Build a typed event from a Socket.IO event name and its payload.
///
/// Returns `Err` for unknown names or payloads that do not match the
/// event's schema. Callers should log and continue.
pub fn parse_event(name: &str, data: Value) -> Result<PushEvent, serde_json::Error> {
    serde_json::from_value(serde_json::json!({ "type": name, "data": data }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_status_update() {
        let msg = parse_event("status_update", json!({"printer_id": 4, "status": "printing"}))
            .unwrap();
        match msg {
            PushEvent::StatusUpdate(data) => {
                assert_eq!(data.printer_id, 4);
                assert_eq!(data.status, PrinterStatus::Printing);
            }
            other => panic!("Expected StatusUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_status_update_unknown_status() {
        let msg = parse_event("status_update", json!({"printer_id": 4, "status": "warming"}))
            .unwrap();
        match msg {
            PushEvent::StatusUpdate(data) => assert_eq!(data.status, PrinterStatus::Unknown),
            other => panic!("Expected StatusUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_temp_update() {
        let msg = parse_event(
            "temp_update",
            json!({"printerid": 2, "extruder_temp": 215.3, "bed_temp": 60.0}),
        )
        .unwrap();
        match msg {
            PushEvent::TempUpdate(data) => {
                assert_eq!(data.printer_id, 2);
                assert_eq!(data.extruder_temp, Some(215.3));
                assert_eq!(data.bed_temp, Some(60.0));
            }
            other => panic!("Expected TempUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_queue_update_with_jobs() {
        let msg = parse_event(
            "queue_update",
            json!({"printerid": 1, "queue": [
                {"id": 10, "name": "a", "status": "printing", "printerid": 1},
                {"id": 11, "name": "b", "status": "inqueue", "printerid": 1}
            ]}),
        )
        .unwrap();
        match msg {
            PushEvent::QueueUpdate(data) => {
                assert_eq!(data.queue.len(), 2);
                assert_eq!(data.queue[0].id, 10);
                assert_eq!(data.queue[1].status, JobStatus::InQueue);
            }
            other => panic!("Expected QueueUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_can_pause_integer_flag() {
        let msg = parse_event("can_pause", json!({"printerid": 1, "canPause": 1})).unwrap();
        assert_eq!(
            msg,
            PushEvent::CanPause(CanPauseData { printer_id: 1, can_pause: true })
        );
    }

    #[test]
    fn parse_set_time_started_both_spellings() {
        let current = parse_event("set_time_started", json!({"job_id": 9, "started": 1})).unwrap();
        let legacy =
            parse_event("set_time_started", json!({"job_id": 9, "time_started": true})).unwrap();
        let expected = PushEvent::SetTimeStarted(TimeStartedData { job_id: 9, started: true });
        assert_eq!(current, expected);
        assert_eq!(legacy, expected);
    }

    #[test]
    fn parse_set_time_keeps_raw_value() {
        let msg = parse_event(
            "set_time",
            json!({"job_id": 5, "index": 2, "new_time": "2024-05-01T12:00:00"}),
        )
        .unwrap();
        match msg {
            PushEvent::SetTime(data) => {
                assert_eq!(data.index, 2);
                assert_eq!(data.new_time, json!("2024-05-01T12:00:00"));
            }
            other => panic!("Expected SetTime, got {other:?}"),
        }
    }

    #[test]
    fn parse_gcode_viewer() {
        let msg = parse_event("gcode_viewer", json!({"job_id": 3, "gcode_num": 1200})).unwrap();
        assert_eq!(msg.target(), Target::Job(3));
        assert_eq!(msg.name(), "gcode_viewer");
    }

    #[test]
    fn color_buff_targets_printer() {
        let msg = parse_event("color_buff", json!({"printerid": 8, "colorbuff": 1})).unwrap();
        assert_eq!(msg.target(), Target::Printer(8));
    }

    #[test]
    fn unknown_event_is_error() {
        assert!(parse_event("printer_exploded", json!({"printer_id": 1})).is_err());
    }

    #[test]
    fn missing_target_is_error() {
        assert!(parse_event("progress_update", json!({"progress": 10.0})).is_err());
    }
}
