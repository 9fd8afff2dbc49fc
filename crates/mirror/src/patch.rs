//! Single-field updates applied to mirrored entities.
//!
//! Each patch reports whether it changed anything, so replaying an
//! identical update is a silent no-op.

use printdeck_core::job::{Job, TimeUpdate};
use printdeck_core::printer::Printer;
use printdeck_core::status::{JobStatus, PrinterStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum PrinterPatch {
    Status(PrinterStatus),
    Temperatures {
        extruder: Option<f64>,
        bed: Option<f64>,
    },
    /// Full queue in print order. Time state of surviving jobs is kept.
    Queue(Vec<Job>),
    Error(Option<String>),
    CanPause(bool),
    Device(String),
    ColorChangeReady(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobPatch {
    Status(JobStatus),
    FilePause(bool),
    TimeStarted(bool),
    Progress(Option<f64>),
    Released(bool),
    GcodeIndex(Option<i64>),
    Extruded(bool),
    MaxLayerHeight(Option<f64>),
    CurrentLayerHeight(Option<f64>),
    Time(TimeUpdate),
}

impl PrinterPatch {
    /// Whether the patch can change which job should be ticking.
    pub fn affects_schedule(&self) -> bool {
        matches!(self, Self::Status(_) | Self::Queue(_))
    }

    pub fn apply(self, printer: &mut Printer) -> bool {
        match self {
            Self::Status(status) => set(&mut printer.status, status),
            Self::Temperatures { extruder, bed } => {
                let extruder_changed = set(&mut printer.extruder_temp, extruder);
                set(&mut printer.bed_temp, bed) | extruder_changed
            }
            Self::Queue(queue) => printer.replace_queue(queue),
            Self::Error(error) => set(&mut printer.error, error),
            Self::CanPause(can_pause) => set(&mut printer.can_pause, can_pause),
            Self::Device(device) => set(&mut printer.device, device),
            Self::ColorChangeReady(ready) => set(&mut printer.color_change_ready, ready),
        }
    }
}

impl JobPatch {
    pub fn apply(self, job: &mut Job) -> bool {
        match self {
            Self::Status(status) => set(&mut job.status, status),
            Self::FilePause(paused) => set(&mut job.file_pause, paused),
            Self::TimeStarted(started) => set(&mut job.time_started, started),
            Self::Progress(progress) => set(&mut job.progress, progress),
            Self::Released(released) => set(&mut job.released, released),
            Self::GcodeIndex(index) => set(&mut job.gcode_index, index),
            Self::Extruded(extruded) => set(&mut job.extruded, extruded),
            Self::MaxLayerHeight(height) => set(&mut job.max_layer_height, height),
            Self::CurrentLayerHeight(height) => set(&mut job.current_layer_height, height),
            Self::Time(update) => job.apply_time(update),
        }
    }
}

fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use printdeck_core::job::DerivedTimeMetrics;

    use super::*;

    #[test]
    fn repeated_status_is_noop() {
        let mut printer = Printer::new(1, "p");
        assert!(PrinterPatch::Status(PrinterStatus::Printing).apply(&mut printer));
        assert!(!PrinterPatch::Status(PrinterStatus::Printing).apply(&mut printer));
    }

    #[test]
    fn temperatures_change_if_either_differs() {
        let mut printer = Printer::new(1, "p");
        let patch = PrinterPatch::Temperatures { extruder: Some(200.0), bed: None };
        assert!(patch.clone().apply(&mut printer));
        assert!(!patch.apply(&mut printer));
        assert!(PrinterPatch::Temperatures { extruder: Some(200.0), bed: Some(60.0) }
            .apply(&mut printer));
    }

    #[test]
    fn replayed_queue_keeps_time_state_and_reports_no_change() {
        let mut printer = Printer::new(1, "p");
        let queue = vec![Job::new(10, "a"), Job::new(11, "b")];
        assert!(PrinterPatch::Queue(queue.clone()).apply(&mut printer));

        let head = printer.job_mut(10).unwrap();
        head.apply_time(TimeUpdate::TotalSeconds(120.0));
        head.derived_time = Some(DerivedTimeMetrics::initial());

        assert!(!PrinterPatch::Queue(queue).apply(&mut printer));
        assert!(printer.job(10).unwrap().static_time.is_some());
        assert!(printer.job(10).unwrap().derived_time.is_some());
    }

    #[test]
    fn job_time_patch_creates_facts_once() {
        let mut job = Job::new(1, "j");
        assert!(JobPatch::Time(TimeUpdate::TotalSeconds(5.0)).apply(&mut job));
        assert!(!JobPatch::Time(TimeUpdate::TotalSeconds(5.0)).apply(&mut job));
    }

    #[test]
    fn schedule_relevance() {
        assert!(PrinterPatch::Status(PrinterStatus::Idle).affects_schedule());
        assert!(PrinterPatch::Queue(vec![]).affects_schedule());
        assert!(!PrinterPatch::CanPause(true).affects_schedule());
    }
}
