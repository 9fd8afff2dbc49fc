//! Registered printers and their queues.

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::status::PrinterStatus;
use crate::types::DbId;
use crate::wire::{flag, null_as_default};

/// A printer as returned by `GET /getprinterinfo`.
///
/// `queue` is in print order; the head is the job currently printing (or the
/// next one to print). Temperatures only arrive through push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: DbId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hwid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PrinterStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "canPause", default, deserialize_with = "flag")]
    pub can_pause: bool,
    #[serde(default)]
    pub extruder_temp: Option<f64>,
    #[serde(default)]
    pub bed_temp: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue: Vec<Job>,
    #[serde(
        rename = "colorChangeBuffer",
        alias = "colorbuff",
        default,
        deserialize_with = "flag"
    )]
    pub color_change_ready: bool,
}

impl Printer {
    pub fn new(id: DbId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            device: String::new(),
            description: String::new(),
            hwid: String::new(),
            status: PrinterStatus::default(),
            error: None,
            can_pause: false,
            extruder_temp: None,
            bed_temp: None,
            queue: Vec::new(),
            color_change_ready: false,
        }
    }

    /// The job at the front of the queue.
    pub fn head(&self) -> Option<&Job> {
        self.queue.first()
    }

    pub fn is_head(&self, job_id: DbId) -> bool {
        self.head().is_some_and(|job| job.id == job_id)
    }

    pub fn job(&self, job_id: DbId) -> Option<&Job> {
        self.queue.iter().find(|job| job.id == job_id)
    }

    pub fn job_mut(&mut self, job_id: DbId) -> Option<&mut Job> {
        self.queue.iter_mut().find(|job| job.id == job_id)
    }

    /// Copy the mirror-owned time state of this printer's jobs onto the
    /// jobs of `queue` that keep their id.
    pub fn carry_time_into(&self, queue: &mut [Job]) {
        for job in queue {
            if let Some(previous) = self.job(job.id) {
                job.carry_time_from(previous);
            }
        }
    }

    /// Replace the queue, keeping the time state of every job whose id
    /// survives. Returns `false` when the queue was already identical.
    pub fn replace_queue(&mut self, mut queue: Vec<Job>) -> bool {
        self.carry_time_into(&mut queue);
        if self.queue == queue {
            return false;
        }
        self.queue = queue;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TimeUpdate;

    #[test]
    fn decode_server_printer_info() {
        let json = r#"{
            "device": "/dev/ttyACM0", "description": "Original Prusa i3",
            "hwid": "2C99:0002", "name": "Prusa 1", "status": "printing",
            "id": 3, "error": "", "canPause": 1, "colorChangeBuffer": 0,
            "queue": [
                {"id": 10, "name": "a", "status": "printing", "printerid": 3},
                {"id": 11, "name": "b", "status": "inqueue", "printerid": 3}
            ]
        }"#;
        let printer: Printer = serde_json::from_str(json).unwrap();
        assert_eq!(printer.id, 3);
        assert_eq!(printer.status, PrinterStatus::Printing);
        assert!(printer.can_pause);
        assert!(!printer.color_change_ready);
        assert_eq!(printer.queue.len(), 2);
        assert!(printer.is_head(10));
        assert!(!printer.is_head(11));
        assert_eq!(printer.extruder_temp, None);
    }

    #[test]
    fn null_queue_and_status_decode_to_defaults() {
        let json = r#"{"id": 1, "name": "x", "status": null, "queue": null}"#;
        let printer: Printer = serde_json::from_str(json).unwrap();
        assert_eq!(printer.status, PrinterStatus::Unknown);
        assert!(printer.queue.is_empty());
        assert!(printer.head().is_none());
    }

    #[test]
    fn replace_queue_carries_time_and_reports_change() {
        let mut printer = Printer::new(1, "p");
        let mut running = Job::new(10, "a");
        running.apply_time(TimeUpdate::TotalSeconds(60.0));
        printer.queue = vec![running, Job::new(11, "b")];

        assert!(printer.replace_queue(vec![Job::new(10, "a"), Job::new(12, "c")]));

        assert_eq!(printer.queue.len(), 2);
        assert!(printer.job(11).is_none());
        assert_eq!(
            printer.job(10).unwrap().static_time.unwrap().total_duration_seconds,
            60.0
        );
        assert!(printer.job(12).unwrap().static_time.is_none());

        // Same ids again: time state carried, nothing else differs.
        assert!(!printer.replace_queue(vec![Job::new(10, "a"), Job::new(12, "c")]));
    }
}
