//! The mirrored printer/job state.
//!
//! [`Store`] is owned by the engine task, which is its only writer, so it
//! needs no internal locking. Every effective mutation publishes exactly
//! one [`MirrorEvent`] on the shared bus, immediately.

use std::sync::Arc;

use tokio::sync::broadcast;

use printdeck_core::error::CoreError;
use printdeck_core::job::{DerivedTimeMetrics, Job};
use printdeck_core::printer::Printer;
use printdeck_core::types::DbId;
use printdeck_events::bus::{EventBus, MirrorEvent};

use crate::patch::{JobPatch, PrinterPatch};

pub struct Store {
    printers: Vec<Printer>,
    bus: Arc<EventBus>,
}

impl Store {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            printers: Vec::new(),
            bus,
        }
    }

    /// All printers in server order.
    pub fn printers(&self) -> &[Printer] {
        &self.printers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.bus.subscribe()
    }

    pub fn find_printer(&self, printer_id: DbId) -> Option<&Printer> {
        self.printers.iter().find(|p| p.id == printer_id)
    }

    /// Find a job in any printer's queue.
    pub fn find_job(&self, job_id: DbId) -> Option<&Job> {
        self.printers.iter().find_map(|p| p.job(job_id))
    }

    /// The printer whose queue holds `job_id`.
    pub fn printer_of_job(&self, job_id: DbId) -> Option<&Printer> {
        self.printers.iter().find(|p| p.job(job_id).is_some())
    }

    /// Replace the whole printer list with a server snapshot.
    ///
    /// Jobs that keep their id keep their time state. Returns `false` when
    /// the snapshot matches what is already mirrored.
    pub fn load_snapshot(&mut self, mut printers: Vec<Printer>) -> bool {
        for printer in &mut printers {
            for job in &mut printer.queue {
                if let Some(previous) = self.find_job(job.id) {
                    job.carry_time_from(previous);
                }
            }
        }

        if self.printers == printers {
            return false;
        }

        let printer_count = printers.len();
        self.printers = printers;
        self.bus.publish(MirrorEvent::SnapshotLoaded { printer_count });
        true
    }

    /// Insert a printer or replace the one with the same id.
    pub fn upsert_printer(&mut self, mut printer: Printer) -> bool {
        let printer_id = printer.id;
        match self.printers.iter_mut().find(|p| p.id == printer.id) {
            Some(existing) => {
                existing.carry_time_into(&mut printer.queue);
                if *existing == printer {
                    return false;
                }
                *existing = printer;
            }
            None => self.printers.push(printer),
        }
        self.bus.publish(MirrorEvent::PrinterUpdated { printer_id });
        true
    }

    /// Apply one printer-level update. `Ok(false)` means nothing changed.
    pub fn patch_printer(&mut self, printer_id: DbId, patch: PrinterPatch) -> Result<bool, CoreError> {
        let printer = self
            .printers
            .iter_mut()
            .find(|p| p.id == printer_id)
            .ok_or(CoreError::NotFound {
                entity: "printer",
                id: printer_id,
            })?;

        let changed = patch.apply(printer);
        if changed {
            self.bus.publish(MirrorEvent::PrinterUpdated { printer_id });
        }
        Ok(changed)
    }

    /// Apply one job-level update. `Ok(false)` means nothing changed.
    pub fn patch_job(&mut self, job_id: DbId, patch: JobPatch) -> Result<bool, CoreError> {
        let job = self.find_job_mut(job_id)?;

        let changed = patch.apply(job);
        if changed {
            self.bus.publish(MirrorEvent::JobUpdated { job_id });
        }
        Ok(changed)
    }

    /// Store freshly projected metrics for a job.
    pub fn set_derived(&mut self, job_id: DbId, metrics: DerivedTimeMetrics) -> Result<bool, CoreError> {
        let job = self.find_job_mut(job_id)?;

        if job.derived_time == Some(metrics) {
            return Ok(false);
        }
        job.derived_time = Some(metrics);
        self.bus
            .publish(MirrorEvent::TimeMetricsUpdated { job_id, metrics });
        Ok(true)
    }

    /// Deregister a printer together with its queue.
    pub fn remove_printer(&mut self, printer_id: DbId) -> Option<Printer> {
        let index = self.printers.iter().position(|p| p.id == printer_id)?;
        let removed = self.printers.remove(index);
        self.bus.publish(MirrorEvent::PrinterRemoved { printer_id });
        Some(removed)
    }

    pub fn remove_job(&mut self, job_id: DbId) -> Option<Job> {
        let printer = self.printers.iter_mut().find(|p| p.job(job_id).is_some())?;
        let index = printer.queue.iter().position(|j| j.id == job_id)?;
        let removed = printer.queue.remove(index);
        self.bus.publish(MirrorEvent::JobRemoved { job_id });
        Some(removed)
    }

    // ---- private helpers ----

    fn find_job_mut(&mut self, job_id: DbId) -> Result<&mut Job, CoreError> {
        self.printers
            .iter_mut()
            .find_map(|p| p.job_mut(job_id))
            .ok_or(CoreError::NotFound {
                entity: "job",
                id: job_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use printdeck_core::job::TimeUpdate;
    use printdeck_core::status::PrinterStatus;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    fn store_with_printer() -> (Store, broadcast::Receiver<MirrorEvent>) {
        let mut store = Store::new(Arc::new(EventBus::default()));
        let rx = store.subscribe();
        let mut printer = Printer::new(1, "Prusa");
        printer.queue = vec![Job::new(10, "a"), Job::new(11, "b")];
        store.upsert_printer(printer);
        (store, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<MirrorEvent>) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(e) => panic!("unexpected receive error {e:?}"),
            }
        }
    }

    #[test]
    fn find_job_flattens_queues() {
        let (store, _rx) = store_with_printer();
        assert_eq!(store.find_job(11).unwrap().name, "b");
        assert_eq!(store.printer_of_job(11).unwrap().id, 1);
        assert!(store.find_job(99).is_none());
    }

    #[test]
    fn patch_publishes_once_per_effective_change() {
        let (mut store, mut rx) = store_with_printer();
        drain(&mut rx);

        let status = || PrinterPatch::Status(PrinterStatus::Printing);
        assert!(store.patch_printer(1, status()).unwrap());
        assert!(!store.patch_printer(1, status()).unwrap());

        assert_eq!(drain(&mut rx), vec![MirrorEvent::PrinterUpdated { printer_id: 1 }]);
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let (mut store, mut rx) = store_with_printer();
        drain(&mut rx);

        assert_matches!(
            store.patch_job(42, JobPatch::Released(true)),
            Err(CoreError::NotFound { entity: "job", id: 42 })
        );
        assert_matches!(
            store.patch_printer(7, PrinterPatch::CanPause(true)),
            Err(CoreError::NotFound { entity: "printer", id: 7 })
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn set_derived_skips_identical_metrics() {
        let (mut store, mut rx) = store_with_printer();
        drain(&mut rx);

        let metrics = DerivedTimeMetrics::initial();
        assert!(store.set_derived(10, metrics).unwrap());
        assert!(!store.set_derived(10, metrics).unwrap());
        assert_eq!(
            drain(&mut rx),
            vec![MirrorEvent::TimeMetricsUpdated { job_id: 10, metrics }]
        );
    }

    #[test]
    fn snapshot_carries_time_state() {
        let (mut store, _rx) = store_with_printer();
        store
            .patch_job(10, JobPatch::Time(TimeUpdate::TotalSeconds(300.0)))
            .unwrap();

        let mut fresh = Printer::new(1, "Prusa");
        fresh.queue = vec![Job::new(10, "a")];
        assert!(store.load_snapshot(vec![fresh.clone()]));
        assert_eq!(
            store.find_job(10).unwrap().static_time.unwrap().total_duration_seconds,
            300.0
        );
        assert!(store.find_job(11).is_none());

        assert!(!store.load_snapshot(vec![fresh]));
    }

    #[test]
    fn remove_printer_drops_its_jobs() {
        let (mut store, mut rx) = store_with_printer();
        drain(&mut rx);

        let removed = store.remove_printer(1).unwrap();
        assert_eq!(removed.queue.len(), 2);
        assert!(store.find_job(10).is_none());
        assert!(store.remove_printer(1).is_none());
        assert_eq!(drain(&mut rx), vec![MirrorEvent::PrinterRemoved { printer_id: 1 }]);
    }

    #[test]
    fn remove_job_publishes() {
        let (mut store, mut rx) = store_with_printer();
        drain(&mut rx);

        assert_eq!(store.remove_job(11).unwrap().id, 11);
        assert!(store.remove_job(11).is_none());
        assert_eq!(drain(&mut rx), vec![MirrorEvent::JobRemoved { job_id: 11 }]);
    }
}
