//! The reconciliation event loop.
//!
//! One task owns the [`Store`], the ticker registry and the set of
//! in-flight resync requests, and processes [`Command`]s from a single
//! inbox strictly in arrival order. Tickers, resync requests and the push
//! transport only send commands; nothing else touches the store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use printdeck_core::job::DerivedTimeMetrics;
use printdeck_core::printer::Printer;
use printdeck_core::time::NaiveZone;
use printdeck_core::types::DbId;
use printdeck_events::bus::{EventBus, MirrorEvent};
use printdeck_events::notify::{Notification, NotificationSink};
use printdeck_link::api::TimeData;
use printdeck_link::events::LinkEvent;
use printdeck_link::messages::PushEvent;

use crate::clock::Clock;
use crate::dispatcher::Dispatcher;
use crate::patch::JobPatch;
use crate::projector::{compute, Projector, DEFAULT_TICK_INTERVAL};
use crate::resync::{resync_targets, target_for_job, time_updates, ResyncError, ResyncSource, ResyncTarget};
use crate::store::Store;

/// Inbox capacity of the engine task.
const INBOX_CAPACITY: usize = 256;

/// Upper bound on one server pull. A pull that takes longer counts as failed.
pub const PULL_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the engine reacts to.
#[derive(Debug)]
pub enum Command {
    /// A typed server push.
    Push(PushEvent),
    /// Periodic tick from the ticker of `job_id`.
    Tick { job_id: DbId, generation: u64 },
    /// Fetch the full printer snapshot from the server.
    Refresh,
    /// A snapshot fetch finished.
    Snapshot(Result<Vec<Printer>, ResyncError>),
    /// A timing fetch finished.
    ResyncCompleted {
        target: ResyncTarget,
        result: Result<TimeData, ResyncError>,
    },
    /// The user asked for fresh timing of a job (e.g. re-opened its panel).
    RequestTiming { job_id: DbId },
    /// A printer was deregistered.
    RemovePrinter { printer_id: DbId },
    TransportConnected,
    TransportDisconnected,
    /// Read the current state.
    GetSnapshot(oneshot::Sender<Vec<Printer>>),
    Shutdown,
}

impl From<LinkEvent> for Command {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::Connected => Self::TransportConnected,
            LinkEvent::Disconnected => Self::TransportDisconnected,
            LinkEvent::Push(event) => Self::Push(event),
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    pub naive_zone: NaiveZone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            naive_zone: NaiveZone::default(),
        }
    }
}

/// Errors returned by [`EngineHandle`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine task has stopped")]
    Stopped,
}

/// Cloneable handle for talking to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    bus: Arc<EventBus>,
}

impl EngineHandle {
    pub async fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx.send(command).await.map_err(|_| EngineError::Stopped)
    }

    pub async fn push(&self, event: PushEvent) -> Result<(), EngineError> {
        self.send(Command::Push(event)).await
    }

    pub async fn refresh(&self) -> Result<(), EngineError> {
        self.send(Command::Refresh).await
    }

    pub async fn request_timing(&self, job_id: DbId) -> Result<(), EngineError> {
        self.send(Command::RequestTiming { job_id }).await
    }

    pub async fn remove_printer(&self, printer_id: DbId) -> Result<(), EngineError> {
        self.send(Command::RemovePrinter { printer_id }).await
    }

    /// Copy of every mirrored printer with its queue.
    pub async fn snapshot(&self) -> Result<Vec<Printer>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetSnapshot(reply)).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Change notifications; re-read [`snapshot`](Self::snapshot) on receipt.
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.bus.subscribe()
    }

    /// Ask the engine to stop. Tickers are cancelled before it exits.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    /// Forward transport events into the engine until either side closes.
    pub fn attach_link(&self, mut link_rx: mpsc::Receiver<LinkEvent>) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(event) = link_rx.recv().await {
                if handle.send(event.into()).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Link event pump exited");
        })
    }
}

/// Collaborators injected into the engine.
pub struct EngineDeps {
    pub source: Arc<dyn ResyncSource>,
    pub sink: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub bus: Arc<EventBus>,
}

/// Spawn the engine task.
pub fn spawn_engine(config: EngineConfig, deps: EngineDeps) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
    let engine = Engine {
        store: Store::new(Arc::clone(&deps.bus)),
        projector: Projector::new(config.tick_interval),
        dispatcher: Dispatcher::new(config.naive_zone),
        pending_resync: HashSet::new(),
        naive_zone: config.naive_zone,
        source: deps.source,
        sink: deps.sink,
        clock: deps.clock,
        bus: Arc::clone(&deps.bus),
        inbox_tx: tx.clone(),
        inbox: rx,
    };

    let task = tokio::spawn(engine.run());
    (EngineHandle { tx, bus: deps.bus }, task)
}

struct Engine {
    store: Store,
    projector: Projector,
    dispatcher: Dispatcher,
    pending_resync: HashSet<DbId>,
    naive_zone: NaiveZone,
    source: Arc<dyn ResyncSource>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    /// Handed to tickers and resync tasks.
    inbox_tx: mpsc::Sender<Command>,
    inbox: mpsc::Receiver<Command>,
}

impl Engine {
    async fn run(mut self) {
        tracing::info!(tick_ms = self.projector.interval().as_millis() as u64, "Mirror engine started");

        while let Some(command) = self.inbox.recv().await {
            if let Command::Shutdown = command {
                break;
            }
            self.handle(command);
        }

        self.projector.stop_all();
        tracing::info!("Mirror engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Push(event) => self.on_push(event),
            Command::Tick { job_id, generation } => self.on_tick(job_id, generation),
            Command::Refresh => self.fetch_snapshot(),
            Command::Snapshot(result) => self.on_snapshot(result),
            Command::ResyncCompleted { target, result } => self.on_resync_completed(target, result),
            Command::RequestTiming { job_id } => self.on_request_timing(job_id),
            Command::RemovePrinter { printer_id } => self.on_remove_printer(printer_id),
            Command::TransportConnected => {
                tracing::info!("Push channel connected, rebuilding state");
                self.bus.publish(MirrorEvent::ConnectionChanged { connected: true });
                self.fetch_snapshot();
            }
            Command::TransportDisconnected => {
                tracing::info!("Push channel disconnected");
                self.bus.publish(MirrorEvent::ConnectionChanged { connected: false });
            }
            Command::GetSnapshot(reply) => {
                let _ = reply.send(self.store.printers().to_vec());
            }
            Command::Shutdown => {}
        }
    }

    // ---- command handlers ----

    fn on_push(&mut self, event: PushEvent) {
        let outcome = self.dispatcher.dispatch(&mut self.store, event);
        if outcome.schedule_changed {
            self.reconcile_tickers();
        }
        if let Some(job_id) = outcome.timing_changed {
            if self.projector.is_ticking(job_id) {
                self.recompute(job_id);
            }
        }
    }

    fn on_tick(&mut self, job_id: DbId, generation: u64) {
        if !self.projector.is_current(job_id, generation) {
            tracing::trace!(job_id, generation, "Dropping stale tick");
            return;
        }
        if !self.should_tick(job_id) {
            self.projector.stop(job_id);
            return;
        }
        self.recompute(job_id);
    }

    fn on_snapshot(&mut self, result: Result<Vec<Printer>, ResyncError>) {
        match result {
            Ok(printers) => {
                tracing::info!(printers = printers.len(), "Loaded printer snapshot");
                self.store.load_snapshot(printers);
                self.reconcile_tickers();
                self.resync_sweep();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load printer snapshot");
                self.sink
                    .notify(Notification::error(format!("Could not load printers: {e}")));
            }
        }
    }

    fn on_resync_completed(&mut self, target: ResyncTarget, result: Result<TimeData, ResyncError>) {
        self.pending_resync.remove(&target.job_id);
        let job_id = target.job_id;

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(job_id, printer_id = target.printer_id, error = %e, "Timing resync failed");
                self.sink.notify(Notification::warning(format!(
                    "Could not refresh timing for job {job_id}: {e}"
                )));
                return;
            }
        };

        let Some(started) = self.store.find_job(job_id).map(|job| job.time_started) else {
            tracing::debug!(job_id, "Resynced job no longer exists");
            return;
        };

        for update in time_updates(&data, started, self.naive_zone) {
            if let Err(e) = self.store.patch_job(job_id, JobPatch::Time(update)) {
                tracing::debug!(job_id, error = %e, "Dropping resynced timing");
            }
        }

        if self.projector.is_ticking(job_id) {
            self.recompute(job_id);
        }
    }

    fn on_request_timing(&mut self, job_id: DbId) {
        match target_for_job(&self.store, job_id) {
            Some(target) => self.launch_resync(target),
            None => tracing::debug!(job_id, "Timing requested for a job that is not printing"),
        }
    }

    fn on_remove_printer(&mut self, printer_id: DbId) {
        match self.store.remove_printer(printer_id) {
            Some(printer) => {
                tracing::info!(printer_id, jobs = printer.queue.len(), "Printer removed");
                self.reconcile_tickers();
            }
            None => tracing::debug!(printer_id, "Removal of unknown printer ignored"),
        }
    }

    // ---- projection ----

    /// Stop tickers whose job no longer qualifies and start tickers for
    /// every qualifying job that lacks one.
    fn reconcile_tickers(&mut self) {
        for job_id in self.projector.ticking_jobs() {
            if !self.should_tick(job_id) {
                self.projector.stop(job_id);
            }
        }

        let heads: Vec<DbId> = self
            .store
            .printers()
            .iter()
            .filter(|printer| printer.status.is_active())
            .filter_map(|printer| printer.head().map(|job| job.id))
            .collect();

        let mut missing_facts = false;
        for job_id in heads {
            if self.projector.is_ticking(job_id) {
                continue;
            }
            self.start_ticker(job_id);
            missing_facts |= self
                .store
                .find_job(job_id)
                .is_some_and(|job| job.static_time.is_none());
        }

        if missing_facts {
            self.resync_sweep();
        }
    }

    fn start_ticker(&mut self, job_id: DbId) {
        self.projector.start(job_id, self.inbox_tx.clone());

        let has_metrics = self
            .store
            .find_job(job_id)
            .is_some_and(|job| job.derived_time.is_some());
        if !has_metrics {
            if let Err(e) = self.store.set_derived(job_id, DerivedTimeMetrics::initial()) {
                tracing::debug!(job_id, error = %e, "Cannot initialise metrics");
            }
        }

        self.recompute(job_id);
    }

    /// A job ticks while its printer is active and it heads the queue.
    fn should_tick(&self, job_id: DbId) -> bool {
        self.store
            .printer_of_job(job_id)
            .is_some_and(|printer| printer.status.is_active() && printer.is_head(job_id))
    }

    fn recompute(&mut self, job_id: DbId) {
        let Some(printer) = self.store.printer_of_job(job_id) else {
            return;
        };
        let Some(job) = printer.job(job_id) else {
            return;
        };

        let previous = job.derived_time.unwrap_or_default();
        let next = compute(
            job.static_time.as_ref(),
            printer.status,
            &previous,
            self.clock.now_millis(),
        );

        if let Err(e) = self.store.set_derived(job_id, next) {
            tracing::debug!(job_id, error = %e, "Dropping projected metrics");
        }
    }

    // ---- server pulls ----

    fn fetch_snapshot(&self) {
        let source = Arc::clone(&self.source);
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(PULL_TIMEOUT, source.fetch_printers())
                .await
                .unwrap_or_else(|_| Err(ResyncError::TimedOut(PULL_TIMEOUT)));
            let _ = inbox.send(Command::Snapshot(result)).await;
        });
    }

    fn resync_sweep(&mut self) {
        for target in resync_targets(&self.store) {
            self.launch_resync(target);
        }
    }

    /// Fetch timing for one job unless a request for it is already running.
    fn launch_resync(&mut self, target: ResyncTarget) {
        if !self.pending_resync.insert(target.job_id) {
            tracing::trace!(job_id = target.job_id, "Resync already in flight");
            return;
        }

        tracing::debug!(job_id = target.job_id, printer_id = target.printer_id, "Resyncing timing");
        let source = Arc::clone(&self.source);
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            let fetch = source.fetch_static_time(target.printer_id, target.job_id);
            let result = tokio::time::timeout(PULL_TIMEOUT, fetch)
                .await
                .unwrap_or_else(|_| Err(ResyncError::TimedOut(PULL_TIMEOUT)));
            let _ = inbox.send(Command::ResyncCompleted { target, result }).await;
        });
    }
}
