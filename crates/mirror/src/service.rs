//! Wiring of the engine, the push transport and the REST client.
//!
//! [`MirrorService`] is created once at start-up. It owns the single push
//! subscription and keeps the REST client and the subscription pointed at
//! the same server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use printdeck_core::endpoint::Endpoint;
use printdeck_events::bus::EventBus;
use printdeck_events::notify::NotificationSink;
use printdeck_link::api::FarmApi;
use printdeck_link::transport::PushTransport;

use crate::clock::SystemClock;
use crate::engine::{spawn_engine, EngineConfig, EngineDeps, EngineHandle};

/// Buffer between the transport and the engine inbox.
const LINK_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for the engine task.
const ENGINE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MirrorConfig {
    pub endpoint: Endpoint,
    pub engine: EngineConfig,
}

pub struct MirrorService {
    engine: EngineHandle,
    engine_task: JoinHandle<()>,
    link_pump: JoinHandle<()>,
    transport: PushTransport,
    api: Arc<FarmApi>,
}

impl MirrorService {
    /// Start the engine, subscribe to the server and request the initial
    /// snapshot. Notices go to `bus` as [`MirrorEvent::Notice`](printdeck_events::MirrorEvent::Notice).
    pub async fn start(config: MirrorConfig, bus: Arc<EventBus>) -> Self {
        let api = Arc::new(FarmApi::new(config.endpoint.api_root()));
        let sink: Arc<dyn NotificationSink> = bus.clone();

        let (engine, engine_task) = spawn_engine(
            config.engine,
            EngineDeps {
                source: api.clone(),
                sink,
                clock: Arc::new(SystemClock),
                bus,
            },
        );

        let (link_tx, link_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let link_pump = engine.attach_link(link_rx);
        let transport = PushTransport::new(link_tx);
        transport.reconfigure(config.endpoint).await;

        if engine.refresh().await.is_err() {
            tracing::error!("Engine stopped before the initial snapshot was requested");
        }

        Self {
            engine,
            engine_task,
            link_pump,
            transport,
            api,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.transport.endpoint().await
    }

    /// Point both the REST client and the push subscription at a new
    /// server. The old subscription is closed before the new one opens.
    pub async fn reconfigure(&self, endpoint: Endpoint) {
        self.api.set_api_root(endpoint.api_root()).await;
        self.transport.reconfigure(endpoint).await;
    }

    pub async fn shutdown(self) {
        tracing::info!("Shutting down mirror");
        self.transport.shutdown().await;
        self.engine.shutdown().await;

        let mut engine_task = self.engine_task;
        if tokio::time::timeout(ENGINE_STOP_TIMEOUT, &mut engine_task)
            .await
            .is_err()
        {
            tracing::warn!("Mirror engine did not stop in time, aborting");
            engine_task.abort();
        }
        self.link_pump.abort();

        tracing::info!("Mirror shut down complete");
    }
}
