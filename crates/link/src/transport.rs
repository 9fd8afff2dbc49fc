//! Process-wide push subscription.
//!
//! [`PushTransport`] owns at most one connection task to the print server.
//! The task connects, processes frames, and reconnects with backoff when
//! the connection drops. Changing the endpoint closes the old task (cancel
//! and join) before the new one starts, so two subscriptions never overlap.

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use printdeck_core::endpoint::Endpoint;

use crate::client::SocketClient;
use crate::events::LinkEvent;
use crate::processor::process_frames;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// How long a stopping connection task may take to exit before it is
/// aborted.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The single push subscription of the process.
pub struct PushTransport {
    current: Mutex<Option<ManagedConnection>>,
    event_tx: mpsc::Sender<LinkEvent>,
    reconnect: ReconnectConfig,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

/// Internal bookkeeping for the running connection task.
struct ManagedConnection {
    endpoint: Endpoint,
    task_handle: tokio::task::JoinHandle<()>,
    /// Child of the master token.
    cancel: CancellationToken,
}

impl PushTransport {
    pub fn new(event_tx: mpsc::Sender<LinkEvent>) -> Self {
        Self::with_reconnect_config(event_tx, ReconnectConfig::default())
    }

    pub fn with_reconnect_config(
        event_tx: mpsc::Sender<LinkEvent>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            current: Mutex::new(None),
            event_tx,
            reconnect,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to `endpoint`, replacing any existing subscription.
    ///
    /// The previous connection task has fully exited when this returns.
    pub async fn reconfigure(&self, endpoint: Endpoint) {
        let mut current = self.current.lock().await;

        if let Some(old) = current.take() {
            tracing::info!(from = %old.endpoint, to = %endpoint, "Switching print server");
            stop_connection(old).await;
        }

        if self.cancel.is_cancelled() {
            tracing::warn!(%endpoint, "Push transport already shut down, not connecting");
            return;
        }

        *current = Some(self.spawn_connection(endpoint));
    }

    /// Endpoint of the running subscription, if any.
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.current.lock().await.as_ref().map(|managed| managed.endpoint)
    }

    /// Gracefully stop the connection task.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down push transport");
        self.cancel.cancel();

        if let Some(managed) = self.current.lock().await.take() {
            stop_connection(managed).await;
        }

        tracing::info!("Push transport shut down complete");
    }

    // ---- private helpers ----

    fn spawn_connection(&self, endpoint: Endpoint) -> ManagedConnection {
        let cancel = self.cancel.child_token();
        let client = SocketClient::new(endpoint);
        let event_tx = self.event_tx.clone();
        let reconnect = self.reconnect.clone();
        let task_cancel = cancel.clone();

        let task_handle = tokio::spawn(async move {
            tracing::info!(%endpoint, "Starting push connection task");
            run_connection_loop(&client, &event_tx, &reconnect, &task_cancel).await;
            tracing::info!(%endpoint, "Push connection task exited");
        });

        ManagedConnection {
            endpoint,
            task_handle,
            cancel,
        }
    }
}

async fn stop_connection(managed: ManagedConnection) {
    managed.cancel.cancel();
    let mut handle = managed.task_handle;
    if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
        tracing::warn!(endpoint = %managed.endpoint, "Push connection task did not stop, aborting");
        handle.abort();
    }
}

/// Core connection loop: connect -> process frames -> reconnect.
///
/// Runs until the cancellation token is triggered or the event receiver
/// is dropped.
async fn run_connection_loop(
    client: &SocketClient,
    event_tx: &mpsc::Sender<LinkEvent>,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) {
    let endpoint = client.endpoint();

    let first = tokio::select! {
        _ = cancel.cancelled() => return,
        result = client.connect() => result,
    };
    let mut conn = match first {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(%endpoint, error = %e, "Connection failed, entering reconnect loop");
            match reconnect_loop(client, reconnect, cancel).await {
                Some(conn) => conn,
                None => return,
            }
        }
    };

    loop {
        if let Err(e) = process_frames(&mut conn.ws_stream, endpoint, event_tx, cancel).await {
            tracing::warn!(%endpoint, error = %e, "Push connection failed");
        }

        if cancel.is_cancelled() || event_tx.is_closed() {
            return;
        }

        tracing::info!(%endpoint, "Connection lost, entering reconnect loop");
        conn = match reconnect_loop(client, reconnect, cancel).await {
            Some(conn) => conn,
            None => return,
        };
    }
}
