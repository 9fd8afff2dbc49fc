//! WebSocket frame processing loop.
//!
//! Reads raw frames from the print-server connection, answers Engine.IO
//! keep-alive pings, joins the default Socket.IO namespace, parses events
//! into typed [`PushEvent`](crate::messages::PushEvent)s and forwards them
//! as [`LinkEvent`]s.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use printdeck_core::endpoint::Endpoint;

use crate::client::{SocketClientError, WsStream};
use crate::events::LinkEvent;
use crate::messages::parse_event;
use crate::packet::{parse_packet, Packet};

/// Silence tolerated before the server's handshake announces its own
/// ping interval.
const DEFAULT_LIVENESS: Duration = Duration::from_secs(45);

/// Upper bound on the silence allowed by a server handshake.
const MAX_LIVENESS: Duration = Duration::from_secs(600);

/// Process frames until the connection closes, fails, goes silent, or
/// `cancel` fires.
///
/// Sends [`LinkEvent::Connected`] once the namespace join is acknowledged
/// and [`LinkEvent::Disconnected`] on exit if it was. Returns `Ok(())` for
/// an orderly close.
pub async fn process_frames(
    ws_stream: &mut WsStream,
    endpoint: Endpoint,
    event_tx: &mpsc::Sender<LinkEvent>,
    cancel: &CancellationToken,
) -> Result<(), SocketClientError> {
    let mut session = Session {
        endpoint,
        event_tx,
        joined: false,
        liveness: DEFAULT_LIVENESS,
    };
    let result = session.run(ws_stream, cancel).await;

    if session.joined {
        let _ = event_tx.send(LinkEvent::Disconnected).await;
    }
    result
}

struct Session<'a> {
    endpoint: Endpoint,
    event_tx: &'a mpsc::Sender<LinkEvent>,
    joined: bool,
    liveness: Duration,
}

/// What the read loop should do after a frame.
enum Flow {
    Continue,
    Stop,
}

impl Session<'_> {
    async fn run(
        &mut self,
        ws_stream: &mut WsStream,
        cancel: &CancellationToken,
    ) -> Result<(), SocketClientError> {
        let mut deadline = Instant::now() + self.liveness;

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws_stream.send(Message::Text(Packet::Disconnect.encode())).await;
                    let _ = ws_stream.close(None).await;
                    return Ok(());
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(SocketClientError::Protocol(format!(
                        "no frame from {} within {:?}",
                        self.endpoint, self.liveness
                    )));
                }
                frame = ws_stream.next() => frame,
            };

            let Some(frame) = frame else {
                tracing::info!(endpoint = %self.endpoint, "Print server stream ended");
                return Ok(());
            };

            deadline = Instant::now() + self.liveness;

            match frame {
                Ok(Message::Text(text)) => {
                    if let Flow::Stop = self.handle_text(&text, ws_stream).await? {
                        return Ok(());
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::trace!(endpoint = %self.endpoint, "Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(endpoint = %self.endpoint, ?frame, "Print server WebSocket closed");
                    return Ok(());
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    return Err(SocketClientError::Protocol(format!(
                        "WebSocket receive error: {e}"
                    )));
                }
            }
        }
    }

    async fn handle_text(
        &mut self,
        text: &str,
        ws_stream: &mut WsStream,
    ) -> Result<Flow, SocketClientError> {
        let packet = match parse_packet(text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    raw_frame = %text,
                    "Failed to parse print server frame",
                );
                return Ok(Flow::Continue);
            }
        };

        match packet {
            Packet::Open(handshake) => {
                self.liveness = handshake.liveness().min(MAX_LIVENESS);
                tracing::debug!(
                    endpoint = %self.endpoint,
                    sid = %handshake.sid,
                    ping_interval_ms = handshake.ping_interval,
                    "Engine.IO session opened",
                );
                send(ws_stream, Packet::Connect).await?;
            }
            Packet::Ping => send(ws_stream, Packet::Pong).await?,
            Packet::Connect => {
                tracing::info!(endpoint = %self.endpoint, "Joined print server namespace");
                self.joined = true;
                return Ok(self.forward(LinkEvent::Connected).await);
            }
            Packet::Event { name, data } => match parse_event(&name, data) {
                Ok(event) => return Ok(self.forward(LinkEvent::Push(event)).await),
                Err(e) => {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        event = %name,
                        error = %e,
                        "Ignoring unrecognised push event",
                    );
                }
            },
            Packet::ConnectError(data) => {
                return Err(SocketClientError::Protocol(format!(
                    "namespace join refused: {data}"
                )));
            }
            Packet::Disconnect | Packet::Close => {
                tracing::info!(endpoint = %self.endpoint, "Print server closed the session");
                return Ok(Flow::Stop);
            }
            Packet::Pong | Packet::Noop => {}
            Packet::Other(raw) => {
                tracing::trace!(endpoint = %self.endpoint, raw_frame = %raw, "Ignoring frame");
            }
        }

        Ok(Flow::Continue)
    }

    /// Forward an event; stop when nobody is listening any more.
    async fn forward(&self, event: LinkEvent) -> Flow {
        match self.event_tx.send(event).await {
            Ok(()) => Flow::Continue,
            Err(_) => {
                tracing::info!(endpoint = %self.endpoint, "Link event receiver dropped");
                Flow::Stop
            }
        }
    }
}

async fn send(ws_stream: &mut WsStream, packet: Packet) -> Result<(), SocketClientError> {
    ws_stream
        .send(Message::Text(packet.encode()))
        .await
        .map_err(|e| SocketClientError::Protocol(format!("WebSocket send error: {e}")))
}
