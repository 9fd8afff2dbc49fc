//! WebSocket client for the print server's Socket.IO endpoint.
//!
//! [`SocketClient`] holds the endpoint of the server. Call
//! [`SocketClient::connect`] to establish a live [`SocketConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use printdeck_core::endpoint::Endpoint;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection handle for one print server.
#[derive(Debug, Clone)]
pub struct SocketClient {
    endpoint: Endpoint,
}

/// A live WebSocket connection to the print server.
pub struct SocketConnection {
    pub endpoint: Endpoint,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl SocketClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Open the websocket. The Engine.IO session is opened by the server's
    /// first frame; see [`crate::processor`].
    pub async fn connect(&self) -> Result<SocketConnection, SocketClientError> {
        let url = self.endpoint.socket_url();

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            SocketClientError::Connection(format!(
                "Failed to connect to print server at {}: {e}",
                self.endpoint
            ))
        })?;

        tracing::info!(endpoint = %self.endpoint, "Connected to print server");

        Ok(SocketConnection {
            endpoint: self.endpoint,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum SocketClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
