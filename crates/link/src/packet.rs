//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Every websocket text frame is one Engine.IO packet: a single type digit
//! followed by an optional payload. Packet type `4` (message) carries a
//! Socket.IO packet, itself a type digit, an optional `/namespace,`
//! prefix, an optional ack id and a JSON payload. Events look like
//! `42["status_update",{"printer_id":1,"status":"printing"}]`.
//!
//! Binary attachments and acknowledgements are never used by the print
//! server and decode to [`Packet::Other`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
}

impl Handshake {
    /// How long the session may stay silent before it is considered dead.
    pub fn liveness(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO `0`: session opened.
    Open(Handshake),
    /// Engine.IO `1`.
    Close,
    /// Engine.IO `2`; must be answered with [`Packet::Pong`].
    Ping,
    /// Engine.IO `3`.
    Pong,
    /// Engine.IO `6`.
    Noop,
    /// Socket.IO `40`: namespace joined (or, when sent by us, join request).
    Connect,
    /// Socket.IO `41`.
    Disconnect,
    /// Socket.IO `42`: a named event with its first argument.
    Event { name: String, data: Value },
    /// Socket.IO `44`: the server refused the namespace join.
    ConnectError(Value),
    /// Any other well-formed frame, kept verbatim.
    Other(String),
}

/// Errors produced while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown packet type '{0}'")]
    UnknownType(char),

    #[error("Event packet without a name")]
    MissingEventName,

    #[error("Invalid packet payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl Packet {
    /// Encode the packet as a websocket text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Noop => "6".to_string(),
            Self::Connect => "40".to_string(),
            Self::Disconnect => "41".to_string(),
            Self::Event { name, data } => {
                let args = Value::Array(vec![Value::String(name.clone()), data.clone()]);
                format!("42{args}")
            }
            Self::ConnectError(data) => format!("44{data}"),
            Self::Other(raw) => raw.clone(),
        }
    }
}

/// Decode one websocket text frame.
pub fn parse_packet(text: &str) -> Result<Packet, PacketError> {
    let (kind, rest) = split_type(text)?;
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => parse_socket_packet(text, rest),
        '5' => Ok(Packet::Other(text.to_string())),
        '6' => Ok(Packet::Noop),
        other => Err(PacketError::UnknownType(other)),
    }
}

// ---- private helpers ----

fn split_type(text: &str) -> Result<(char, &str), PacketError> {
    let kind = text.chars().next().ok_or(PacketError::Empty)?;
    Ok((kind, &text[kind.len_utf8()..]))
}

fn parse_socket_packet(frame: &str, body: &str) -> Result<Packet, PacketError> {
    let (kind, mut rest) = split_type(body)?;

    if rest.starts_with('/') {
        rest = rest.find(',').map_or("", |comma| &rest[comma + 1..]);
    }
    let ack_digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    rest = &rest[ack_digits..];

    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => parse_event_args(rest),
        '4' if rest.is_empty() => Ok(Packet::ConnectError(Value::Null)),
        '4' => Ok(Packet::ConnectError(serde_json::from_str(rest)?)),
        '3' | '5' | '6' => Ok(Packet::Other(frame.to_string())),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn parse_event_args(payload: &str) -> Result<Packet, PacketError> {
    let mut args = serde_json::from_str::<Vec<Value>>(payload)?.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(PacketError::MissingEventName),
    };
    Ok(Packet::Event {
        name,
        data: args.next().unwrap_or(Value::Null),
    })
}
