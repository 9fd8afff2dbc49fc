//! Print-server link: Socket.IO push channel and REST client.
//!
//! Provides Engine.IO/Socket.IO packet framing, typed push-event parsing,
//! the websocket connection with keep-alive and reconnection, the
//! process-wide [`PushTransport`](transport::PushTransport), and HTTP
//! wrappers for the snapshot and timing endpoints.

pub mod api;
pub mod client;
pub mod events;
pub mod messages;
pub mod packet;
pub mod processor;
pub mod reconnect;
pub mod transport;

pub use api::{FarmApi, FarmApiError, TimeData};
pub use events::LinkEvent;
pub use messages::{parse_event, PushEvent};
pub use transport::PushTransport;
