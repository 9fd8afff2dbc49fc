//! Events emitted by the push transport.

use crate::messages::PushEvent;

/// What the transport reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The Socket.IO namespace handshake completed.
    Connected,

    /// The connection dropped or was closed.
    Disconnected,

    /// A typed server push.
    Push(PushEvent),
}
