//! PrintDeck change notifications and user-facing notices.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`MirrorEvent`]s.
//! - [`Notification`] / [`NotificationSink`]: user-visible notices such as
//!   failed resyncs.
//! - [`EventLogger`]: background task that writes every event to the log.

pub mod bus;
pub mod logger;
pub mod notify;

pub use bus::{EventBus, MirrorEvent};
pub use logger::EventLogger;
pub use notify::{MemorySink, Notification, NotificationSink, Severity};
