//! Client-local mirror of print-farm state.
//!
//! Keeps printers, queues and job timing consistent with the print server
//! from an out-of-order push stream plus on-demand pulls, and projects
//! elapsed / remaining / extra time between pushes with a local tick.
//!
//! - [`store`] / [`patch`]: the mirrored state and its field updates.
//! - [`dispatcher`]: push event routing.
//! - [`projector`]: time computation and the per-job ticker registry.
//! - [`resync`]: snapshot and timing pulls.
//! - [`engine`]: the single-owner event loop tying it together.
//! - [`service`]: start-up wiring with the push transport.

pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod patch;
pub mod projector;
pub mod resync;
pub mod service;
pub mod store;

pub use engine::{spawn_engine, Command, EngineConfig, EngineDeps, EngineError, EngineHandle};
pub use service::{MirrorConfig, MirrorService};
pub use store::Store;
