//! Domain types shared by every PrintDeck crate.
//!
//! Printers, jobs, their status enums and the two time substructures
//! (server-authoritative [`job::StaticTimeFacts`] and locally projected
//! [`job::DerivedTimeMetrics`]) live here, together with the endpoint
//! configuration and the wire timestamp parser.

pub mod endpoint;
pub mod error;
pub mod job;
pub mod printer;
pub mod status;
pub mod time;
pub mod types;
pub mod wire;

pub use endpoint::Endpoint;
pub use error::CoreError;
pub use job::{DerivedTimeMetrics, Job, StaticTimeFacts, TimeField, TimeUpdate};
pub use printer::Printer;
pub use status::{JobStatus, PrinterStatus};
pub use time::{parse_timestamp, NaiveZone};
pub use types::{DbId, EpochMillis, Timestamp};
