//! Printer and job status enums as reported by the print server.

use serde::{Deserialize, Serialize};

/// Connectivity / activity status of a printer.
///
/// Wire values are lowercase strings (`"printing"`, `"colorchange"`, ...).
/// Anything the server adds later decodes to [`PrinterStatus::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Idle,
    Ready,
    Printing,
    Paused,
    ColorChange,
    Complete,
    Error,
    Offline,
    Configuring,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PrinterStatus {
    /// Statuses during which the printer's head job is progressing and its
    /// time metrics must be projected.
    pub const ACTIVE: [PrinterStatus; 3] = [
        PrinterStatus::Printing,
        PrinterStatus::Paused,
        PrinterStatus::ColorChange,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::ColorChange => "colorchange",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Configuring => "configuring",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a queued job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue, not started yet.
    InQueue,
    Printing,
    Complete,
    Error,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InQueue => "inqueue",
            Self::Printing => "printing",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
