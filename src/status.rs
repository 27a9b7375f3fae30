//! # Status Types
//!
//! Values that flow from the analysis service (and from local lifecycle
//! events) into the current-status projection and the timeline.
//!
//! - [`StatusValue`]: an opaque label produced by the remote service. The set
//!   of labels is open; nothing here enumerates them.
//! - [`Sentinel`]: a status synthesized locally from lifecycle state.
//! - [`CurrentStatus`]: either of the above, as held by the projection cell.
//! - [`TimelineEntry`]: one recorded status transition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque status label emitted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusValue(String);

impl StatusValue {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusValue {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Locally synthesized status, used when no remote value is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    Connecting,
    Connected,
    CameraBlocked,
    BackendError,
    Disconnected,
}

impl Sentinel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::Connecting => "CONNECTING",
            Sentinel::Connected => "CONNECTED",
            Sentinel::CameraBlocked => "CAMERA BLOCKED",
            Sentinel::BackendError => "BACKEND ERROR",
            Sentinel::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of the current-status cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentStatus {
    Remote(StatusValue),
    Local(Sentinel),
}

impl CurrentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CurrentStatus::Remote(value) => value.as_str(),
            CurrentStatus::Local(sentinel) => sentinel.as_str(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, CurrentStatus::Local(_))
    }
}

impl Default for CurrentStatus {
    fn default() -> Self {
        CurrentStatus::Local(Sentinel::Connecting)
    }
}

impl fmt::Display for CurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Sentinel> for CurrentStatus {
    fn from(sentinel: Sentinel) -> Self {
        CurrentStatus::Local(sentinel)
    }
}

impl From<StatusValue> for CurrentStatus {
    fn from(value: StatusValue) -> Self {
        CurrentStatus::Remote(value)
    }
}

/// One observed status transition. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Wall-clock display time at arrival (`HH:MM:SS`)
    pub timestamp: String,
    pub status: StatusValue,
    /// Optional detail the service attached to the transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Source of wall-clock display times for timeline entries.
pub trait Clock: Send + Sync {
    fn display_time(&self) -> String;
}

/// Local wall clock, formatted `HH:MM:SS`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn display_time(&self) -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }
}

/// Clock that always reports the same time.
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn display_time(&self) -> String {
        self.0.clone()
    }
}
