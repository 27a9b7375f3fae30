//! Connection lifecycle as an explicit state machine.
//!
//! ```text
//! CONNECTING ──Opened──▶ OPEN
//!     │                   │
//!     ├──Failed──▶ ERRORED ◀──Failed──┤
//!     └──Closed──▶ CLOSED  ◀──Closed──┘
//! ```
//!
//! CLOSED and ERRORED are terminal: every later event is ignored.

use std::fmt;

use crate::status::Sentinel;

/// Events reported by a [`super::ChannelLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Message(String),
    Failed(String),
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Result of feeding one event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// Sentinel to publish when the state changed.
    pub sentinel: Option<Sentinel>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }

    /// Frames may only be written while open.
    pub fn is_writable(self) -> bool {
        self == ConnectionState::Open
    }

    /// Pure transition function.
    pub fn on_event(self, event: &ChannelEvent) -> Transition {
        use ConnectionState::*;

        let (to, sentinel) = match (self, event) {
            (Closed | Errored, _) => (self, None),
            (Connecting, ChannelEvent::Opened) => (Open, Some(Sentinel::Connected)),
            (Connecting | Open, ChannelEvent::Failed(_)) => (Errored, Some(Sentinel::BackendError)),
            (Connecting | Open, ChannelEvent::Closed { .. }) => (Closed, Some(Sentinel::Disconnected)),
            (Open, ChannelEvent::Opened) | (_, ChannelEvent::Message(_)) => (self, None),
        };

        Transition {
            from: self,
            to,
            sentinel,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Errored => "ERRORED",
        };
        f.write_str(label)
    }
}
