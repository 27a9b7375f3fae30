//! # Channel Manager
//!
//! Owns one duplex connection to the analysis service for the lifetime of a
//! session.
//!
//! ## Architecture
//!
//! The manager is split from the transport at the [`ChannelLink`] seam:
//! 1. **ChannelLink**: writes outbound frames and closes the connection.
//! 2. **Event receiver**: an mpsc receiver of [`ChannelEvent`]s produced by the
//!    link; the session polls it directly so the manager stays borrowable by
//!    the sampler.
//! 3. **ChannelManager**: runs the [`ConnectionState`] machine and routes
//!    inbound messages to the [`StatusReconciler`].
//!
//! The manager never reconnects. Once the state is terminal it stays terminal.

pub mod state;
pub mod websocket;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::error::SessionResult;
use crate::reconciler::StatusReconciler;

pub use state::{ChannelEvent, ConnectionState, Transition};
pub use websocket::{WebSocketConnector, WebSocketLink};

/// Encoded frame ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl OutboundFrame {
    pub fn len(&self) -> usize {
        match self {
            OutboundFrame::Text(text) => text.len(),
            OutboundFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writable half of a duplex connection.
#[async_trait]
pub trait ChannelLink: Send {
    /// Queue one frame for sending. Must not block.
    fn send(&mut self, frame: OutboundFrame) -> SessionResult<()>;

    /// Close the connection. Calling it again is a no-op.
    async fn close(&mut self);

    /// Drop the connection without a close handshake.
    fn abort(&mut self) {}
}

/// Opens links. Opening returns immediately; the outcome arrives as an
/// [`ChannelEvent::Opened`] or [`ChannelEvent::Failed`] event.
pub trait Connector: Send {
    fn open(&self, endpoint: &str) -> (Box<dyn ChannelLink>, mpsc::UnboundedReceiver<ChannelEvent>);
}

pub struct ChannelManager {
    endpoint: String,
    state: ConnectionState,
    link: Box<dyn ChannelLink>,
    closed: bool,
    frames_sent: u64,
}

impl ChannelManager {
    /// Wrap a freshly opened link. The state starts at CONNECTING.
    pub fn new(endpoint: impl Into<String>, link: Box<dyn ChannelLink>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Connecting,
            link,
            closed: false,
            frames_sent: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_writable(&self) -> bool {
        self.state.is_writable() && !self.closed
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Feed one link event through the state machine.
    ///
    /// Lifecycle transitions publish their sentinel; inbound messages go to the
    /// reconciler only while the connection is open.
    pub fn handle_event(&mut self, event: ChannelEvent, reconciler: &mut StatusReconciler) -> Transition {
        let transition = self.state.on_event(&event);
        self.state = transition.to;

        if let Some(sentinel) = transition.sentinel {
            reconciler.set_sentinel(sentinel);
        }

        match event {
            ChannelEvent::Opened if transition.changed() => {
                info!("connected to {}", self.endpoint);
            }
            ChannelEvent::Failed(reason) if transition.changed() => {
                error!("connection to {} failed: {}", self.endpoint, reason);
            }
            ChannelEvent::Closed { code, reason } if transition.changed() => {
                info!("connection to {} closed (code {:?}) {}", self.endpoint, code, reason);
            }
            ChannelEvent::Message(payload) if self.state == ConnectionState::Open => {
                // Decode failures are logged and counted by the reconciler.
                let _ = reconciler.ingest(&payload);
            }
            ChannelEvent::Message(_) => {
                debug!("ignoring message while {}", self.state);
            }
            other => {
                debug!("ignoring {:?} while {}", other, self.state);
            }
        }

        transition
    }

    /// Send a frame if the connection is open.
    ///
    /// Returns `Ok(false)` without touching the link when it is not writable.
    /// A link failure is returned to the caller, which turns it into a
    /// [`ChannelEvent::Failed`].
    pub fn send(&mut self, frame: OutboundFrame) -> SessionResult<bool> {
        if !self.is_writable() {
            debug!("send skipped: connection is {}", self.state);
            return Ok(false);
        }
        self.link.send(frame)?;
        self.frames_sent += 1;
        Ok(true)
    }

    /// Close the link regardless of state. Idempotent.
    ///
    /// A connection that was still live ends as CLOSED with the DISCONNECTED
    /// sentinel; a terminal one keeps its state.
    pub async fn close(&mut self, reconciler: &mut StatusReconciler) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.link.close().await;

        if !self.state.is_terminal() {
            let closed = ChannelEvent::Closed {
                code: None,
                reason: "session teardown".to_string(),
            };
            self.handle_event(closed, reconciler);
        } else {
            debug!("link closed after terminal state {}", self.state);
        }
    }

    /// Synchronous counterpart of [`ChannelManager::close`] for teardown paths
    /// that cannot await. Idempotent, and a no-op after `close`.
    pub fn abort(&mut self, reconciler: &mut StatusReconciler) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.link.abort();

        if !self.state.is_terminal() {
            let closed = ChannelEvent::Closed {
                code: None,
                reason: "session aborted".to_string(),
            };
            self.handle_event(closed, reconciler);
        }
    }
}
