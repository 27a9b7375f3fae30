//! WebSocket implementation of [`ChannelLink`] on tokio-tungstenite.
//!
//! The socket lives in its own task. Outbound frames reach it through an
//! unbounded queue so [`ChannelLink::send`] never awaits; everything the socket
//! observes comes back as [`ChannelEvent`]s.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChannelEvent, ChannelLink, Connector, OutboundFrame};
use crate::error::{SessionError, SessionResult};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

enum Command {
    Frame(OutboundFrame),
    Close,
}

/// Opens [`WebSocketLink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open(&self, endpoint: &str) -> (Box<dyn ChannelLink>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (link, events) = WebSocketLink::open(endpoint);
        (Box::new(link), events)
    }
}

pub struct WebSocketLink {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketLink {
    /// Start connecting in the background. Must be called inside a Tokio runtime.
    pub fn open(endpoint: &str) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint = endpoint.to_string();

        let task = tokio::spawn(async move {
            drive_socket(endpoint, commands_rx, events_tx).await;
        });

        (
            Self {
                commands: commands_tx,
                task: Some(task),
            },
            events_rx,
        )
    }
}

#[async_trait]
impl ChannelLink for WebSocketLink {
    fn send(&mut self, frame: OutboundFrame) -> SessionResult<()> {
        self.commands
            .send(Command::Frame(frame))
            .map_err(|_| SessionError::connection_closed(None, "socket task has exited"))
    }

    async fn close(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let _ = self.commands.send(Command::Close);

        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            warn!("socket did not close within {:?}, aborting", CLOSE_GRACE);
            task.abort();
            let _ = task.await;
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WebSocketLink {
    fn drop(&mut self) {
        ChannelLink::abort(self);
    }
}

async fn drive_socket(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let ws_stream = tokio::select! {
        connected = connect_async(endpoint.as_str()) => match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let _ = events.send(ChannelEvent::Failed(e.to_string()));
                return;
            }
        },
        // Teardown while still connecting.
        _ = wait_for_close(&mut commands) => {
            let _ = events.send(ChannelEvent::Closed {
                code: None,
                reason: "closed before open".to_string(),
            });
            return;
        }
    };

    let _ = events.send(ChannelEvent::Opened);
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Frame(frame)) => {
                    let message = match frame {
                        OutboundFrame::Text(text) => Message::Text(text),
                        OutboundFrame::Binary(bytes) => Message::Binary(bytes),
                    };
                    if let Err(e) = sink.send(message).await {
                        let _ = events.send(ChannelEvent::Failed(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    let _ = events.send(ChannelEvent::Closed {
                        code: None,
                        reason: "closed by client".to_string(),
                    });
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChannelEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    let _ = events.send(ChannelEvent::Message(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    let _ = events.send(ChannelEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(ChannelEvent::Failed(e.to_string()));
                    break;
                }
                None => {
                    let _ = events.send(ChannelEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }

    debug!("socket task for {} finished", endpoint);
}

/// Resolves when a close is requested or every sender is gone.
/// Frames queued before the socket opens are dropped.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}
