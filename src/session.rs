//! # Session Orchestration
//!
//! Wires the Source Acquirer, Frame Sampler, Channel Manager and Status
//! Reconciler into one session and drives them from a single task.
//!
//! ## Architecture
//!
//! 1. **SessionBuilder**: fluent configuration of the session's collaborators
//! 2. **Session**: owns every component; all state mutation happens here
//! 3. **StatusBoard**: cloneable read-only view for a presentation layer
//! 4. **SessionHandle**: stops a running session from anywhere
//!
//! ## Event Loop
//!
//! [`Session::run`] multiplexes four inputs with `tokio::select!`:
//! - the pending source acquisition (resolves once),
//! - channel lifecycle and message events,
//! - the sampling ticker,
//! - the cancellation token behind [`SessionHandle::stop`].
//!
//! Because one task handles all of them, CurrentStatus and the Timeline have a
//! single writer and need no locking. Teardown runs after the loop on every
//! exit path and is idempotent.

use log::{debug, info, warn};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::channel::{
    ChannelEvent, ChannelManager, ConnectionState, Connector, Transition, WebSocketConnector,
};
use crate::config::ClientConfig;
use crate::error::{SessionError, SessionResult};
use crate::reconciler::StatusReconciler;
use crate::sampler::{FrameSampler, TickOutcome};
use crate::source::{self, FrameSource, SourceAcquirer};
use crate::status::{Clock, CurrentStatus, LocalClock, Sentinel, TimelineEntry};

/// Everything a presentation layer may read, captured at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub current: CurrentStatus,
    pub connection: ConnectionState,
    /// Newest first.
    pub timeline: Vec<TimelineEntry>,
    pub frames_sent: u64,
}

/// Read-only observer of a session's status.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    rx: watch::Receiver<StatusSnapshot>,
}

impl StatusBoard {
    pub fn current_status(&self) -> CurrentStatus {
        self.rx.borrow().current.clone()
    }

    /// Snapshot of the timeline at the time of the call, newest first.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.rx.borrow().timeline.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.rx.borrow().connection
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next published change. Returns `false` once the session
    /// has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Stops a running session. Cloneable; stopping twice is harmless.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Summary returned by [`Session::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_sent: u64,
    pub ticks_skipped: u64,
    pub tick_failures: u64,
    pub decode_failures: u64,
    pub final_status: CurrentStatus,
    pub connection: ConnectionState,
    pub timeline_len: usize,
}

pub struct SessionBuilder {
    config: ClientConfig,
    acquirer: Option<Box<dyn SourceAcquirer>>,
    connector: Option<Box<dyn Connector>>,
    clock: Option<Box<dyn Clock>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            acquirer: None,
            connector: None,
            clock: None,
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the acquirer the configuration would select.
    pub fn with_source_acquirer<A: SourceAcquirer + 'static>(mut self, acquirer: A) -> Self {
        self.acquirer = Some(Box::new(acquirer));
        self
    }

    /// Overrides the default WebSocket connector.
    pub fn with_connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    pub fn with_clock<K: Clock + 'static>(mut self, clock: K) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Validate the configuration and open the connection.
    ///
    /// The connection attempt starts here, so this must run inside a Tokio
    /// runtime when the default WebSocket connector is used.
    pub fn build(self) -> SessionResult<Session> {
        self.config.validate()?;

        let acquirer = match self.acquirer {
            Some(acquirer) => acquirer,
            None => source::acquirer_for(&self.config)?,
        };
        let connector = self
            .connector
            .unwrap_or_else(|| Box::new(WebSocketConnector) as Box<dyn Connector>);
        let clock = self.clock.unwrap_or_else(|| Box::new(LocalClock) as Box<dyn Clock>);

        let reconciler = StatusReconciler::with_clock(clock);
        let (link, events) = connector.open(&self.config.endpoint);
        let channel = ChannelManager::new(self.config.endpoint.clone(), link);
        let sampler = FrameSampler::from_config(&self.config);

        let (board_tx, _) = watch::channel(StatusSnapshot {
            current: reconciler.current_status().clone(),
            connection: channel.state(),
            timeline: Vec::new(),
            frames_sent: 0,
        });

        info!(
            "session configured: endpoint={} interval={:?} canvas={}x{} source={:?}",
            self.config.endpoint,
            self.config.sample_interval(),
            self.config.canvas_width,
            self.config.canvas_height,
            self.config.source
        );

        Ok(Session {
            config: self.config,
            reconciler,
            channel,
            sampler,
            events,
            events_open: true,
            acquirer: Some(acquirer),
            board_tx,
            cancel: CancellationToken::new(),
            ticks_skipped: 0,
            tick_failures: 0,
            torn_down: false,
        })
    }
}

pub struct Session {
    config: ClientConfig,
    reconciler: StatusReconciler,
    channel: ChannelManager,
    sampler: FrameSampler,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    events_open: bool,
    acquirer: Option<Box<dyn SourceAcquirer>>,
    board_tx: watch::Sender<StatusSnapshot>,
    cancel: CancellationToken,
    ticks_skipped: u64,
    tick_failures: u64,
    torn_down: bool,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn board(&self) -> StatusBoard {
        StatusBoard {
            rx: self.board_tx.subscribe(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn current_status(&self) -> &CurrentStatus {
        self.reconciler.current_status()
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.reconciler.timeline()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run until stopped, then tear down.
    ///
    /// With `exit_on_disconnect` the loop also ends once the connection is
    /// terminal; otherwise the session idles, showing the terminal sentinel,
    /// until [`SessionHandle::stop`] is called.
    ///
    /// If the returned future is dropped before it completes (for example
    /// under `tokio::time::timeout`), the session is torn down synchronously
    /// with [`Session::abort`].
    pub async fn run(&mut self) -> SessionReport {
        let mut guard = AbortOnDrop { session: self };
        guard.session.run_loop().await;
        guard.session.teardown().await;
        guard.session.report()
    }

    async fn run_loop(&mut self) {
        let mut ticker = tokio::time::interval(self.config.sample_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; sampling starts one period in.
        ticker.tick().await;

        let acquirer = self.acquirer.take();
        let mut acquiring = acquirer.is_some();
        let acquisition = async move {
            match acquirer {
                Some(mut acquirer) => acquirer.acquire().await,
                None => Err(SessionError::acquisition("source", "already acquired")),
            }
        };
        tokio::pin!(acquisition);

        let cancel = self.cancel.clone();
        self.publish();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("session stop requested");
                    break;
                }
                result = &mut acquisition, if acquiring => {
                    acquiring = false;
                    self.on_acquired(result).await;
                }
                event = self.events.recv(), if self.events_open => {
                    match event {
                        Some(event) => {
                            self.on_channel_event(event);
                        }
                        None => self.on_events_closed(),
                    }
                }
                _ = ticker.tick() => {
                    self.on_tick().await;
                }
            }

            if self.config.exit_on_disconnect && self.channel.state().is_terminal() {
                info!("connection is {}, ending session", self.channel.state());
                break;
            }
        }
    }

    /// Apply one channel event and publish the result.
    pub fn on_channel_event(&mut self, event: ChannelEvent) -> Transition {
        let transition = self.channel.handle_event(event, &mut self.reconciler);
        self.publish();
        transition
    }

    fn on_events_closed(&mut self) {
        self.events_open = false;
        if !self.channel.state().is_terminal() {
            self.on_channel_event(ChannelEvent::Closed {
                code: None,
                reason: "event stream ended".to_string(),
            });
        }
    }

    /// Apply every event already queued by the link, in order.
    fn drain_events(&mut self) {
        while self.events_open {
            match self.events.try_recv() {
                Ok(event) => {
                    self.on_channel_event(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.on_events_closed(),
            }
        }
    }

    /// Apply the outcome of source acquisition.
    ///
    /// A denial sets CAMERA BLOCKED and leaves the sampler without a source
    /// for the rest of the session.
    pub async fn on_acquired(&mut self, result: SessionResult<Box<dyn FrameSource>>) {
        match result {
            Ok(mut source) => {
                if self.torn_down {
                    source.shutdown().await;
                    return;
                }
                let size = source.native_size();
                info!("live source bound ({}x{})", size.w, size.h);
                self.sampler.bind(source);
            }
            Err(e) => {
                warn!("{}", e);
                self.reconciler
                    .set_sentinel(e.sentinel().unwrap_or(Sentinel::CameraBlocked));
                self.publish();
            }
        }
    }

    /// Run one sampling cycle.
    pub async fn on_tick(&mut self) -> TickOutcome {
        let outcome = self.sampler.tick(&mut self.channel).await;
        match &outcome {
            TickOutcome::Sent { bytes } => {
                debug!("frame sent ({} bytes)", bytes);
                self.publish();
            }
            TickOutcome::Skipped(reason) => {
                self.ticks_skipped += 1;
                debug!("tick skipped: {:?}", reason);
            }
            TickOutcome::Failed(e) => {
                self.tick_failures += 1;
                warn!("tick failed: {}", e);
            }
            TickOutcome::SendFailed(e) => {
                self.tick_failures += 1;
                warn!("send failed: {}", e);
                // The link usually reports its own end before refusing frames.
                self.drain_events();
                if !self.channel.state().is_terminal() {
                    let event = match e {
                        SessionError::ConnectionClosed { code, reason, .. } => ChannelEvent::Closed {
                            code: *code,
                            reason: reason.clone(),
                        },
                        other => ChannelEvent::Failed(other.to_string()),
                    };
                    self.on_channel_event(event);
                }
            }
        }
        outcome
    }

    /// Halt the sampler and close the connection as one step. Idempotent.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.sampler.halt().await;
        self.channel.close(&mut self.reconciler).await;
        self.publish();
        info!("session torn down, final status {}", self.reconciler.current_status());
    }

    /// Synchronous teardown: drops the source and aborts the link without a
    /// close handshake. Does nothing after [`Session::teardown`].
    pub fn abort(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.sampler.abandon();
        self.channel.abort(&mut self.reconciler);
        self.publish();
        warn!("session aborted, final status {}", self.reconciler.current_status());
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            frames_sent: self.channel.frames_sent(),
            ticks_skipped: self.ticks_skipped,
            tick_failures: self.tick_failures,
            decode_failures: self.reconciler.decode_failures(),
            final_status: self.reconciler.current_status().clone(),
            connection: self.channel.state(),
            timeline_len: self.reconciler.timeline_len(),
        }
    }

    fn publish(&self) {
        let snapshot = StatusSnapshot {
            current: self.reconciler.current_status().clone(),
            connection: self.channel.state(),
            timeline: self.reconciler.timeline(),
            frames_sent: self.channel.frames_sent(),
        };
        self.board_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Tears the session down if [`Session::run`] is dropped mid-flight.
struct AbortOnDrop<'a> {
    session: &'a mut Session,
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        self.session.abort();
    }
}
