//! Common test utilities and helpers for the session client tests
//!
//! Mocks for the three seams a session talks through: the connection link,
//! the connector that opens it, and the live source.

#![allow(dead_code)]

/// In-memory connection that records everything the session does to it
pub mod mock_link {
    use async_trait::async_trait;
    use smartsession_client::{
        ChannelEvent, ChannelLink, Connector, OutboundFrame, SessionError, SessionResult,
    };
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// How a [`MockLink`] refuses frames once told to.
    #[derive(Clone, Copy, Debug)]
    pub enum Refusal {
        /// The socket task is gone, as after a graceful close.
        Closed,
        /// The transport broke.
        Broken,
    }

    /// Shared view of a [`MockLink`], kept by the test after the link moves
    /// into the session.
    #[derive(Clone, Default)]
    pub struct LinkTap {
        sent: Arc<Mutex<Vec<OutboundFrame>>>,
        closes: Arc<Mutex<usize>>,
        aborts: Arc<Mutex<usize>>,
        refusal: Arc<Mutex<Option<Refusal>>>,
        events: Arc<Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>,
    }

    impl LinkTap {
        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn sent(&self) -> Vec<OutboundFrame> {
            self.sent.lock().unwrap().clone()
        }

        pub fn close_count(&self) -> usize {
            *self.closes.lock().unwrap()
        }

        pub fn abort_count(&self) -> usize {
            *self.aborts.lock().unwrap()
        }

        /// Make every later `send` fail.
        pub fn refuse_sends(&self, refusal: Refusal) {
            *self.refusal.lock().unwrap() = Some(refusal);
        }

        /// Drop the event sender without a terminal event.
        pub fn hang_up(&self) {
            self.events.lock().unwrap().take();
        }

        /// Deliver an event as if the remote side produced it.
        pub fn emit(&self, event: ChannelEvent) {
            let guard = self.events.lock().unwrap();
            let tx = guard.as_ref().expect("connector has not been opened");
            tx.send(event).expect("session dropped its event receiver");
        }

        pub fn open(&self) {
            self.emit(ChannelEvent::Opened);
        }

        pub fn status(&self, status: &str) {
            self.emit(ChannelEvent::Message(format!(r#"{{"status":"{status}"}}"#)));
        }

        pub fn fail(&self, reason: &str) {
            self.emit(ChannelEvent::Failed(reason.to_string()));
        }
    }

    pub struct MockLink {
        tap: LinkTap,
    }

    #[async_trait]
    impl ChannelLink for MockLink {
        fn send(&mut self, frame: OutboundFrame) -> SessionResult<()> {
            match *self.tap.refusal.lock().unwrap() {
                Some(Refusal::Closed) => {
                    return Err(SessionError::connection_closed(None, "socket task has exited"));
                }
                Some(Refusal::Broken) => return Err(SessionError::connection("broken pipe")),
                None => {}
            }
            self.tap.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn close(&mut self) {
            *self.tap.closes.lock().unwrap() += 1;
        }

        fn abort(&mut self) {
            *self.tap.aborts.lock().unwrap() += 1;
        }
    }

    /// Connector handing out a single [`MockLink`].
    #[derive(Clone, Default)]
    pub struct MockConnector {
        tap: LinkTap,
    }

    impl MockConnector {
        pub fn new() -> (Self, LinkTap) {
            let tap = LinkTap::default();
            (
                Self {
                    tap: tap.clone(),
                },
                tap,
            )
        }
    }

    impl Connector for MockConnector {
        fn open(&self, _endpoint: &str) -> (Box<dyn ChannelLink>, mpsc::UnboundedReceiver<ChannelEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.tap.events.lock().unwrap() = Some(tx);
            (
                Box::new(MockLink {
                    tap: self.tap.clone(),
                }),
                rx,
            )
        }
    }
}

/// Mock live sources and acquirers
pub mod mock_source {
    use async_trait::async_trait;
    use smartsession_client::{
        BgraFrame, FrameSource, SessionError, SessionResult, Size, SourceAcquirer,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub const VGA: Size = Size { w: 640, h: 480 };

    /// Solid mid-grey source counting its grabs
    pub struct MockSource {
        size: Size,
        grabs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for MockSource {
        fn native_size(&self) -> Size {
            self.size
        }

        async fn grab_frame(&mut self) -> SessionResult<BgraFrame> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(BgraFrame::packed(
                vec![128u8; self.size.bgra_len()],
                self.size.w,
                self.size.h,
            ))
        }

        async fn shutdown(&mut self) {}
    }

    pub fn source(size: Size) -> (Box<dyn FrameSource>, Arc<AtomicUsize>) {
        let grabs = Arc::new(AtomicUsize::new(0));
        (
            Box::new(MockSource {
                size,
                grabs: grabs.clone(),
            }),
            grabs,
        )
    }

    /// Acquirer that grants or denies access after `delay`, like a user
    /// answering a permission prompt.
    pub struct MockAcquirer {
        grant: bool,
        delay: Duration,
        pub grabs: Arc<AtomicUsize>,
    }

    impl MockAcquirer {
        pub fn granting() -> Self {
            Self {
                grant: true,
                delay: Duration::ZERO,
                grabs: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn denying() -> Self {
            Self {
                grant: false,
                ..Self::granting()
            }
        }

        pub fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn grab_counter(&self) -> Arc<AtomicUsize> {
            self.grabs.clone()
        }
    }

    #[async_trait]
    impl SourceAcquirer for MockAcquirer {
        async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if !self.grant {
                return Err(SessionError::acquisition("camera", "permission denied"));
            }
            Ok(Box::new(MockSource {
                size: VGA,
                grabs: self.grabs.clone(),
            }))
        }
    }
}

/// Session construction shortcuts
pub mod harness {
    use super::mock_link::{LinkTap, MockConnector};
    use super::mock_source::MockAcquirer;
    use smartsession_client::{ClientConfig, FixedClock, Session, SessionReport};
    use tokio::task::JoinHandle;

    pub const CLOCK: &str = "09:30:00";

    pub fn session(acquirer: MockAcquirer) -> (Session, LinkTap) {
        session_with(ClientConfig::default(), acquirer)
    }

    pub fn session_with(config: ClientConfig, acquirer: MockAcquirer) -> (Session, LinkTap) {
        let (connector, tap) = MockConnector::new();
        let session = Session::builder()
            .with_config(config)
            .with_source_acquirer(acquirer)
            .with_connector(connector)
            .with_clock(FixedClock(CLOCK.to_string()))
            .build()
            .expect("default config is valid");
        (session, tap)
    }

    /// Run a session on its own task, handing it back when it ends.
    pub fn spawn(mut session: Session) -> JoinHandle<(Session, SessionReport)> {
        tokio::spawn(async move {
            let report = session.run().await;
            (session, report)
        })
    }

    /// Let the session task process whatever is queued without moving time.
    pub async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
