//! # SmartSession Client
//!
//! Realtime snapshot relay: samples a live camera on a fixed timer, ships each
//! frame as a small JPEG over a WebSocket to an analysis service, and folds the
//! service's status replies into a current-status cell plus a deduplicated
//! timeline.
//!
//! ## Architecture
//!
//! The library is organized into these modules:
//! - `source`: live frame acquisition (pattern, still image, camera)
//! - `sampler`: fixed-canvas drawing, JPEG encoding, gated sending
//! - `channel`: connection state machine and the WebSocket link
//! - `reconciler`: level-triggered status plus edge-triggered timeline
//! - `session`: single-task orchestration, teardown and the read-only board
//! - `config`: configuration management and validation
//! - `health`: HTTP banner probe of the analysis service
//!
//! ## Example
//!
//! ```rust,no_run
//! use smartsession_client::{ClientConfig, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::builder()
//!     .with_config(ClientConfig::default())
//!     .build()?;
//!
//! let board = session.board();
//! let handle = session.handle();
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     handle.stop();
//! });
//!
//! let report = session.run().await;
//! println!("{} frames, final status {}", report.frames_sent, board.current_status());
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod reconciler;
pub mod sampler;
pub mod session;
pub mod source;
pub mod status;

pub use channel::{ChannelEvent, ChannelLink, ChannelManager, ConnectionState, Connector, OutboundFrame};
pub use config::{ClientConfig, SourceKind, WireEncoding};
pub use error::{HasSeverity, SessionError, SessionResult};
pub use frame::BgraFrame;
pub use reconciler::{Reconciled, StatusMessage, StatusReconciler};
pub use session::{Session, SessionBuilder, SessionHandle, SessionReport, StatusBoard, StatusSnapshot};
pub use source::{FrameSource, SourceAcquirer};
pub use status::{Clock, CurrentStatus, FixedClock, LocalClock, Sentinel, StatusValue, TimelineEntry};

pub use snap_scale::{FitMode, Size};
