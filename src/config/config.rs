//! # Client Configuration
//!
//! Configuration structures and validation for a snapshot relay session. The
//! same struct is filled from CLI flags, from a JSON file, or from defaults.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `endpoint` | `String` | `ws://127.0.0.1:8000/ws/student` | Analysis service WebSocket URL |
//! | `sample_interval_ms` | `u64` | 500 | Sampling period |
//! | `canvas_width` | `u32` | 320 | Drawing surface width |
//! | `canvas_height` | `u32` | 240 | Drawing surface height |
//! | `jpeg_quality` | `u8` | 92 | Lossy encoder quality, 1-100 |
//! | `wire_encoding` | `WireEncoding` | `base64_text` | Outbound frame representation |
//! | `fit` | `FitMode` | `stretch` | Placement of the source on the canvas |
//! | `source` | `SourceKind` | `pattern` | Where frames come from |
//! | `image_path` | `Option<PathBuf>` | none | Image file for the `still` source |
//! | `device` | `Option<String>` | none | Camera device for the `camera` source |
//! | `exit_on_disconnect` | `bool` | false | Stop once the connection is terminal |
//!
//! ## Examples
//!
//! ```rust
//! use smartsession_client::config::ClientConfig;
//!
//! let config = ClientConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.sample_interval_ms, 500);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snap_scale::{FitMode, Size};

use crate::error::{SessionError, SessionResult};

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws/student";

/// How an encoded frame is put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WireEncoding {
    /// Text frame holding the standard base64 of the JPEG bytes.
    #[default]
    Base64Text,
    /// Binary frame holding the raw JPEG bytes.
    Binary,
}

/// Which backend provides live frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic moving gradient; needs no device.
    #[default]
    Pattern,
    /// A still image file, served as every frame.
    Still,
    /// A live camera through GStreamer (`camera` feature).
    Camera,
}

/// Configuration for one snapshot relay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the analysis service.
    pub endpoint: String,

    /// Period between capture-and-send attempts, in milliseconds.
    pub sample_interval_ms: u64,

    /// Width of the fixed drawing surface.
    pub canvas_width: u32,

    /// Height of the fixed drawing surface.
    pub canvas_height: u32,

    /// JPEG quality, 1 (smallest) to 100 (best).
    pub jpeg_quality: u8,

    pub wire_encoding: WireEncoding,

    pub fit: FitMode,

    pub source: SourceKind,

    pub image_path: Option<PathBuf>,

    /// Camera device path, e.g. `/dev/video0`. `None` lets GStreamer pick.
    pub device: Option<String>,

    /// Stop the session once the connection closes or errors.
    /// The core never reconnects; this only decides whether to keep idling.
    pub exit_on_disconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sample_interval_ms: 500,
            canvas_width: 320,
            canvas_height: 240,
            jpeg_quality: 92,
            wire_encoding: WireEncoding::default(),
            fit: FitMode::default(),
            source: SourceKind::default(),
            image_path: None,
            device: None,
            exit_on_disconnect: false,
        }
    }
}

impl ClientConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SessionError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&raw).map_err(|e| {
            SessionError::config("config file", path.display().to_string(), e.to_string())
        })
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> SessionResult<()> {
        let scheme_ok = self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://");
        if !scheme_ok {
            return Err(SessionError::config(
                "endpoint",
                &self.endpoint,
                "must be a ws:// or wss:// URL",
            ));
        }
        if self.sample_interval_ms == 0 {
            return Err(SessionError::config(
                "sample_interval_ms",
                "0",
                "must be greater than 0",
            ));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(SessionError::config(
                "canvas",
                format!("{}x{}", self.canvas_width, self.canvas_height),
                "both dimensions must be greater than 0",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SessionError::config(
                "jpeg_quality",
                self.jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if self.source == SourceKind::Still && self.image_path.is_none() {
            return Err(SessionError::config(
                "image_path",
                "",
                "required for the still source",
            ));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn canvas_size(&self) -> Size {
        Size::new(self.canvas_width, self.canvas_height)
    }
}
