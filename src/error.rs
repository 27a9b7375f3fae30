//! # Session Error Handling
//!
//! Error taxonomy for the snapshot relay client. Every failure the session can
//! meet is a [`SessionError`] variant carrying an [`ErrorContext`] (when it
//! happened, what was going on, how severe it is).
//!
//! ## Classification
//!
//! Errors fall into two groups:
//!
//! - **Terminal**: device denial, connection failure and connection close.
//!   These end the current connection (or, for the camera, the session's
//!   ability to sample) and are surfaced only as a sentinel status via
//!   [`SessionError::sentinel`]. Nothing is retried.
//! - **Local**: decode, encode and drawing-surface failures. These affect a
//!   single inbound message or a single sampler tick and leave state intact.
//!
//! ## Usage
//!
//! ```rust
//! use smartsession_client::error::{SessionError, HasSeverity};
//! use smartsession_client::status::Sentinel;
//!
//! let error = SessionError::acquisition("camera", "permission denied")
//!     .with_context("opening /dev/video0");
//! assert_eq!(error.sentinel(), Some(Sentinel::CameraBlocked));
//! assert!(error.is_terminal());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use crate::status::Sentinel;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Affects one message or one tick
    Warning,
    /// Affects the current connection or source
    Error,
    /// Ends the session's ability to do useful work
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Additional context about the error
    pub context: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
}

impl ErrorContext {
    fn with_severity(severity: ErrorSeverity) -> Self {
        Self {
            timestamp: SystemTime::now(),
            context: None,
            severity,
        }
    }
}

/// Base error type for the snapshot relay client
#[derive(Debug)]
pub enum SessionError {
    /// The live source could not be acquired (device denied or missing)
    Acquisition {
        source_kind: String,
        reason: String,
        context: ErrorContext,
    },
    /// Network or protocol failure on the duplex channel
    Connection {
        endpoint: Option<String>,
        reason: String,
        context: ErrorContext,
    },
    /// The duplex channel was closed
    ConnectionClosed {
        code: Option<u16>,
        reason: String,
        context: ErrorContext,
    },
    /// Inbound payload could not be decoded into a status message
    Decode {
        preview: String,
        source: serde_json::Error,
        context: ErrorContext,
    },
    /// A frame could not be encoded
    Encode {
        stage: String,
        reason: String,
        context: ErrorContext,
    },
    /// The drawing surface rejected a frame
    Surface {
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl SessionError {
    /// Create a source acquisition error
    pub fn acquisition(source_kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Acquisition {
            source_kind: source_kind.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a connection error
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: None,
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Error),
        }
    }

    /// Create a connection-closed error
    pub fn connection_closed(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            code,
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Error),
        }
    }

    /// Create a decode error for an inbound payload
    pub fn decode(payload: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            preview: preview(payload),
            source,
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a frame encoding error
    pub fn encode(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            stage: stage.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a drawing surface error
    pub fn surface(reason: impl Into<String>) -> Self {
        Self::Surface {
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
            context: ErrorContext::with_severity(ErrorSeverity::Error),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::with_severity(ErrorSeverity::Error),
        }
    }

    /// Attach the endpoint a connection error refers to
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        if let Self::Connection { endpoint, .. } = &mut self {
            *endpoint = Some(url.into());
        }
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Acquisition { context, .. }
            | Self::Connection { context, .. }
            | Self::ConnectionClosed { context, .. }
            | Self::Decode { context, .. }
            | Self::Encode { context, .. }
            | Self::Surface { context, .. }
            | Self::Config { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Acquisition { context, .. }
            | Self::Connection { context, .. }
            | Self::ConnectionClosed { context, .. }
            | Self::Decode { context, .. }
            | Self::Encode { context, .. }
            | Self::Surface { context, .. }
            | Self::Config { context, .. }
            | Self::Io { context, .. }
            | Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Acquisition { .. } => "acquisition",
            Self::Connection { .. } => "connection",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Surface { .. } => "surface",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }

    /// Sentinel status this error surfaces as, if any.
    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Self::Acquisition { .. } => Some(Sentinel::CameraBlocked),
            Self::Connection { .. } => Some(Sentinel::BackendError),
            Self::ConnectionClosed { .. } => Some(Sentinel::Disconnected),
            _ => None,
        }
    }

    /// Terminal for the current connection instance or source; never retried.
    pub fn is_terminal(&self) -> bool {
        self.sentinel().is_some()
    }
}

fn preview(payload: &str) -> String {
    const MAX: usize = 64;
    match payload.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &payload[..idx]),
        None => payload.to_string(),
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Acquisition {
                source_kind,
                reason,
                ..
            } => write!(f, "Failed to acquire {} source: {}", source_kind, reason),
            SessionError::Connection {
                endpoint, reason, ..
            } => {
                if let Some(endpoint) = endpoint {
                    write!(f, "Connection to {} failed: {}", endpoint, reason)
                } else {
                    write!(f, "Connection failed: {}", reason)
                }
            }
            SessionError::ConnectionClosed { code, reason, .. } => {
                if let Some(code) = code {
                    write!(f, "Connection closed (code {}): {}", code, reason)
                } else {
                    write!(f, "Connection closed: {}", reason)
                }
            }
            SessionError::Decode {
                preview, source, ..
            } => write!(f, "Malformed status message {:?}: {}", preview, source),
            SessionError::Encode { stage, reason, .. } => {
                write!(f, "Frame encoding failed during {}: {}", stage, reason)
            }
            SessionError::Surface { reason, .. } => {
                write!(f, "Drawing surface error: {}", reason)
            }
            SessionError::Config {
                field,
                value,
                reason,
                ..
            } => write!(
                f,
                "Configuration error in '{}': {} (value: {})",
                field, reason, value
            ),
            SessionError::Io {
                operation, source, ..
            } => write!(f, "I/O error during {}: {}", operation, source),
            SessionError::External {
                library, source, ..
            } => write!(f, "External library error in {}: {}", library, source),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type SessionResult<T> = Result<T, SessionError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for SessionError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

impl From<snap_scale::ScaleError> for SessionError {
    fn from(error: snap_scale::ScaleError) -> Self {
        Self::surface(error.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(error: reqwest::Error) -> Self {
        Self::external("reqwest", error)
    }
}
