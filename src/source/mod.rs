//! # Source Acquirer
//!
//! Obtains a live frame source once per session. Acquisition is asynchronous
//! and either yields a [`FrameSource`] or fails with
//! [`SessionError::Acquisition`], which the session surfaces as the
//! CAMERA BLOCKED sentinel. A failed acquisition is never retried.
//!
//! Backends:
//! - [`PatternAcquirer`]: synthetic moving gradient, needs no device.
//! - [`StillAcquirer`]: one image file served as every frame.
//! - [`CameraAcquirer`]: a V4L2 camera through GStreamer (`camera` feature, Linux).

use async_trait::async_trait;
use snap_scale::Size;

use crate::config::{ClientConfig, SourceKind};
use crate::error::{SessionError, SessionResult};
use crate::frame::BgraFrame;

pub mod pattern;
pub mod still;

#[cfg(all(feature = "camera", target_os = "linux"))]
pub mod camera;

pub use pattern::{PatternAcquirer, PatternSource};
pub use still::{StillAcquirer, StillSource};

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use camera::{CameraAcquirer, CameraSource};

/// A live source that can be sampled repeatedly.
#[async_trait]
pub trait FrameSource: Send {
    /// Native frame size, before drawing onto the canvas.
    fn native_size(&self) -> Size;

    /// Latest available frame.
    async fn grab_frame(&mut self) -> SessionResult<BgraFrame>;

    /// Release the underlying device. Safe to call more than once.
    async fn shutdown(&mut self);
}

/// Requests a [`FrameSource`]. Called at most once per session.
#[async_trait]
pub trait SourceAcquirer: Send {
    async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>>;
}

/// Build the acquirer selected by the configuration.
pub fn acquirer_for(config: &ClientConfig) -> SessionResult<Box<dyn SourceAcquirer>> {
    match config.source {
        SourceKind::Pattern => Ok(Box::new(PatternAcquirer::new(Size::new(640, 480)))),
        SourceKind::Still => {
            let path = config.image_path.clone().ok_or_else(|| {
                SessionError::config("image_path", "", "required for the still source")
            })?;
            Ok(Box::new(StillAcquirer::new(path)))
        }
        SourceKind::Camera => camera_acquirer(config),
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn camera_acquirer(config: &ClientConfig) -> SessionResult<Box<dyn SourceAcquirer>> {
    Ok(Box::new(CameraAcquirer::new(config.device.clone())))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn camera_acquirer(_config: &ClientConfig) -> SessionResult<Box<dyn SourceAcquirer>> {
    Ok(Box::new(UnavailableAcquirer))
}

/// Stands in for the camera when this build has no camera backend.
/// Acquisition always fails, so the session reports CAMERA BLOCKED.
#[cfg(not(all(feature = "camera", target_os = "linux")))]
struct UnavailableAcquirer;

#[cfg(not(all(feature = "camera", target_os = "linux")))]
#[async_trait]
impl SourceAcquirer for UnavailableAcquirer {
    async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>> {
        Err(SessionError::acquisition(
            "camera",
            "built without the `camera` feature",
        ))
    }
}
