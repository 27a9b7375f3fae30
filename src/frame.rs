//! Raw frame container shared by sources and the sampler.

use std::sync::Arc;

use snap_scale::Size;

use crate::error::{SessionError, SessionResult};

/// A raw BGRA frame as produced by a [`crate::source::FrameSource`].
///
/// `data` is `Arc`-wrapped so a source can hand out the same buffer repeatedly
/// without copying it.
#[derive(Clone, Debug)]
pub struct BgraFrame {
    /// Raw BGRA pixel data. Length must be at least `stride * (height - 1) + width * 4`.
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
}

impl BgraFrame {
    /// Wrap a tightly packed BGRA buffer.
    pub fn packed(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            stride: width as usize * 4,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Check that the buffer is large enough for the declared geometry.
    pub fn validate(&self) -> SessionResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SessionError::surface(format!(
                "frame has zero dimension {}x{}",
                self.width, self.height
            )));
        }
        let row = self.width as usize * 4;
        if self.stride < row {
            return Err(SessionError::surface(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row
            )));
        }
        let needed = self.stride * (self.height as usize - 1) + row;
        if self.data.len() < needed {
            return Err(SessionError::surface(format!(
                "frame buffer holds {} bytes, needs {}",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }
}
