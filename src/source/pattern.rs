//! Synthetic source: a horizontal/vertical gradient whose blue channel drifts
//! one step per frame, so consecutive frames differ.

use async_trait::async_trait;
use snap_scale::Size;

use super::{FrameSource, SourceAcquirer};
use crate::error::{SessionError, SessionResult};
use crate::frame::BgraFrame;

pub struct PatternAcquirer {
    size: Size,
}

impl PatternAcquirer {
    pub fn new(size: Size) -> Self {
        Self { size }
    }
}

#[async_trait]
impl SourceAcquirer for PatternAcquirer {
    async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>> {
        if self.size.is_empty() {
            return Err(SessionError::acquisition(
                "pattern",
                format!("cannot generate {}x{} frames", self.size.w, self.size.h),
            ));
        }
        Ok(Box::new(PatternSource::new(self.size)))
    }
}

#[derive(Debug)]
pub struct PatternSource {
    size: Size,
    frame_index: u64,
}

impl PatternSource {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            frame_index: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let Size { w: width, h: height } = self.size;
        let mut data = vec![0u8; self.size.bgra_len()];
        let blue = (self.frame_index % 256) as u8;

        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                data[idx] = blue;
                data[idx + 1] = (y * 255 / height) as u8;
                data[idx + 2] = (x * 255 / width) as u8;
                data[idx + 3] = 255;
            }
        }
        data
    }
}

#[async_trait]
impl FrameSource for PatternSource {
    fn native_size(&self) -> Size {
        self.size
    }

    async fn grab_frame(&mut self) -> SessionResult<BgraFrame> {
        let data = self.render();
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(BgraFrame::packed(data, self.size.w, self.size.h))
    }

    async fn shutdown(&mut self) {}
}
