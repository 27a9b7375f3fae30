//! Still-image source. The file is decoded once at acquisition and the same
//! buffer is served on every grab.

use std::path::PathBuf;

use async_trait::async_trait;
use log::info;
use snap_scale::Size;

use super::{FrameSource, SourceAcquirer};
use crate::error::{SessionError, SessionResult};
use crate::frame::BgraFrame;

pub struct StillAcquirer {
    path: PathBuf,
}

impl StillAcquirer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceAcquirer for StillAcquirer {
    async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>> {
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || load_bgra(&path))
            .await
            .map_err(|e| SessionError::acquisition("still", e.to_string()))??;
        info!(
            "loaded still image {} ({}x{})",
            self.path.display(),
            frame.width,
            frame.height
        );
        Ok(Box::new(StillSource { frame }))
    }
}

fn load_bgra(path: &std::path::Path) -> SessionResult<BgraFrame> {
    let image = image::open(path)
        .map_err(|e| SessionError::acquisition("still", format!("{}: {}", path.display(), e)))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    Ok(BgraFrame::packed(data, width, height))
}

pub struct StillSource {
    frame: BgraFrame,
}

#[async_trait]
impl FrameSource for StillSource {
    fn native_size(&self) -> Size {
        self.frame.size()
    }

    async fn grab_frame(&mut self) -> SessionResult<BgraFrame> {
        Ok(self.frame.clone())
    }

    async fn shutdown(&mut self) {}
}
