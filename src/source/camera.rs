//! Live camera source on a GStreamer pipeline:
//!
//! ```text
//! v4l2src|autovideosrc → videoconvert → video/x-raw,format=BGRA → appsink
//! ```
//!
//! The appsink keeps only the newest buffer, so a grab always returns the most
//! recent frame and never queues stale ones.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use log::{debug, info, warn};
use snap_scale::Size;

use super::{FrameSource, SourceAcquirer};
use crate::error::{SessionError, SessionResult};
use crate::frame::BgraFrame;

const PREROLL_TIMEOUT: Duration = Duration::from_secs(5);
const PULL_TIMEOUT: Duration = Duration::from_millis(500);

pub struct CameraAcquirer {
    device: Option<String>,
}

impl CameraAcquirer {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

#[async_trait]
impl SourceAcquirer for CameraAcquirer {
    async fn acquire(&mut self) -> SessionResult<Box<dyn FrameSource>> {
        let device = self.device.clone();
        let opened = tokio::task::spawn_blocking(move || CameraSource::open(device.as_deref()))
            .await
            .map_err(|e| SessionError::acquisition("camera", e.to_string()))?;

        match opened {
            Ok(source) => Ok(Box::new(source)),
            Err(e) => Err(SessionError::acquisition("camera", format!("{:#}", e))),
        }
    }
}

pub struct CameraSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    size: Size,
    stopped: bool,
}

impl CameraSource {
    fn open(device: Option<&str>) -> Result<Self> {
        gst::init().context("initialising GStreamer")?;

        let src = match device {
            Some(device) => format!("v4l2src device={}", device),
            None => "autovideosrc".to_string(),
        };
        let description = format!(
            "{src} ! videoconvert ! video/x-raw,format=BGRA ! appsink name=sink max-buffers=1 drop=true sync=false"
        );
        debug!("camera pipeline: {}", description);

        let pipeline = gst::parse::launch(&description)
            .context("building camera pipeline")?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow!("camera pipeline is not a gst::Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| anyhow!("appsink missing from pipeline"))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| anyhow!("sink element is not an appsink"))?;

        pipeline
            .set_state(gst::State::Playing)
            .context("camera refused to start (permission denied or device busy)")?;

        let (result, _current, _pending) =
            pipeline.state(gst::ClockTime::from_mseconds(PREROLL_TIMEOUT.as_millis() as u64));
        if let Err(e) = result {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(anyhow!("camera did not reach PLAYING: {:?}", e));
        }

        let sample = match appsink.try_pull_preroll(gst::ClockTime::from_mseconds(
            PREROLL_TIMEOUT.as_millis() as u64,
        )) {
            Some(sample) => sample,
            None => {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(anyhow!("camera produced no frame"));
            }
        };
        let size = sample_size(&sample)?;
        info!("camera opened at {}x{}", size.w, size.h);

        Ok(Self {
            pipeline,
            appsink,
            size,
            stopped: false,
        })
    }
}

fn sample_size(sample: &gst::Sample) -> Result<Size> {
    let caps = sample.caps().ok_or_else(|| anyhow!("sample without caps"))?;
    let info = gst_video::VideoInfo::from_caps(caps).context("reading video caps")?;
    Ok(Size::new(info.width(), info.height()))
}

fn sample_to_frame(sample: &gst::Sample) -> Result<BgraFrame> {
    let caps = sample.caps().ok_or_else(|| anyhow!("sample without caps"))?;
    let info = gst_video::VideoInfo::from_caps(caps).context("reading video caps")?;
    let buffer = sample.buffer().ok_or_else(|| anyhow!("sample without buffer"))?;
    let map = buffer.map_readable().context("mapping camera buffer")?;

    let stride = info.stride()[0];
    if stride <= 0 {
        return Err(anyhow!("unsupported stride {}", stride));
    }

    Ok(BgraFrame {
        data: std::sync::Arc::new(map.as_slice().to_vec()),
        width: info.width(),
        height: info.height(),
        stride: stride as usize,
    })
}

#[async_trait]
impl FrameSource for CameraSource {
    fn native_size(&self) -> Size {
        self.size
    }

    async fn grab_frame(&mut self) -> SessionResult<BgraFrame> {
        if self.stopped {
            return Err(SessionError::surface("camera has been shut down"));
        }

        let appsink = self.appsink.clone();
        let pulled = tokio::task::spawn_blocking(move || {
            let sample = appsink
                .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT.as_millis() as u64))
                .ok_or_else(|| anyhow!("no camera frame within {:?}", PULL_TIMEOUT))?;
            sample_to_frame(&sample)
        })
        .await
        .map_err(|e| SessionError::surface(e.to_string()))?;

        pulled.map_err(|e| SessionError::surface(format!("{:#}", e)))
    }

    async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("failed to stop camera pipeline: {:?}", e);
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.pipeline.set_state(gst::State::Null);
        }
    }
}
