//! # Frame Sampler
//!
//! One capture-and-send cycle per tick. A tick is skipped, never failed, when
//! any precondition is missing:
//!
//! 1. the sampler has not been halted by teardown,
//! 2. a live source is bound,
//! 3. the drawing surface exists,
//! 4. the channel is OPEN.
//!
//! Otherwise the newest frame is drawn onto the fixed canvas, JPEG-encoded and
//! handed to [`ChannelManager::send`]. Draw and encode failures cost only the
//! current tick.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use log::{debug, warn};
use snap_scale::{CanvasScaler, FitMode, Size};

use crate::channel::{ChannelManager, OutboundFrame};
use crate::config::{ClientConfig, WireEncoding};
use crate::error::{SessionError, SessionResult};
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Halted,
    NoSource,
    NoSurface,
    ChannelNotOpen,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// A frame of `bytes` encoded bytes went to the channel.
    Sent { bytes: usize },
    Skipped(SkipReason),
    /// Grabbing, drawing or encoding failed; the next tick tries again.
    Failed(SessionError),
    /// The link refused the frame.
    SendFailed(SessionError),
}

/// JPEG encoder for BGRA canvases.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    quality: u8,
    wire: WireEncoding,
    rgb: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(quality: u8, wire: WireEncoding) -> Self {
        Self {
            quality,
            wire,
            rgb: Vec::new(),
        }
    }

    /// Encode a packed BGRA canvas into a wire-ready frame.
    ///
    /// The encoder emits bare JPEG bytes, so there is never a header prefix
    /// to strip before base64.
    pub fn encode(&mut self, bgra: &[u8], size: Size) -> SessionResult<OutboundFrame> {
        if bgra.len() != size.bgra_len() {
            return Err(SessionError::encode(
                "pack",
                format!("canvas holds {} bytes, expected {}", bgra.len(), size.bgra_len()),
            ));
        }

        self.rgb.clear();
        self.rgb.reserve(size.w as usize * size.h as usize * 3);
        for px in bgra.chunks_exact(4) {
            self.rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(&self.rgb, size.w, size.h, ExtendedColorType::Rgb8)
            .map_err(|e| SessionError::encode("jpeg", e.to_string()))?;

        Ok(match self.wire {
            WireEncoding::Base64Text => OutboundFrame::Text(STANDARD.encode(&jpeg)),
            WireEncoding::Binary => OutboundFrame::Binary(jpeg),
        })
    }
}

pub struct FrameSampler {
    source: Option<Box<dyn FrameSource>>,
    surface: Option<CanvasScaler>,
    encoder: FrameEncoder,
    halted: bool,
}

impl FrameSampler {
    pub fn new(canvas: Size, fit: FitMode, encoder: FrameEncoder) -> Self {
        let surface = match CanvasScaler::new(canvas, fit) {
            Ok(scaler) => Some(scaler),
            Err(e) => {
                warn!("drawing surface unavailable: {}", e);
                None
            }
        };
        Self {
            source: None,
            surface,
            encoder,
            halted: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.canvas_size(),
            config.fit,
            FrameEncoder::new(config.jpeg_quality, config.wire_encoding),
        )
    }

    /// Bind the live source. Ignored after [`FrameSampler::halt`].
    pub fn bind(&mut self, source: Box<dyn FrameSource>) {
        if self.halted {
            debug!("source arrived after halt, dropping it");
            return;
        }
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Stop sampling for good and release the source. Idempotent.
    pub async fn halt(&mut self) {
        self.halted = true;
        if let Some(mut source) = self.source.take() {
            source.shutdown().await;
        }
    }

    /// Halt without awaiting the source's shutdown; dropping it releases it.
    pub fn abandon(&mut self) {
        self.halted = true;
        self.source = None;
    }

    pub async fn tick(&mut self, channel: &mut ChannelManager) -> TickOutcome {
        if self.halted {
            return TickOutcome::Skipped(SkipReason::Halted);
        }
        let Some(source) = self.source.as_mut() else {
            return TickOutcome::Skipped(SkipReason::NoSource);
        };
        let Some(surface) = self.surface.as_mut() else {
            return TickOutcome::Skipped(SkipReason::NoSurface);
        };
        if !channel.is_writable() {
            return TickOutcome::Skipped(SkipReason::ChannelNotOpen);
        }

        let frame = match source.grab_frame().await {
            Ok(frame) => frame,
            Err(e) => return TickOutcome::Failed(e),
        };
        if let Err(e) = frame.validate() {
            return TickOutcome::Failed(e);
        }

        let canvas = surface.canvas();
        let pixels = match surface.draw(&frame.data, frame.size(), Some(frame.stride)) {
            Ok(pixels) => pixels,
            Err(e) => return TickOutcome::Failed(e.into()),
        };
        let outbound = match self.encoder.encode(pixels, canvas) {
            Ok(outbound) => outbound,
            Err(e) => return TickOutcome::Failed(e),
        };

        let bytes = outbound.len();
        match channel.send(outbound) {
            Ok(true) => TickOutcome::Sent { bytes },
            Ok(false) => TickOutcome::Skipped(SkipReason::ChannelNotOpen),
            Err(e) => TickOutcome::SendFailed(e),
        }
    }
}
