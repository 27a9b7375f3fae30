// SPDX-License-Identifier: MIT
// CPU canvas drawing built on fast_image_resize (SIMD-accelerated).
// BGRA8 source of any size → BGRA8 canvas of a fixed size, buffer reused per frame.

use fast_image_resize as fir;
use fir::images::{TypedCroppedImageMut, TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::plan::{FitMode, Size, plan_canvas};

#[derive(Debug)]
pub enum ScaleError {
    EmptyCanvas,
    EmptySource,
    BadStride { stride: usize, row_bytes: usize },
    SourceTooSmall { expected: usize, actual: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
    Crop(fir::CropBoxError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }
impl From<fir::CropBoxError> for ScaleError { fn from(e: fir::CropBoxError) -> Self { Self::Crop(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::EmptyCanvas => write!(f, "Canvas has a zero dimension"),
            ScaleError::EmptySource => write!(f, "Source frame has a zero dimension"),
            ScaleError::BadStride { stride, row_bytes } => {
                write!(f, "Row stride {} is shorter than a packed row of {} bytes", stride, row_bytes)
            }
            ScaleError::SourceTooSmall { expected, actual } => {
                write!(f, "Source buffer too small: need {} bytes, got {}", expected, actual)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
            ScaleError::Crop(e) => write!(f, "Crop error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            ScaleError::Crop(e) => Some(e),
            _ => None,
        }
    }
}

/// Fixed-size BGRA drawing surface.
///
/// Owns the resizer, the canvas pixels and a staging buffer used to compact
/// strided sources. Nothing is reallocated between frames once the largest
/// source has been seen.
pub struct CanvasScaler {
    resizer: Resizer,
    canvas: Size,
    fit: FitMode,
    background: [u8; 4],
    pixels: Vec<u8>,
    staging: Vec<u8>,
}

impl CanvasScaler {
    /// Allocate a canvas of `canvas` pixels. Fails on a zero dimension.
    pub fn new(canvas: Size, fit: FitMode) -> Result<Self, ScaleError> {
        if canvas.is_empty() {
            return Err(ScaleError::EmptyCanvas);
        }
        Ok(Self {
            resizer: Resizer::new(),
            canvas,
            fit,
            background: [0, 0, 0, 255],
            pixels: vec![0u8; canvas.bgra_len()],
            staging: Vec::new(),
        })
    }

    /// Background used for letterbox bands, in BGRA order.
    pub fn with_background(mut self, bgra: [u8; 4]) -> Self {
        self.background = bgra;
        self
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn fit(&self) -> FitMode {
        self.fit
    }

    /// Last drawn canvas content (BGRA, tightly packed).
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Draw `src` onto the canvas and return the canvas pixels.
    ///
    /// `stride` is bytes per source row; `None` means tightly packed.
    pub fn draw(&mut self, src: &[u8], src_size: Size, stride: Option<usize>) -> Result<&[u8], ScaleError> {
        if src_size.is_empty() {
            return Err(ScaleError::EmptySource);
        }

        let row_bytes = (src_size.w as usize) * 4;
        let rows = src_size.h as usize;
        let pitch = stride.unwrap_or(row_bytes);
        if pitch < row_bytes {
            return Err(ScaleError::BadStride { stride: pitch, row_bytes });
        }
        let expected = pitch * (rows - 1) + row_bytes;
        if src.len() < expected {
            return Err(ScaleError::SourceTooSmall { expected, actual: src.len() });
        }

        let packed: &[u8] = if pitch == row_bytes {
            &src[..row_bytes * rows]
        } else {
            self.staging.resize(row_bytes * rows, 0);
            compact_rows(src, pitch, &mut self.staging, row_bytes, rows);
            &self.staging
        };
        let src_view = TypedImageRef::<U8x4>::from_buffer(src_size.w, src_size.h, packed)?;

        let plan = plan_canvas(src_size, self.canvas, self.fit);
        if plan.needs_background() {
            fill_bgra(&mut self.pixels, self.background);
        }

        let opts = ResizeOptions::new().use_alpha(false);
        {
            let mut dst = TypedImage::<U8x4>::from_buffer(self.canvas.w, self.canvas.h, self.pixels.as_mut_slice())?;
            match plan.dst_roi {
                Some((x, y, w, h)) => {
                    let mut roi = TypedCroppedImageMut::from_ref(&mut dst, x, y, w, h)?;
                    self.resizer.resize_typed::<U8x4>(&src_view, &mut roi, &opts)?;
                }
                None => self.resizer.resize_typed::<U8x4>(&src_view, &mut dst, &opts)?,
            }
        }

        Ok(&self.pixels)
    }
}

#[inline]
fn fill_bgra(dst: &mut [u8], bg: [u8; 4]) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        dst[r * row_bytes..(r + 1) * row_bytes].copy_from_slice(s);
    }
}
