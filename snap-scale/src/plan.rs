// SPDX-License-Identifier: MIT
//! # Canvas Planning
//!
//! Decides where a source frame lands on the fixed snapshot canvas.
//!
//! Two placement strategies are supported:
//! - **Stretch**: the source covers the whole canvas, aspect ratio is not kept.
//!   This matches drawing a video element into a canvas with explicit
//!   width/height, and is the default.
//! - **Letterbox**: the source is fitted inside the canvas with its aspect ratio
//!   kept; the uncovered bands are filled with a background colour.
//!
//! Unlike token-reduction presets, planning here may upscale: the canvas size is
//! a wire contract, not an upper bound.

use serde::{Deserialize, Serialize};

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// True when either side is zero.
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Byte length of a tightly packed BGRA buffer of this size.
    pub fn bgra_len(&self) -> usize {
        (self.w as usize) * (self.h as usize) * 4
    }
}

/// How the source is placed on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Cover the full canvas, distorting the aspect ratio if needed.
    #[default]
    Stretch,
    /// Keep the aspect ratio and pad the remaining area.
    Letterbox,
}

/// Placement computed for one source size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasPlan {
    /// Source frame dimensions
    pub input: Size,
    /// Fixed canvas dimensions
    pub canvas: Size,
    /// Placement strategy used
    pub fit: FitMode,
    /// Sub-rectangle `(x, y, w, h)` that receives the scaled source.
    /// `None` means the whole canvas.
    pub dst_roi: Option<(u32, u32, u32, u32)>,
}

impl CanvasPlan {
    /// True when part of the canvas is not covered by the source.
    pub fn needs_background(&self) -> bool {
        self.dst_roi.is_some()
    }
}

/// Compute the placement of `input` on `canvas`.
pub fn plan_canvas(input: Size, canvas: Size, fit: FitMode) -> CanvasPlan {
    let dst_roi = match fit {
        FitMode::Stretch => None,
        FitMode::Letterbox => {
            let (rw, rh) = fit_within(input, canvas);
            if rw == canvas.w && rh == canvas.h {
                None
            } else {
                Some(((canvas.w - rw) / 2, (canvas.h - rh) / 2, rw, rh))
            }
        }
    };

    CanvasPlan {
        input,
        canvas,
        fit,
        dst_roi,
    }
}

/// Largest size with the input's aspect ratio that fits inside `bounds`.
fn fit_within(input: Size, bounds: Size) -> (u32, u32) {
    if input.is_empty() {
        return (bounds.w, bounds.h);
    }
    let (w, h) = (input.w as f64, input.h as f64);
    let s = (bounds.w as f64 / w).min(bounds.h as f64 / h);
    (
        ((w * s).round() as u32).clamp(1, bounds.w.max(1)),
        ((h * s).round() as u32).clamp(1, bounds.h.max(1)),
    )
}
