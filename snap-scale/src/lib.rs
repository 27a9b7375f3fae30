// SPDX-License-Identifier: MIT
//! # snap-scale: Fixed-Canvas Snapshot Scaling
//!
//! This crate draws arbitrary BGRA source frames onto a fixed-size canvas, the
//! way a snapshot client rasterizes a live video element into a small drawing
//! surface before encoding it.
//!
//! ## Key Components
//!
//! - [`plan`]: canvas placement planning (stretch vs letterbox)
//! - [`cpu`]: the reusable [`cpu::CanvasScaler`] built on `fast_image_resize`
//!
//! ## Usage Example
//!
//! ```rust
//! use snap_scale::{cpu::CanvasScaler, plan::{FitMode, Size}};
//!
//! let mut scaler = CanvasScaler::new(Size::new(320, 240), FitMode::Stretch)?;
//! let source = vec![0u8; 640 * 480 * 4];
//! let pixels = scaler.draw(&source, Size::new(640, 480), None)?;
//! assert_eq!(pixels.len(), 320 * 240 * 4);
//! # Ok::<(), snap_scale::cpu::ScaleError>(())
//! ```
//!
//! The canvas buffer is allocated once and reused for every frame.

pub mod cpu;
pub mod plan;

pub use cpu::{CanvasScaler, ScaleError};
pub use plan::{CanvasPlan, FitMode, Size, plan_canvas};
