//! 2D drawing layer on top of the graphics device.
//!
//! [`DrawFactory`], [`TextFactory`] and [`ImageFactory`] never touch the GPU
//! and survive device loss. [`DrawDevice`] and [`DrawContext`] are recreated
//! with the device; the context's target bitmap is rebound on every resize.

mod context;
mod image;
mod text;

use thiserror::Error;

pub use context::{DrawContext, DrawDevice, DrawFactory, TargetBitmap, TextAntialias};
pub use image::{DecodedImage, ImageFactory};
pub use text::{FontId, TextFactory};

/// Errors raised by the 2D layer.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("font load error: {0}")]
    FontLoad(String),

    #[error("image decode error: {0}")]
    ImageDecode(#[from] ::image::ImageError),

    #[error("no target bitmap is bound to the draw context")]
    NoTarget,
}
