use super::PixelSize;

/// Rasterizer viewport in physical pixels.
///
/// The device layer always anchors it at the origin and sizes it to the
/// current back buffer.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Full-buffer viewport for a back buffer of `size`.
    #[inline]
    pub fn from_size(size: PixelSize) -> Self {
        Self::new(size.width as f32, size.height as f32)
    }
}
