use glam::Vec2;

/// Surface size in logical (device-independent) units.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LogicalSize {
    pub width: f32,
    pub height: f32,
}

impl LogicalSize {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns `true` when either dimension has no area (hidden or collapsed surface).
    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Converts to physical pixels: `max(1, round(size * scale))` per axis.
    pub fn to_pixels(self, scale: Vec2) -> PixelSize {
        PixelSize::new(
            scale_to_pixels(self.width, scale.x),
            scale_to_pixels(self.height, scale.y),
        )
    }
}

/// Size in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Swaps width and height.
    #[inline]
    pub const fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

// `as u32` saturates NaN and negatives to zero, which the clamp lifts to 1.
fn scale_to_pixels(units: f32, scale: f32) -> u32 {
    ((units * scale).round() as u32).max(1)
}
