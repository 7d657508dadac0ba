use glam::Vec2;

use crate::coords::{LogicalSize, PixelSize};

use super::orientation::{DisplayOrientation, DisplayRotation, compute_display_rotation};

/// Reference DPI at which one logical unit equals one pixel.
pub const DEFAULT_DPI: f32 = 96.0;

/// Geometry reported by the host for the attached surface.
///
/// Everything surface-dependent is derived from these values; they survive
/// device loss untouched.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceMetrics {
    pub logical_size: LogicalSize,
    pub dpi: f32,
    /// Compositor scale, applied instead of `dpi / 96` when present.
    pub composition_scale: Option<Vec2>,
    pub current_orientation: DisplayOrientation,
    pub native_orientation: DisplayOrientation,
}

impl SurfaceMetrics {
    pub fn new(logical_size: LogicalSize, dpi: f32) -> Self {
        Self {
            logical_size,
            dpi,
            ..Self::default()
        }
    }

    /// Scale from logical units to pixels.
    pub fn effective_scale(&self) -> Vec2 {
        valid_composition_scale(self.composition_scale)
            .unwrap_or_else(|| Vec2::splat(self.dpi / DEFAULT_DPI))
    }

    /// Unrotated output size in pixels, never smaller than 1x1.
    pub fn output_size(&self) -> PixelSize {
        self.logical_size.to_pixels(self.effective_scale())
    }

    pub fn display_rotation(&self) -> DisplayRotation {
        compute_display_rotation(self.native_orientation, self.current_orientation)
    }

    /// Returns `true` when the surface has no area and resources must not be built.
    pub fn is_degenerate(&self) -> bool {
        self.logical_size.is_empty()
    }
}

/// Returns the scale if both axes are positive and finite.
pub(crate) fn valid_composition_scale(scale: Option<Vec2>) -> Option<Vec2> {
    scale.filter(|s| s.x > 0.0 && s.y > 0.0 && s.is_finite())
}

impl Default for SurfaceMetrics {
    fn default() -> Self {
        Self {
            logical_size: LogicalSize::default(),
            dpi: DEFAULT_DPI,
            composition_scale: None,
            current_orientation: DisplayOrientation::Landscape,
            native_orientation: DisplayOrientation::Landscape,
        }
    }
}
