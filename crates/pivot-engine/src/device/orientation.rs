//! Display orientation and the transforms that pre-rotate content.
//!
//! Content is authored in the current (logical) orientation; the back buffer
//! stays in the panel's native orientation. The 2D transform maps logical
//! units into back-buffer pixels, the 3D transform is applied after projection.

use glam::{Affine2, Mat2, Mat4, Vec2, Vec4};
use log::warn;

use crate::coords::PixelSize;

/// Orientation of the display as reported by the host.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum DisplayOrientation {
    #[default]
    Landscape,
    Portrait,
    LandscapeFlipped,
    PortraitFlipped,
    /// The host could not determine an orientation.
    None,
}

impl DisplayOrientation {
    /// Quarter turns clockwise from landscape, or `None` if unknown.
    pub fn quarter_turns(self) -> Option<u8> {
        match self {
            DisplayOrientation::Landscape => Some(0),
            DisplayOrientation::Portrait => Some(1),
            DisplayOrientation::LandscapeFlipped => Some(2),
            DisplayOrientation::PortraitFlipped => Some(3),
            DisplayOrientation::None => None,
        }
    }
}

/// Rotation the presentation step applies to the back buffer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum DisplayRotation {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl DisplayRotation {
    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => DisplayRotation::Identity,
            1 => DisplayRotation::Rotate90,
            2 => DisplayRotation::Rotate180,
            _ => DisplayRotation::Rotate270,
        }
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            DisplayRotation::Identity => 0,
            DisplayRotation::Rotate90 => 1,
            DisplayRotation::Rotate180 => 2,
            DisplayRotation::Rotate270 => 3,
        }
    }

    /// Returns `true` when the back buffer is transposed relative to the output.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, DisplayRotation::Rotate90 | DisplayRotation::Rotate270)
    }

    // Exact (cos, sin); trig functions leave residue at quarter turns.
    fn cos_sin(self) -> (f32, f32) {
        match self {
            DisplayRotation::Identity => (1.0, 0.0),
            DisplayRotation::Rotate90 => (0.0, 1.0),
            DisplayRotation::Rotate180 => (-1.0, 0.0),
            DisplayRotation::Rotate270 => (0.0, -1.0),
        }
    }
}

/// Rotation needed so content drawn in `current` orientation appears upright
/// on a panel whose intrinsic orientation is `native`.
///
/// Computed as `(current - native) mod 4` quarter turns. An unknown
/// orientation on either side falls back to identity.
pub fn compute_display_rotation(
    native: DisplayOrientation,
    current: DisplayOrientation,
) -> DisplayRotation {
    match (native.quarter_turns(), current.quarter_turns()) {
        (Some(native_turns), Some(current_turns)) => {
            DisplayRotation::from_quarter_turns(current_turns + 4 - native_turns)
        }
        _ => {
            warn!(
                "unsupported orientation pair (native {native:?}, current {current:?}); \
                 assuming identity rotation"
            );
            DisplayRotation::Identity
        }
    }
}

/// 2D transform from logical units to back-buffer pixels.
///
/// Scales by `scale`, rotates by `rotation` (clockwise, +Y down) and
/// translates so the rotated content lands inside the buffer. `output` is the
/// unrotated pixel size of the content.
pub fn orientation_transform_2d(rotation: DisplayRotation, output: PixelSize, scale: Vec2) -> Affine2 {
    let (cos, sin) = rotation.cos_sin();
    let rotate = Mat2::from_cols(Vec2::new(cos, sin), Vec2::new(-sin, cos));

    let out = output.as_vec2();
    let translation = match rotation {
        DisplayRotation::Identity => Vec2::ZERO,
        DisplayRotation::Rotate90 => Vec2::new(out.y, 0.0),
        DisplayRotation::Rotate180 => out,
        DisplayRotation::Rotate270 => Vec2::new(0.0, out.x),
    };

    Affine2::from_mat2_translation(rotate * Mat2::from_diagonal(scale), translation)
}

/// 3D transform applied after projection (clip space, +Y up).
///
/// A rotation about Z by the same quarter turn. Because clip space flips the
/// Y axis, its matrix is the inverse of the 2D rotation.
pub fn orientation_transform_3d(rotation: DisplayRotation) -> Mat4 {
    let (cos, sin) = rotation.cos_sin();
    Mat4::from_cols(
        Vec4::new(cos, -sin, 0.0, 0.0),
        Vec4::new(sin, cos, 0.0, 0.0),
        Vec4::Z,
        Vec4::W,
    )
}
