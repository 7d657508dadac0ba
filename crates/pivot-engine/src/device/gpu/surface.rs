use crate::coords::PixelSize;
use crate::device::{DeviceError, LossReason};

/// Picks the presentation format, preferring sRGB when requested.
pub(super) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Result<wgpu::TextureFormat, DeviceError> {
    let Some(&first) = caps.formats.first() else {
        return Err(DeviceError::UnsupportedFormat(
            "surface reports no presentable formats".into(),
        ));
    };

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(format) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Ok(format);
        }
    }

    Ok(first)
}

/// Opaque when the compositor allows it; the back buffer carries no alpha contract.
pub(super) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        return wgpu::CompositeAlphaMode::Opaque;
    }
    caps.alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(super) fn choose_present_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: wgpu::PresentMode,
) -> wgpu::PresentMode {
    if caps.present_modes.contains(&requested) {
        requested
    } else {
        log::warn!("present mode {requested:?} unsupported; falling back to Fifo");
        wgpu::PresentMode::Fifo
    }
}

pub(super) fn apply_size(config: &mut wgpu::SurfaceConfiguration, size: PixelSize) -> bool {
    if config.width == size.width && config.height == size.height {
        return false;
    }
    config.width = size.width;
    config.height = size.height;
    true
}

/// Outcome of a failed surface texture acquisition.
#[derive(Debug)]
pub(super) enum AcquireFailure {
    /// Reconfigure the surface and drop this frame.
    Reconfigure,
    /// Drop this frame; the next one may succeed.
    Skip,
    Fatal(DeviceError),
}

pub(super) fn classify_surface_error(err: wgpu::SurfaceError) -> AcquireFailure {
    match err {
        wgpu::SurfaceError::Outdated => AcquireFailure::Reconfigure,
        wgpu::SurfaceError::Lost => AcquireFailure::Fatal(DeviceError::Lost(LossReason::SurfaceLost)),
        wgpu::SurfaceError::OutOfMemory => AcquireFailure::Fatal(DeviceError::OutOfMemory),
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => AcquireFailure::Skip,
    }
}
