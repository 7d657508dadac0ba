use std::fmt;

use glam::{Affine2, Vec2};

use crate::coords::PixelSize;

use super::{DeviceCandidate, DeviceConfig, DeviceError, DisplayRotation};

/// Identity of a physical adapter, stable across device recreation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AdapterId {
    pub vendor: u32,
    pub device: u32,
    pub name: String,
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:04x}:{:04x})", self.name, self.vendor, self.device)
    }
}

/// Health of a device as reported by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceStatus {
    Ok,
    Removed,
    Reset,
}

/// Parameters of a swap chain's buffers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SwapChainDesc {
    pub size: PixelSize,
    pub format: wgpu::TextureFormat,
    pub buffer_count: u32,
    pub present_mode: wgpu::PresentMode,
}

impl SwapChainDesc {
    /// Returns `true` if a swap chain built with `self` can be resized in place to `next`.
    pub fn can_resize_to(&self, next: &SwapChainDesc) -> bool {
        self.format == next.format
            && self.buffer_count == next.buffer_count
            && self.present_mode == next.present_mode
    }
}

/// Transform applied by the presentation step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PresentTransform {
    pub rotation: DisplayRotation,
    /// Inverse of the compositor scale, so the compositor can map the buffer back.
    pub inverse_scale: Vec2,
}

/// Parameters for the views and 2D target wrapped around the back buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TargetDesc {
    pub size: PixelSize,
    pub depth_format: wgpu::TextureFormat,
    pub dpi: f32,
    pub transform_2d: Affine2,
}

/// Graphics API seam used by [`DeviceResources`](super::DeviceResources).
///
/// A backend only creates and destroys objects; sequencing, change tracking
/// and loss recovery live in the manager. Operations that touch the GPU report
/// device loss as [`DeviceError::Lost`].
pub trait Backend {
    /// Host presentation target (window, panel).
    type Surface: Clone;

    /// Device-independent objects: 2D factory, text layout, image decoding.
    type Factories;

    /// Logical device, command context, presentation factory and 2D device/context.
    type Device;

    type SwapChain;

    /// Render target view, depth-stencil view and 2D target bitmap.
    type Targets;

    fn create_factories(&mut self, config: &DeviceConfig) -> Result<Self::Factories, DeviceError>;

    fn create_device(
        &mut self,
        factories: &Self::Factories,
        candidate: DeviceCandidate,
        config: &DeviceConfig,
    ) -> Result<Self::Device, DeviceError>;

    /// Adapter the device was created on.
    fn adapter_id(&self, device: &Self::Device) -> AdapterId;

    /// Adapter the system would pick for a new device right now.
    fn current_adapter_id(&mut self, device: &Self::Device) -> Result<AdapterId, DeviceError>;

    fn device_status(&self, device: &Self::Device) -> DeviceStatus;

    fn create_swap_chain(
        &mut self,
        device: &Self::Device,
        surface: &Self::Surface,
        desc: &SwapChainDesc,
    ) -> Result<Self::SwapChain, DeviceError>;

    /// Resizes buffers in place. No back-buffer references may be outstanding.
    fn resize_swap_chain(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), DeviceError>;

    fn set_present_transform(
        &mut self,
        swap_chain: &mut Self::SwapChain,
        transform: PresentTransform,
    ) -> Result<(), DeviceError>;

    /// Wraps the current back buffer; also binds it as the 2D target.
    fn create_targets(
        &mut self,
        device: &mut Self::Device,
        swap_chain: &Self::SwapChain,
        desc: &TargetDesc,
    ) -> Result<Self::Targets, DeviceError>;

    /// Unbinds and drops the back-buffer views.
    fn release_targets(&mut self, device: &mut Self::Device, targets: Self::Targets) {
        let _ = device;
        drop(targets);
    }

    fn present(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
    ) -> Result<(), DeviceError>;

    /// Hints the driver to release temporary allocations.
    fn trim(&mut self, device: &Self::Device);
}
