use winit::window::Window;

use crate::coords::{LogicalSize, PixelSize, Viewport};
use crate::device::gpu::{WgpuBackend, WgpuDevice, WgpuTargets};
use crate::device::{DeviceResources, DisplayOrientation};
use crate::draw::DrawError;
use crate::window::RuntimeCtx;

/// Per-frame context passed to `core::App::on_frame`.
///
/// Resources are borrowed shared: anything that can rebuild the swap chain
/// goes through [`RuntimeCtx`] and is applied after the callback returns.
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub resources: &'a DeviceResources<WgpuBackend>,
    pub runtime: &'a mut RuntimeCtx,
    pub frame_index: u64,
}

impl<'a> FrameCtx<'a> {
    pub fn logical_size(&self) -> LogicalSize {
        self.resources.logical_size()
    }

    pub fn render_target_size(&self) -> PixelSize {
        self.resources.render_target_size()
    }

    pub fn viewport(&self) -> Viewport {
        self.resources.viewport()
    }

    pub fn current_orientation(&self) -> DisplayOrientation {
        self.resources.metrics().current_orientation
    }

    pub fn device(&self) -> Option<&'a WgpuDevice> {
        self.resources.device()
    }

    pub fn targets(&self) -> Option<&'a WgpuTargets> {
        self.resources.targets()
    }

    /// Clears the 2D target bound to the back buffer.
    ///
    /// Does nothing while the device has no target (zero-area window).
    pub fn clear(&self, color: wgpu::Color) -> Result<(), DrawError> {
        let Some(device) = self.device() else {
            return Ok(());
        };
        if device.draw_context().target().is_none() {
            return Ok(());
        }
        device.draw_context().clear(device.draw_device(), color)
    }
}
