use winit::event::WindowEvent;

use crate::device::DeviceResources;
use crate::device::gpu::WgpuBackend;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
pub trait App {
    /// Called for window events before the runtime handles them.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Drop every GPU object created from the previous device.
    fn on_device_lost(&mut self) {}

    /// Recreate GPU content; the device is ready, and so is the swap chain
    /// unless the window has no area.
    fn on_device_restored(&mut self, resources: &DeviceResources<WgpuBackend>) {
        let _ = resources;
    }

    /// Called once per rendered frame, before present.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}
