//! Interactive harness for the device layer.
//!
//! Keys:
//! - `R` rotates the simulated display orientation a quarter turn
//! - `V` forces a device validation
//! - `Escape` exits

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use pivot_engine::core::{App, AppControl, FrameCtx};
use pivot_engine::device::gpu::WgpuBackend;
use pivot_engine::device::{DeviceConfig, DeviceResources, DisplayOrientation};
use pivot_engine::logging::{LoggingConfig, init_logging};
use pivot_engine::window::{Runtime, RuntimeConfig};

const ORIENTATIONS: [DisplayOrientation; 4] = [
    DisplayOrientation::Landscape,
    DisplayOrientation::Portrait,
    DisplayOrientation::LandscapeFlipped,
    DisplayOrientation::PortraitFlipped,
];

#[derive(Default)]
struct Studio {
    orientation: usize,
    rotate_requested: bool,
    validate_requested: bool,
    exit_requested: bool,
    device_generation: u32,
}

impl Studio {
    fn clear_color(&self) -> wgpu::Color {
        // One tint per orientation so a rotation is visible at a glance.
        match ORIENTATIONS[self.orientation] {
            DisplayOrientation::Portrait => wgpu::Color { r: 0.05, g: 0.20, b: 0.10, a: 1.0 },
            DisplayOrientation::LandscapeFlipped => wgpu::Color { r: 0.20, g: 0.05, b: 0.10, a: 1.0 },
            DisplayOrientation::PortraitFlipped => wgpu::Color { r: 0.20, g: 0.15, b: 0.02, a: 1.0 },
            _ => wgpu::Color { r: 0.03, g: 0.05, b: 0.12, a: 1.0 },
        }
    }
}

impl App for Studio {
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::KeyR) => self.rotate_requested = true,
            PhysicalKey::Code(KeyCode::KeyV) => self.validate_requested = true,
            PhysicalKey::Code(KeyCode::Escape) => self.exit_requested = true,
            _ => {}
        }
        AppControl::Continue
    }

    fn on_device_lost(&mut self) {
        log::warn!("studio: device lost, dropping GPU content");
    }

    fn on_device_restored(&mut self, resources: &DeviceResources<WgpuBackend>) {
        self.device_generation += 1;
        if let Some(adapter) = resources.adapter() {
            log::info!(
                "studio: device restored on {adapter} (generation {})",
                self.device_generation
            );
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        if std::mem::take(&mut self.rotate_requested) {
            self.orientation = (self.orientation + 1) % ORIENTATIONS.len();
            ctx.runtime.set_orientation(ORIENTATIONS[self.orientation]);
        }
        if std::mem::take(&mut self.validate_requested) {
            ctx.runtime.validate_device();
        }
        if self.exit_requested {
            return AppControl::Exit;
        }

        if ctx.frame_index == 0 {
            let size = ctx.render_target_size();
            log::info!("studio: first frame at {}x{}", size.width, size.height);
        }

        if let Err(err) = ctx.clear(self.clear_color()) {
            log::error!("studio: clear failed: {err}");
            return AppControl::Exit;
        }
        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "Pivot Studio".to_string(),
        ..RuntimeConfig::default()
    };

    Runtime::run(config, DeviceConfig::default(), Studio::default())
}
