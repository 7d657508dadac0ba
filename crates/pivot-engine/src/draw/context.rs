use glam::Affine2;

use crate::coords::PixelSize;
use crate::device::DEFAULT_DPI;

use super::DrawError;

/// Device-independent 2D factory.
#[derive(Debug, Clone)]
pub struct DrawFactory {
    debug: bool,
}

impl DrawFactory {
    /// `debug` labels the GPU objects the 2D layer creates.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Wraps a freshly created graphics device for 2D use.
    pub fn create_device(&self, device: wgpu::Device, queue: wgpu::Queue) -> DrawDevice {
        DrawDevice {
            device,
            queue,
            debug: self.debug,
        }
    }
}

/// 2D device bound to one graphics device.
#[derive(Debug, Clone)]
pub struct DrawDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    debug: bool,
}

impl DrawDevice {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_context(&self) -> DrawContext {
        DrawContext::default()
    }
}

/// Text antialiasing mode of a [`DrawContext`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TextAntialias {
    /// Works under any composition and rotation.
    #[default]
    Grayscale,
    ClearType,
}

/// Back buffer wrapped as the 2D drawing target.
#[derive(Debug, Clone)]
pub struct TargetBitmap {
    pub view: wgpu::TextureView,
    pub size: PixelSize,
    pub dpi: f32,
    pub format: wgpu::TextureFormat,
}

/// 2D drawing state: target, DPI and orientation transform.
#[derive(Debug, Clone)]
pub struct DrawContext {
    dpi: f32,
    transform: Affine2,
    antialias: TextAntialias,
    target: Option<TargetBitmap>,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            transform: Affine2::IDENTITY,
            antialias: TextAntialias::Grayscale,
            target: None,
        }
    }
}

impl DrawContext {
    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    pub fn set_dpi(&mut self, dpi: f32) {
        self.dpi = dpi;
    }

    /// Maps logical units to target pixels, including pre-rotation.
    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Affine2) {
        self.transform = transform;
    }

    pub fn text_antialias(&self) -> TextAntialias {
        self.antialias
    }

    pub fn set_text_antialias(&mut self, antialias: TextAntialias) {
        self.antialias = antialias;
    }

    pub fn target(&self) -> Option<&TargetBitmap> {
        self.target.as_ref()
    }

    /// Binds `target`, or unbinds with `None`. Returns the previous target.
    pub fn set_target(&mut self, target: Option<TargetBitmap>) -> Option<TargetBitmap> {
        std::mem::replace(&mut self.target, target)
    }

    /// Clears the bound target to `color` (premultiplied linear RGBA).
    pub fn clear(&self, device: &DrawDevice, color: wgpu::Color) -> Result<(), DrawError> {
        let target = self.target.as_ref().ok_or(DrawError::NoTarget)?;

        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: device.debug.then_some("pivot clear encoder"),
            });

        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: device.debug.then_some("pivot clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        device.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_to_grayscale_at_reference_dpi() {
        let ctx = DrawContext::default();
        assert_eq!(ctx.dpi(), DEFAULT_DPI);
        assert_eq!(ctx.text_antialias(), TextAntialias::Grayscale);
        assert_eq!(ctx.transform(), Affine2::IDENTITY);
        assert!(ctx.target().is_none());
    }
}
