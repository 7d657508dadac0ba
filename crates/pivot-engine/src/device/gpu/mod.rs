//! wgpu implementation of [`Backend`].
//!
//! Mapping onto wgpu:
//! - the instance, adapter, device and queue are all device-dependent; a
//!   fresh instance is the only way to observe a new default adapter
//! - the swap chain is a configured `wgpu::Surface` plus an app-owned back
//!   buffer in native orientation, blitted with the inverse rotation on present
//! - device loss is reported by wgpu's lost callback and surfaced through
//!   [`Backend::device_status`] and every GPU-touching call

mod present;
mod surface;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use glam::Vec2;
use log::{debug, error, info};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::coords::PixelSize;
use crate::draw::{
    DrawContext, DrawDevice, DrawFactory, ImageFactory, TargetBitmap, TextAntialias, TextFactory,
};

use super::backend::{
    AdapterId, Backend, DeviceStatus, PresentTransform, SwapChainDesc, TargetDesc,
};
use super::{
    AdapterKind, DeviceCandidate, DeviceConfig, DeviceError, DisplayRotation, FeatureLevel,
    LossReason,
};

pub use present::present_uv_transform;

use present::PresentPipeline;
use surface::AcquireFailure;

/// A window (or any native handle owner) that can host a surface.
pub trait SurfaceHandle: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T> SurfaceHandle for T where T: HasWindowHandle + HasDisplayHandle + Send + Sync + ?Sized {}

/// Presentation target handed to [`DeviceResources::attach_surface`](super::DeviceResources::attach_surface).
pub type SurfaceTarget = Arc<dyn SurfaceHandle>;

const LOST_NONE: u8 = 0;
const LOST_REMOVED: u8 = 1;
const LOST_RESET: u8 = 2;

/// Device-independent objects.
pub struct WgpuFactories {
    pub draw: DrawFactory,
    pub text: TextFactory,
    pub images: ImageFactory,
}

/// Device-dependent objects.
pub struct WgpuDevice {
    draw_context: DrawContext,
    draw: DrawDevice,
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
    instance: wgpu::Instance,
    lost: Arc<AtomicU8>,
}

impl WgpuDevice {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn draw_device(&self) -> &DrawDevice {
        &self.draw
    }

    pub fn draw_context(&self) -> &DrawContext {
        &self.draw_context
    }

    pub fn draw_context_mut(&mut self) -> &mut DrawContext {
        &mut self.draw_context
    }

    fn loss(&self) -> Option<LossReason> {
        match self.lost.load(Ordering::Acquire) {
            LOST_REMOVED => Some(LossReason::Removed),
            LOST_RESET => Some(LossReason::Reset),
            _ => None,
        }
    }

    fn check(&self) -> Result<(), DeviceError> {
        self.loss().map_or(Ok(()), |reason| Err(DeviceError::Lost(reason)))
    }
}

/// Configured surface plus the back buffer content is rendered into.
pub struct WgpuSwapChain {
    present: PresentPipeline,
    back_buffer: wgpu::Texture,
    back_buffer_size: PixelSize,
    transform: PresentTransform,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    surface: wgpu::Surface<'static>,
}

impl WgpuSwapChain {
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Size of the window surface; the back buffer is this, transposed when rotated.
    pub fn surface_size(&self) -> PixelSize {
        PixelSize::new(self.config.width, self.config.height)
    }

    pub fn back_buffer_size(&self) -> PixelSize {
        self.back_buffer_size
    }

    pub fn present_transform(&self) -> PresentTransform {
        self.transform
    }

    fn recreate_back_buffer(&mut self, desc: &SwapChainDesc) {
        self.back_buffer = create_back_buffer(&self.device, desc);
        self.back_buffer_size = desc.size;
        let view = self
            .back_buffer
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.present.bind(&self.device, &view);
    }

    /// Reconfigures the surface if the rotation changed its required size.
    fn sync_surface_size(&mut self) {
        let size = if self.transform.rotation.swaps_dimensions() {
            self.back_buffer_size.transposed()
        } else {
            self.back_buffer_size
        };
        if surface::apply_size(&mut self.config, size) {
            self.surface.configure(&self.device, &self.config);
        }
    }
}

/// Views over the back buffer for the current frame size.
pub struct WgpuTargets {
    render_target_view: wgpu::TextureView,
    depth_stencil_view: wgpu::TextureView,
    _depth_stencil: wgpu::Texture,
    size: PixelSize,
}

impl WgpuTargets {
    pub fn render_target_view(&self) -> &wgpu::TextureView {
        &self.render_target_view
    }

    pub fn depth_stencil_view(&self) -> &wgpu::TextureView {
        &self.depth_stencil_view
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }
}

/// Backend that renders through wgpu.
#[derive(Debug, Clone)]
pub struct WgpuBackend {
    backends: wgpu::Backends,
    prefer_srgb: bool,
    high_performance: bool,
}

impl Default for WgpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WgpuBackend {
    pub fn new() -> Self {
        Self::with_backends(wgpu::Backends::all())
    }

    /// Restricts the graphics APIs wgpu may use.
    pub fn with_backends(backends: wgpu::Backends) -> Self {
        Self {
            backends,
            prefer_srgb: true,
            high_performance: true,
        }
    }

    fn create_instance(&self, config: &DeviceConfig) -> wgpu::Instance {
        let flags = if config.debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: self.backends,
            flags,
            ..Default::default()
        })
    }

    fn request_adapter(
        instance: &wgpu::Instance,
        kind: AdapterKind,
        high_performance: bool,
    ) -> Result<wgpu::Adapter, DeviceError> {
        let power_preference = if high_performance {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::LowPower
        };
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: kind == AdapterKind::Software,
        }))
        .map_err(|e| DeviceError::Backend(format!("no {kind:?} adapter: {e}")))
    }
}

fn level_limits(level: FeatureLevel) -> wgpu::Limits {
    match level {
        FeatureLevel::Full => wgpu::Limits::default(),
        FeatureLevel::Downlevel => wgpu::Limits::downlevel_defaults(),
        FeatureLevel::WebGl2 => wgpu::Limits::downlevel_webgl2_defaults(),
    }
}

fn adapter_id(info: &wgpu::AdapterInfo) -> AdapterId {
    AdapterId {
        vendor: info.vendor,
        device: info.device,
        name: info.name.clone(),
    }
}

fn create_back_buffer(device: &wgpu::Device, desc: &SwapChainDesc) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("pivot back buffer"),
        size: wgpu::Extent3d {
            width: desc.size.width,
            height: desc.size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: desc.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

impl Backend for WgpuBackend {
    type Surface = SurfaceTarget;
    type Factories = WgpuFactories;
    type Device = WgpuDevice;
    type SwapChain = WgpuSwapChain;
    type Targets = WgpuTargets;

    fn create_factories(&mut self, config: &DeviceConfig) -> Result<WgpuFactories, DeviceError> {
        self.prefer_srgb = config.prefer_srgb;
        self.high_performance = config.high_performance;
        Ok(WgpuFactories {
            draw: DrawFactory::new(config.debug),
            text: TextFactory::new(),
            images: ImageFactory::new(),
        })
    }

    fn create_device(
        &mut self,
        factories: &WgpuFactories,
        candidate: DeviceCandidate,
        config: &DeviceConfig,
    ) -> Result<WgpuDevice, DeviceError> {
        let instance = self.create_instance(config);
        let adapter = Self::request_adapter(&instance, candidate.adapter, config.high_performance)?;

        let info = adapter.get_info();
        let required_limits = level_limits(candidate.level);
        if !required_limits.check_limits(&adapter.limits()) {
            debug!("{} cannot provide {} limits", info.name, candidate.level);
            return Err(DeviceError::FeatureLevelUnsupported(candidate.level));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("pivot-engine device"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits.using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceError::Backend(format!("failed to create wgpu device: {e}")))?;

        let lost = Arc::new(AtomicU8::new(LOST_NONE));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            error!("wgpu device lost ({reason:?}): {message}");
            let code = match reason {
                wgpu::DeviceLostReason::Destroyed => LOST_REMOVED,
                _ => LOST_RESET,
            };
            flag.store(code, Ordering::Release);
        });

        info!("wgpu adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        let draw = factories.draw.create_device(device.clone(), queue.clone());
        let mut draw_context = draw.create_context();
        draw_context.set_text_antialias(TextAntialias::Grayscale);

        Ok(WgpuDevice {
            draw_context,
            draw,
            device,
            queue,
            adapter,
            instance,
            lost,
        })
    }

    fn adapter_id(&self, device: &WgpuDevice) -> AdapterId {
        adapter_id(&device.adapter.get_info())
    }

    fn current_adapter_id(&mut self, device: &WgpuDevice) -> Result<AdapterId, DeviceError> {
        device.check()?;

        // The device's own instance caches adapters; only a new one sees changes.
        let kind = match device.adapter.get_info().device_type {
            wgpu::DeviceType::Cpu => AdapterKind::Software,
            _ => AdapterKind::Hardware,
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: self.backends,
            ..Default::default()
        });
        match Self::request_adapter(&instance, kind, self.high_performance) {
            Ok(adapter) => Ok(adapter_id(&adapter.get_info())),
            Err(err) => {
                debug!("default adapter query failed: {err}");
                Err(DeviceError::Lost(LossReason::Removed))
            }
        }
    }

    fn device_status(&self, device: &WgpuDevice) -> DeviceStatus {
        match device.loss() {
            None => DeviceStatus::Ok,
            Some(LossReason::Reset) => DeviceStatus::Reset,
            Some(_) => DeviceStatus::Removed,
        }
    }

    fn create_swap_chain(
        &mut self,
        device: &WgpuDevice,
        surface: &SurfaceTarget,
        desc: &SwapChainDesc,
    ) -> Result<WgpuSwapChain, DeviceError> {
        device.check()?;

        let wgpu_surface = device
            .instance
            .create_surface(Arc::clone(surface))
            .map_err(|e| DeviceError::Backend(format!("failed to create wgpu surface: {e}")))?;

        if !device.adapter.is_surface_supported(&wgpu_surface) {
            return Err(DeviceError::Backend(
                "adapter cannot present to this surface".into(),
            ));
        }

        let caps = wgpu_surface.get_capabilities(&device.adapter);
        let format = surface::choose_surface_format(&caps, self.prefer_srgb)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: desc.size.width,
            height: desc.size.height,
            present_mode: surface::choose_present_mode(&caps, desc.present_mode),
            alpha_mode: surface::choose_alpha_mode(&caps),
            view_formats: vec![],
            desired_maximum_frame_latency: desc.buffer_count,
        };
        wgpu_surface.configure(&device.device, &config);

        let mut present = PresentPipeline::new(&device.device, format);
        let back_buffer = create_back_buffer(&device.device, desc);
        let view = back_buffer.create_view(&wgpu::TextureViewDescriptor::default());
        present.bind(&device.device, &view);

        let transform = PresentTransform {
            rotation: DisplayRotation::Identity,
            inverse_scale: Vec2::ONE,
        };
        present.write_rotation(&device.queue, transform.rotation);

        Ok(WgpuSwapChain {
            present,
            back_buffer,
            back_buffer_size: desc.size,
            transform,
            config,
            device: device.device.clone(),
            surface: wgpu_surface,
        })
    }

    fn resize_swap_chain(
        &mut self,
        device: &WgpuDevice,
        swap_chain: &mut WgpuSwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), DeviceError> {
        device.check()?;
        swap_chain.recreate_back_buffer(desc);
        swap_chain.sync_surface_size();
        Ok(())
    }

    fn set_present_transform(
        &mut self,
        swap_chain: &mut WgpuSwapChain,
        transform: PresentTransform,
    ) -> Result<(), DeviceError> {
        swap_chain.transform = transform;
        swap_chain.sync_surface_size();
        Ok(())
    }

    fn create_targets(
        &mut self,
        device: &mut WgpuDevice,
        swap_chain: &WgpuSwapChain,
        desc: &TargetDesc,
    ) -> Result<WgpuTargets, DeviceError> {
        device.check()?;

        swap_chain
            .present
            .write_rotation(&device.queue, swap_chain.transform.rotation);

        let render_target_view = swap_chain
            .back_buffer
            .create_view(&wgpu::TextureViewDescriptor::default());

        let depth_stencil = device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pivot depth stencil"),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_stencil_view = depth_stencil.create_view(&wgpu::TextureViewDescriptor::default());

        let ctx = &mut device.draw_context;
        ctx.set_target(Some(TargetBitmap {
            view: render_target_view.clone(),
            size: desc.size,
            dpi: desc.dpi,
            format: swap_chain.back_buffer.format(),
        }));
        ctx.set_dpi(desc.dpi);
        ctx.set_transform(desc.transform_2d);
        ctx.set_text_antialias(TextAntialias::Grayscale);

        Ok(WgpuTargets {
            render_target_view,
            depth_stencil_view,
            _depth_stencil: depth_stencil,
            size: desc.size,
        })
    }

    fn release_targets(&mut self, device: &mut WgpuDevice, targets: WgpuTargets) {
        device.draw_context.set_target(None);
        drop(targets);
    }

    fn present(
        &mut self,
        device: &WgpuDevice,
        swap_chain: &mut WgpuSwapChain,
    ) -> Result<(), DeviceError> {
        device.check()?;

        let frame = match swap_chain.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                return match surface::classify_surface_error(err) {
                    AcquireFailure::Reconfigure => {
                        swap_chain.surface.configure(&device.device, &swap_chain.config);
                        debug!("surface outdated; reconfigured and skipped frame");
                        Ok(())
                    }
                    AcquireFailure::Skip => {
                        debug!("surface acquire timed out; skipped frame");
                        Ok(())
                    }
                    AcquireFailure::Fatal(err) => Err(err),
                };
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pivot present encoder"),
            });
        swap_chain.present.encode(&mut encoder, &view);
        device.queue.submit(std::iter::once(encoder.finish()));

        drop(view);
        frame.present();

        device.check()
    }

    /// wgpu has no trim call; polling frees resources whose last submission
    /// finished, which is the closest it offers.
    fn trim(&mut self, device: &WgpuDevice) {
        if let Err(err) = device.device.poll(wgpu::PollType::Poll) {
            debug!("device poll during trim failed: {err}");
        }
    }
}
