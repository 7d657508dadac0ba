use std::rc::{Rc, Weak};

use glam::{Affine2, Mat4, Vec2};
use log::{debug, error, info, warn};

use crate::coords::{LogicalSize, PixelSize, Viewport};

use super::backend::{AdapterId, Backend, DeviceStatus, PresentTransform, SwapChainDesc, TargetDesc};
use super::feature::{DeviceCandidate, FeatureLevel, device_candidates, first_supported};
use super::metrics::{SurfaceMetrics, valid_composition_scale};
use super::orientation::{
    DisplayOrientation, DisplayRotation, orientation_transform_2d, orientation_transform_3d,
};
use super::{DeviceConfig, DeviceError, DeviceNotify, DeviceState, LossReason};

struct DeviceGroup<B: Backend> {
    handles: B::Device,
    candidate: DeviceCandidate,
    adapter: AdapterId,
}

struct SwapChainGroup<B: Backend> {
    swap_chain: B::SwapChain,
    desc: SwapChainDesc,
}

/// Owns the graphics device and everything derived from it.
///
/// Resources fall into three groups with different lifetimes:
/// - device-independent factories, created once in [`DeviceResources::new`]
/// - the device, created on first surface attachment and after device loss
/// - surface-dependent resources (swap chain, views, viewport, 2D target),
///   rebuilt whenever size, DPI, scale or orientation changes
///
/// All calls must come from one thread; the manager is not synchronized.
pub struct DeviceResources<B: Backend> {
    // Field order is drop order: views, swap chain, device, factories.
    targets: Option<B::Targets>,
    swap_chain: Option<SwapChainGroup<B>>,
    device: Option<DeviceGroup<B>>,
    surface: Option<B::Surface>,
    factories: B::Factories,
    backend: B,

    config: DeviceConfig,
    metrics: SurfaceMetrics,

    output_size: PixelSize,
    render_target_size: PixelSize,
    viewport: Viewport,
    rotation: DisplayRotation,
    transform_2d: Affine2,
    transform_3d: Mat4,

    notify: Option<Weak<dyn DeviceNotify<B>>>,
    state: DeviceState,
    recovering: bool,
}

impl<B: Backend> DeviceResources<B> {
    /// Creates the device-independent resources.
    ///
    /// Failure here is fatal; no device exists until a surface is attached.
    pub fn new(mut backend: B, config: DeviceConfig) -> Result<Self, DeviceError> {
        let factories = backend.create_factories(&config)?;
        debug!("device-independent resources created");

        Ok(Self {
            targets: None,
            swap_chain: None,
            device: None,
            surface: None,
            factories,
            backend,
            config,
            metrics: SurfaceMetrics::default(),
            output_size: PixelSize::new(1, 1),
            render_target_size: PixelSize::new(1, 1),
            viewport: Viewport::default(),
            rotation: DisplayRotation::Identity,
            transform_2d: Affine2::IDENTITY,
            transform_3d: Mat4::IDENTITY,
            notify: None,
            state: DeviceState::Uninitialized,
            recovering: false,
        })
    }

    /// Registers the loss observer. Only a weak reference is kept.
    pub fn register_device_notify<N>(&mut self, notify: &Rc<N>)
    where
        N: DeviceNotify<B> + 'static,
    {
        let weak: Weak<N> = Rc::downgrade(notify);
        self.notify = Some(weak);
    }

    /// Creates the device at the best available candidate, replacing any prior one.
    ///
    /// The previous device and all surface-dependent resources are released
    /// first. Call [`create_window_size_dependent_resources`] afterwards to
    /// rebuild the swap chain.
    ///
    /// [`create_window_size_dependent_resources`]: Self::create_window_size_dependent_resources
    pub fn create_device_resources(&mut self) -> Result<(), DeviceError> {
        self.release_device_resources();
        self.state = DeviceState::Uninitialized;

        let candidates = device_candidates(&self.config);
        let (backend, factories, config) = (&mut self.backend, &self.factories, &self.config);
        let (candidate, handles) =
            first_supported(&candidates, |candidate| backend.create_device(factories, candidate, config))
                .inspect_err(|err| error!("device creation failed: {err}"))?;

        let adapter = self.backend.adapter_id(&handles);
        info!("graphics device created on {adapter} ({candidate})");

        self.device = Some(DeviceGroup {
            handles,
            candidate,
            adapter,
        });
        self.state = DeviceState::DeviceReady;
        Ok(())
    }

    /// Binds the presentation target and builds everything needed to present to it.
    ///
    /// The device is created on first attachment. A previously attached
    /// target's swap chain is released.
    pub fn attach_surface(
        &mut self,
        surface: B::Surface,
        metrics: SurfaceMetrics,
    ) -> Result<(), DeviceError> {
        self.release_surface_resources();
        self.surface = Some(surface);
        self.metrics = metrics;

        if self.device.is_none() {
            self.create_device_resources()?;
        }
        self.create_window_size_dependent_resources()
    }

    pub fn set_logical_size(&mut self, size: LogicalSize) -> Result<(), DeviceError> {
        if self.metrics.logical_size == size {
            return Ok(());
        }
        self.metrics.logical_size = size;
        self.refresh_surface()
    }

    pub fn set_dpi(&mut self, dpi: f32) -> Result<(), DeviceError> {
        if !(dpi > 0.0 && dpi.is_finite()) {
            warn!("ignoring invalid dpi {dpi}");
            return Ok(());
        }
        if self.metrics.dpi == dpi {
            return Ok(());
        }
        self.metrics.dpi = dpi;
        self.refresh_surface()
    }

    /// Overrides `dpi / 96` with the compositor's scale. Non-positive or
    /// non-finite scales are ignored.
    pub fn set_composition_scale(&mut self, x: f32, y: f32) -> Result<(), DeviceError> {
        let scale = Some(Vec2::new(x, y));
        if valid_composition_scale(scale).is_none() {
            warn!("ignoring invalid composition scale {x}x{y}");
            return Ok(());
        }
        if self.metrics.composition_scale == scale {
            return Ok(());
        }
        self.metrics.composition_scale = scale;
        self.refresh_surface()
    }

    pub fn set_current_orientation(
        &mut self,
        orientation: DisplayOrientation,
    ) -> Result<(), DeviceError> {
        if self.metrics.current_orientation == orientation {
            return Ok(());
        }
        self.metrics.current_orientation = orientation;
        self.refresh_surface()
    }

    pub fn set_native_orientation(
        &mut self,
        orientation: DisplayOrientation,
    ) -> Result<(), DeviceError> {
        if self.metrics.native_orientation == orientation {
            return Ok(());
        }
        self.metrics.native_orientation = orientation;
        self.refresh_surface()
    }

    /// Rebuilds the swap chain, views, viewport, transforms and 2D target
    /// from the current metrics.
    ///
    /// Device loss during the rebuild triggers [`handle_device_lost`]. Any
    /// other failure is fatal and leaves no surface-dependent resources.
    /// A surface with zero area is skipped and the previous resources kept.
    ///
    /// [`handle_device_lost`]: Self::handle_device_lost
    pub fn create_window_size_dependent_resources(&mut self) -> Result<(), DeviceError> {
        match self.build_surface_resources() {
            Err(err) if err.is_device_lost() && !self.recovering => {
                warn!("{err} while rebuilding surface resources");
                self.handle_device_lost()
            }
            Err(err) => {
                self.release_surface_resources();
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Current rotation for the presentation step.
    pub fn compute_display_rotation(&self) -> DisplayRotation {
        self.metrics.display_rotation()
    }

    /// Checks that the device is healthy and still on the system default adapter.
    ///
    /// A removed or reset device, or an adapter change, triggers a full
    /// recovery. Loss is never returned as an error.
    pub fn validate_device(&mut self) -> Result<(), DeviceError> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };

        let reason = match self.backend.device_status(&device.handles) {
            DeviceStatus::Removed => Some(LossReason::Removed),
            DeviceStatus::Reset => Some(LossReason::Reset),
            DeviceStatus::Ok => match self.backend.current_adapter_id(&device.handles) {
                Ok(current) if current == device.adapter => None,
                Ok(current) => {
                    debug!("default adapter is now {current}, device runs on {}", device.adapter);
                    Some(LossReason::AdapterChanged)
                }
                Err(DeviceError::Lost(reason)) => Some(reason),
                Err(err) => return Err(err),
            },
        };

        match reason {
            Some(reason) => {
                warn!("device validation failed: {reason}");
                self.handle_device_lost()
            }
            None => Ok(()),
        }
    }

    /// Recreates the device and every surface-dependent resource.
    ///
    /// Order: `on_device_lost`, release, recreate from the recorded metrics,
    /// `on_device_restored`. Calling it while a recovery is running is an
    /// error. If recreation fails the manager stays in [`DeviceState::Lost`].
    pub fn handle_device_lost(&mut self) -> Result<(), DeviceError> {
        if self.recovering {
            return Err(DeviceError::RecoveryInProgress);
        }

        self.recovering = true;
        let result = self.recover();
        self.recovering = false;
        result
    }

    /// Hints the driver to release memory it holds for the device.
    pub fn trim(&mut self) {
        if let Some(device) = self.device.as_ref() {
            self.backend.trim(&device.handles);
            debug!("device memory trimmed");
        }
    }

    /// Presents the back buffer.
    ///
    /// A device loss reported by the present call is recovered before this
    /// returns; callers only see the notifications.
    pub fn present(&mut self) -> Result<(), DeviceError> {
        let (Some(device), Some(group)) = (self.device.as_ref(), self.swap_chain.as_mut()) else {
            return Err(DeviceError::NotReady(self.state));
        };

        match self.backend.present(&device.handles, &mut group.swap_chain) {
            Err(err) if err.is_device_lost() => {
                warn!("{err} on present");
                self.handle_device_lost()
            }
            result => result,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn factories(&self) -> &B::Factories {
        &self.factories
    }

    pub fn device(&self) -> Option<&B::Device> {
        self.device.as_ref().map(|d| &d.handles)
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        self.device.as_ref().map(|d| d.candidate.level)
    }

    pub fn adapter(&self) -> Option<&AdapterId> {
        self.device.as_ref().map(|d| &d.adapter)
    }

    pub fn surface(&self) -> Option<&B::Surface> {
        self.surface.as_ref()
    }

    pub fn swap_chain(&self) -> Option<&B::SwapChain> {
        self.swap_chain.as_ref().map(|g| &g.swap_chain)
    }

    pub fn swap_chain_desc(&self) -> Option<&SwapChainDesc> {
        self.swap_chain.as_ref().map(|g| &g.desc)
    }

    /// Render target view, depth-stencil view and 2D target bitmap.
    pub fn targets(&self) -> Option<&B::Targets> {
        self.targets.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn metrics(&self) -> &SurfaceMetrics {
        &self.metrics
    }

    pub fn logical_size(&self) -> LogicalSize {
        self.metrics.logical_size
    }

    pub fn dpi(&self) -> f32 {
        self.metrics.dpi
    }

    /// Unrotated output size in pixels.
    pub fn output_size(&self) -> PixelSize {
        self.output_size
    }

    /// Back-buffer size: the output size, transposed for 90 and 270 degree rotations.
    pub fn render_target_size(&self) -> PixelSize {
        self.render_target_size
    }

    pub fn display_rotation(&self) -> DisplayRotation {
        self.rotation
    }

    pub fn orientation_transform_2d(&self) -> Affine2 {
        self.transform_2d
    }

    pub fn orientation_transform_3d(&self) -> Mat4 {
        self.transform_3d
    }

    fn refresh_surface(&mut self) -> Result<(), DeviceError> {
        if self.surface.is_none() || self.device.is_none() {
            return Ok(());
        }
        self.create_window_size_dependent_resources()
    }

    fn build_surface_resources(&mut self) -> Result<(), DeviceError> {
        let (Some(surface), Some(device)) = (self.surface.as_ref(), self.device.as_mut()) else {
            return Err(DeviceError::NotReady(self.state));
        };

        if self.metrics.is_degenerate() {
            debug!("surface has no area; keeping current surface resources");
            return Ok(());
        }

        self.state = DeviceState::Resizing;

        // Buffers cannot be resized while views into them are alive.
        if let Some(targets) = self.targets.take() {
            self.backend.release_targets(&mut device.handles, targets);
        }

        self.output_size = self.metrics.output_size();
        self.rotation = self.metrics.display_rotation();
        self.render_target_size = if self.rotation.swaps_dimensions() {
            self.output_size.transposed()
        } else {
            self.output_size
        };

        let desc = SwapChainDesc {
            size: self.render_target_size,
            format: self.config.back_buffer_format,
            buffer_count: self.config.buffer_count(),
            present_mode: self.config.present_mode,
        };

        // Owned by `self` from here on; on loss only recovery releases it.
        let reusable = self
            .swap_chain
            .as_ref()
            .is_some_and(|group| group.desc.can_resize_to(&desc));
        if reusable {
            if let Some(group) = self.swap_chain.as_mut() {
                self.backend
                    .resize_swap_chain(&device.handles, &mut group.swap_chain, &desc)?;
                group.desc = desc;
                debug!("swap chain resized to {}x{}", desc.size.width, desc.size.height);
            }
        } else {
            self.swap_chain = None;
            let swap_chain = self.backend.create_swap_chain(&device.handles, surface, &desc)?;
            debug!("swap chain created at {}x{}", desc.size.width, desc.size.height);
            self.swap_chain = Some(SwapChainGroup { swap_chain, desc });
        }
        let Some(group) = self.swap_chain.as_mut() else {
            return Err(DeviceError::NotReady(self.state));
        };

        let scale = self.metrics.effective_scale();
        self.transform_2d = orientation_transform_2d(self.rotation, self.output_size, scale);
        self.transform_3d = orientation_transform_3d(self.rotation);

        let inverse_scale =
            valid_composition_scale(self.metrics.composition_scale).map_or(Vec2::ONE, |s| Vec2::ONE / s);
        self.backend.set_present_transform(
            &mut group.swap_chain,
            PresentTransform {
                rotation: self.rotation,
                inverse_scale,
            },
        )?;

        let targets = self.backend.create_targets(
            &mut device.handles,
            &group.swap_chain,
            &TargetDesc {
                size: self.render_target_size,
                depth_format: self.config.depth_format,
                dpi: self.metrics.dpi,
                transform_2d: self.transform_2d,
            },
        )?;

        self.targets = Some(targets);
        self.viewport = Viewport::from_size(self.render_target_size);
        self.state = DeviceState::SurfaceReady;
        Ok(())
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        warn!("graphics device lost; recreating device resources");
        self.state = DeviceState::Lost;

        if let Some(notify) = self.notify.as_ref().and_then(Weak::upgrade) {
            notify.on_device_lost();
        }

        self.release_device_resources();
        self.state = DeviceState::Lost;

        let restored = self.create_device_resources().and_then(|()| {
            if self.surface.is_some() {
                self.create_window_size_dependent_resources()
            } else {
                Ok(())
            }
        });

        if let Err(err) = restored {
            error!("device recovery failed: {err}");
            self.release_device_resources();
            self.state = DeviceState::Lost;
            return Err(DeviceError::RecoveryFailed(Box::new(err)));
        }

        if let Some(notify) = self.notify.as_ref().and_then(Weak::upgrade) {
            notify.on_device_restored(self);
        }

        info!("graphics device restored");
        Ok(())
    }

    fn release_surface_resources(&mut self) {
        if let (Some(targets), Some(device)) = (self.targets.take(), self.device.as_mut()) {
            self.backend.release_targets(&mut device.handles, targets);
        }
        self.swap_chain = None;

        if self.device.is_some() {
            self.state = DeviceState::DeviceReady;
        }
    }

    fn release_device_resources(&mut self) {
        self.release_surface_resources();
        self.device = None;
    }
}
