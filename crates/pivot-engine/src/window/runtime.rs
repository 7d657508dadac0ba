use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize as WinitLogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::coords::LogicalSize;
use crate::core::{App as CoreApp, AppControl, FrameCtx};
use crate::device::gpu::{SurfaceTarget, WgpuBackend};
use crate::device::{
    DEFAULT_DPI, DeviceConfig, DeviceError, DeviceNotify, DeviceResources, DeviceState,
    DisplayOrientation, SurfaceMetrics,
};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: WinitLogicalSize<f64>,
    /// Orientation the panel is mounted in. Desktop windows are landscape.
    pub native_orientation: DisplayOrientation,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "pivot".to_string(),
            initial_size: WinitLogicalSize::new(1280.0, 720.0),
            native_orientation: DisplayOrientation::Landscape,
        }
    }
}

/// Runtime context passed to the application.
///
/// Commands are buffered and applied after the current callback returns.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    /// Reports a new current display orientation, rebuilding surface resources.
    pub fn set_orientation(&mut self, orientation: DisplayOrientation) {
        self.commands.push(Command::SetOrientation(orientation));
    }

    /// Forces a device health check before the next frame.
    pub fn validate_device(&mut self) {
        self.commands.push(Command::ValidateDevice);
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }
}

#[derive(Debug)]
enum Command {
    SetOrientation(DisplayOrientation),
    ValidateDevice,
    Exit,
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Creates the device-independent resources, opens the window and runs
    /// the event loop until the app exits or a fatal device error occurs.
    pub fn run<A>(config: RuntimeConfig, device_config: DeviceConfig, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

        let resources = DeviceResources::new(WgpuBackend::new(), device_config)
            .context("failed to create device-independent resources")?;
        let mut state = AppState::new(config, resources, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err).context("graphics device failure"),
            None => Ok(()),
        }
    }
}

/// Forwards device notifications to the app.
struct AppSlot<A> {
    app: RefCell<A>,
}

impl<A: CoreApp> DeviceNotify<WgpuBackend> for AppSlot<A> {
    fn on_device_lost(&self) {
        match self.app.try_borrow_mut() {
            Ok(mut app) => app.on_device_lost(),
            Err(_) => log::error!("device lost while the app was busy; notification dropped"),
        }
    }

    fn on_device_restored(&self, resources: &DeviceResources<WgpuBackend>) {
        match self.app.try_borrow_mut() {
            Ok(mut app) => app.on_device_restored(resources),
            Err(_) => log::error!("device restored while the app was busy; notification dropped"),
        }
    }
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    // Declared before `window`: the surface must go before the window it targets.
    resources: DeviceResources<WgpuBackend>,
    app: Rc<AppSlot<A>>,
    window: Option<Arc<Window>>,

    frame_index: u64,
    exit_requested: bool,
    fatal: Option<DeviceError>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, mut resources: DeviceResources<WgpuBackend>, app: A) -> Self {
        let app = Rc::new(AppSlot {
            app: RefCell::new(app),
        });
        resources.register_device_notify(&app);

        Self {
            config,
            resources,
            app,
            window: None,
            frame_index: 0,
            exit_requested: false,
            fatal: None,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    /// Every error the manager returns is fatal; loss is recovered internally.
    fn check(&mut self, event_loop: &ActiveEventLoop, what: &str, result: Result<(), DeviceError>) {
        if let Err(err) = result {
            log::error!("{what} failed: {err}");
            self.fatal = Some(err);
            self.request_exit(event_loop);
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        Ok(Arc::new(window))
    }

    fn surface_metrics(&self, window: &Window) -> SurfaceMetrics {
        let scale = window.scale_factor();
        SurfaceMetrics {
            native_orientation: self.config.native_orientation,
            current_orientation: self.config.native_orientation,
            ..SurfaceMetrics::new(
                logical_size_of(window.inner_size(), scale),
                dpi_for_scale_factor(scale),
            )
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, window: &Window) {
        if self.resources.state() != DeviceState::SurfaceReady {
            return;
        }

        let mut runtime_ctx = RuntimeCtx::default();
        let control = {
            let mut ctx = FrameCtx {
                window,
                resources: &self.resources,
                runtime: &mut runtime_ctx,
                frame_index: self.frame_index,
            };
            self.app.app.borrow_mut().on_frame(&mut ctx)
        };
        self.frame_index += 1;

        if control == AppControl::Exit {
            runtime_ctx.exit();
        }

        window.pre_present_notify();
        let presented = self.resources.present();
        self.check(event_loop, "present", presented);

        self.apply_commands(event_loop, runtime_ctx);
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, mut ctx: RuntimeCtx) {
        for cmd in ctx.commands.drain(..) {
            match cmd {
                Command::SetOrientation(orientation) => {
                    log::info!("display orientation is now {orientation:?}");
                    let result = self.resources.set_current_orientation(orientation);
                    self.check(event_loop, "orientation change", result);
                }
                Command::ValidateDevice => {
                    let result = self.resources.validate_device();
                    self.check(event_loop, "device validation", result);
                }
                Command::Exit => self.request_exit(event_loop),
            }
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(e) => {
                log::error!("failed to create initial window: {e:#}");
                self.request_exit(event_loop);
                return;
            }
        };

        let metrics = self.surface_metrics(&window);
        let surface: SurfaceTarget = window.clone();
        let attached = self.resources.attach_surface(surface, metrics);
        self.check(event_loop, "surface attachment", attached);

        window.request_redraw();
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(window) = self.window.clone() else {
            return;
        };

        if self.app.app.borrow_mut().on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(size) => {
                let result = self
                    .resources
                    .set_logical_size(logical_size_of(size, window.scale_factor()));
                self.check(event_loop, "resize", result);
                window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let result = self
                    .resources
                    .set_dpi(dpi_for_scale_factor(scale_factor))
                    .and_then(|()| {
                        self.resources
                            .set_logical_size(logical_size_of(window.inner_size(), scale_factor))
                    });
                self.check(event_loop, "dpi change", result);
                window.request_redraw();
            }

            // Hidden windows give their temporary allocations back.
            WindowEvent::Occluded(true) => self.resources.trim(),

            WindowEvent::Focused(true) => {
                let result = self.resources.validate_device();
                self.check(event_loop, "device validation", result);
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop, &window),

            _ => {}
        }
    }
}

fn dpi_for_scale_factor(scale_factor: f64) -> f32 {
    (scale_factor as f32) * DEFAULT_DPI
}

fn logical_size_of(size: PhysicalSize<u32>, scale_factor: f64) -> LogicalSize {
    let logical: WinitLogicalSize<f64> = size.to_logical(scale_factor);
    LogicalSize::new(logical.width as f32, logical.height as f32)
}
