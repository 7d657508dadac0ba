use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat2, Vec2};

use pivot_engine::coords::{LogicalSize, PixelSize, Viewport};
use pivot_engine::device::headless::{
    HARDWARE_VENDOR, HeadlessBackend, HeadlessEvent, HeadlessSurface, SOFTWARE_VENDOR,
};
use pivot_engine::device::{
    DeviceConfig, DeviceError, DeviceNotify, DeviceResources, DeviceState, DisplayOrientation,
    DisplayRotation, FeatureLevel, LossReason, SurfaceMetrics,
};

type Resources = DeviceResources<HeadlessBackend>;

fn manager() -> (HeadlessBackend, Resources) {
    let backend = HeadlessBackend::new();
    let resources = DeviceResources::new(backend.clone(), DeviceConfig::default())
        .expect("factories are infallible on the headless backend");
    (backend, resources)
}

fn metrics(width: f32, height: f32, dpi: f32) -> SurfaceMetrics {
    SurfaceMetrics::new(LogicalSize::new(width, height), dpi)
}

fn attached(width: f32, height: f32, dpi: f32) -> (HeadlessBackend, Resources) {
    let (backend, mut resources) = manager();
    resources
        .attach_surface(HeadlessSurface::new(1), metrics(width, height, dpi))
        .expect("attach");
    (backend, resources)
}

fn device_id(resources: &Resources) -> u64 {
    resources.device().expect("device").id()
}

fn swap_chain_id(resources: &Resources) -> u64 {
    resources.swap_chain().expect("swap chain").id()
}

/// Records notifications along with how many devices were alive at the time.
struct Recorder {
    backend: HeadlessBackend,
    log: RefCell<Vec<String>>,
    swap_chains_at_loss: RefCell<Vec<usize>>,
}

impl Recorder {
    fn register(resources: &mut Resources, backend: &HeadlessBackend) -> Rc<Recorder> {
        let recorder = Rc::new(Recorder {
            backend: backend.clone(),
            log: RefCell::new(Vec::new()),
            swap_chains_at_loss: RefCell::new(Vec::new()),
        });
        resources.register_device_notify(&recorder);
        recorder
    }

    fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn swap_chains_at_loss(&self) -> Vec<usize> {
        self.swap_chains_at_loss.borrow().clone()
    }
}

impl DeviceNotify<HeadlessBackend> for Recorder {
    fn on_device_lost(&self) {
        let live = self.backend.live_devices();
        self.log.borrow_mut().push(format!("lost live={live}"));
        self.swap_chains_at_loss
            .borrow_mut()
            .push(self.backend.live_swap_chains());
    }

    fn on_device_restored(&self, resources: &Resources) {
        let live = self.backend.live_devices();
        let state = resources.state();
        let has_swap_chain = resources.swap_chain().is_some();
        self.log
            .borrow_mut()
            .push(format!("restored live={live} state={state} swap_chain={has_swap_chain}"));
    }
}

#[test]
fn attach_builds_every_resource_group() {
    let (backend, resources) = attached(800.0, 600.0, 96.0);

    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert_eq!(resources.feature_level(), Some(FeatureLevel::Full));
    assert_eq!(resources.output_size(), PixelSize::new(800, 600));
    assert_eq!(resources.render_target_size(), PixelSize::new(800, 600));
    assert_eq!(resources.viewport(), Viewport::new(800.0, 600.0));
    assert_eq!(resources.display_rotation(), DisplayRotation::Identity);

    assert_eq!(backend.live_devices(), 1);
    assert_eq!(backend.live_swap_chains(), 1);
    assert_eq!(backend.live_targets(), 1);

    let device = resources.device().expect("device");
    let targets = resources.targets().expect("targets");
    assert_eq!(device.bound_target(), Some(targets.id()));
    assert_eq!(targets.dpi(), 96.0);
}

#[test]
fn portrait_on_landscape_panel_prerotates_by_90() {
    let (backend, mut resources) = manager();
    let m = SurfaceMetrics {
        native_orientation: DisplayOrientation::Landscape,
        current_orientation: DisplayOrientation::Portrait,
        ..metrics(800.0, 600.0, 96.0)
    };
    resources
        .attach_surface(HeadlessSurface::new(7), m)
        .expect("attach");

    assert_eq!(resources.display_rotation(), DisplayRotation::Rotate90);
    assert_eq!(resources.output_size(), PixelSize::new(800, 600));
    assert_eq!(resources.render_target_size(), PixelSize::new(600, 800));
    assert_eq!(resources.viewport(), Viewport::new(600.0, 800.0));

    let swap_chain = resources.swap_chain().expect("swap chain");
    assert_eq!(swap_chain.desc().size, PixelSize::new(600, 800));
    assert_eq!(
        swap_chain.transform().map(|t| t.rotation),
        Some(DisplayRotation::Rotate90)
    );
    assert_eq!(
        resources.targets().expect("targets").size(),
        PixelSize::new(600, 800)
    );

    // The logical origin lands on the right edge of the buffer.
    let origin = resources.orientation_transform_2d().transform_point2(Vec2::ZERO);
    assert_eq!(origin, Vec2::new(600.0, 0.0));
    assert!(
        backend
            .events()
            .contains(&HeadlessEvent::SwapChainCreated {
                id: swap_chain.id(),
                size: PixelSize::new(600, 800)
            })
    );
}

#[test]
fn dpi_change_resizes_in_place() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let device = device_id(&resources);
    let swap_chain = swap_chain_id(&resources);
    backend.take_events();

    resources.set_dpi(192.0).expect("dpi change");

    assert_eq!(device_id(&resources), device);
    assert_eq!(swap_chain_id(&resources), swap_chain);
    assert_eq!(resources.output_size(), PixelSize::new(1600, 1200));
    assert_eq!(resources.dpi(), 192.0);
    assert_eq!(resources.targets().expect("targets").dpi(), 192.0);

    let events = backend.take_events();
    let released = events
        .iter()
        .position(|e| matches!(e, HeadlessEvent::TargetsReleased { .. }))
        .expect("targets released");
    let resized = events
        .iter()
        .position(|e| {
            *e == HeadlessEvent::SwapChainResized {
                id: swap_chain,
                size: PixelSize::new(1600, 1200),
            }
        })
        .expect("swap chain resized");
    let created = events
        .iter()
        .position(|e| matches!(e, HeadlessEvent::TargetsCreated { .. }))
        .expect("targets created");
    assert!(released < resized && resized < created);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, HeadlessEvent::DeviceCreated { .. }))
    );
}

#[test]
fn doubling_dpi_doubles_output_of_fixed_logical_size() {
    let (backend, mut resources) = attached(400.0, 300.0, 96.0);
    assert_eq!(resources.output_size(), PixelSize::new(400, 300));
    let device = device_id(&resources);
    let swap_chain = swap_chain_id(&resources);
    backend.take_events();

    resources.set_dpi(192.0).expect("dpi change");

    assert_eq!(resources.logical_size(), LogicalSize::new(400.0, 300.0));
    assert_eq!(resources.output_size(), PixelSize::new(800, 600));
    assert_eq!(resources.viewport(), Viewport::new(800.0, 600.0));
    assert_eq!(device_id(&resources), device);
    assert_eq!(swap_chain_id(&resources), swap_chain);
    assert_eq!(
        resources.swap_chain().expect("swap chain").desc().size,
        PixelSize::new(800, 600)
    );
    assert!(
        !backend
            .take_events()
            .iter()
            .any(|e| matches!(e, HeadlessEvent::SwapChainCreated { .. }))
    );
}

#[test]
fn rebuilding_with_same_inputs_is_deterministic() {
    let (_backend, mut resources) = manager();
    let m = SurfaceMetrics {
        current_orientation: DisplayOrientation::Portrait,
        ..metrics(800.0, 600.0, 144.0)
    };
    resources
        .attach_surface(HeadlessSurface::new(1), m)
        .expect("attach");

    let snapshot = |r: &Resources| {
        (
            r.viewport(),
            r.output_size(),
            r.render_target_size(),
            r.orientation_transform_2d(),
            r.orientation_transform_3d(),
        )
    };
    let first = snapshot(&resources);

    resources
        .create_window_size_dependent_resources()
        .expect("first rebuild");
    let second = snapshot(&resources);
    resources
        .create_window_size_dependent_resources()
        .expect("second rebuild");
    let third = snapshot(&resources);

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn manager_transforms_invert_each_other_in_every_orientation() {
    let (_backend, mut resources) = attached(800.0, 600.0, 96.0);

    for orientation in [
        DisplayOrientation::Portrait,
        DisplayOrientation::LandscapeFlipped,
        DisplayOrientation::PortraitFlipped,
        DisplayOrientation::Landscape,
    ] {
        resources
            .set_current_orientation(orientation)
            .expect("rotate");

        let m2 = resources.orientation_transform_2d().matrix2;
        let m3 = resources.orientation_transform_3d();
        let upper = Mat2::from_cols(
            m3.x_axis.truncate().truncate(),
            m3.y_axis.truncate().truncate(),
        );
        assert!(
            (m2 * upper).abs_diff_eq(Mat2::IDENTITY, 1e-6),
            "{orientation:?}: {m2:?} * {upper:?}"
        );
    }
}

#[test]
fn unchanged_values_do_not_rebuild() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    backend.take_events();

    resources
        .set_logical_size(LogicalSize::new(800.0, 600.0))
        .expect("size");
    resources.set_dpi(96.0).expect("dpi");
    resources
        .set_current_orientation(DisplayOrientation::Landscape)
        .expect("orientation");
    resources
        .set_native_orientation(DisplayOrientation::Landscape)
        .expect("native orientation");

    assert!(backend.take_events().is_empty());
}

#[test]
fn orientation_change_swaps_buffer_dimensions() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let swap_chain = swap_chain_id(&resources);
    backend.take_events();

    resources
        .set_current_orientation(DisplayOrientation::PortraitFlipped)
        .expect("rotate");

    assert_eq!(resources.display_rotation(), DisplayRotation::Rotate270);
    assert_eq!(resources.render_target_size(), PixelSize::new(600, 800));
    assert!(backend.events().contains(&HeadlessEvent::SwapChainResized {
        id: swap_chain,
        size: PixelSize::new(600, 800),
    }));

    resources
        .set_current_orientation(DisplayOrientation::LandscapeFlipped)
        .expect("rotate back");
    assert_eq!(resources.display_rotation(), DisplayRotation::Rotate180);
    assert_eq!(resources.render_target_size(), PixelSize::new(800, 600));
}

#[test]
fn composition_scale_overrides_dpi() {
    let (_backend, mut resources) = attached(800.0, 600.0, 96.0);

    resources.set_composition_scale(2.0, 2.0).expect("scale");

    assert_eq!(resources.output_size(), PixelSize::new(1600, 1200));
    let transform = resources
        .swap_chain()
        .and_then(|s| s.transform())
        .expect("present transform");
    assert_eq!(transform.inverse_scale, Vec2::splat(0.5));
}

#[test]
fn invalid_composition_scale_is_ignored() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    backend.take_events();

    resources.set_composition_scale(0.0, 1.0).expect("ignored");
    resources.set_composition_scale(f32::INFINITY, 2.0).expect("ignored");
    resources.set_composition_scale(-1.0, -1.0).expect("ignored");

    assert!(backend.take_events().is_empty());
    assert_eq!(resources.metrics().composition_scale, None);
    assert_eq!(resources.output_size(), PixelSize::new(800, 600));
    let transform = resources
        .swap_chain()
        .and_then(|s| s.transform())
        .expect("present transform");
    assert_eq!(transform.inverse_scale, Vec2::ONE);
}

#[test]
fn invalid_composition_scale_in_attach_metrics_keeps_finite_transform() {
    let (_backend, mut resources) = manager();
    let m = SurfaceMetrics {
        composition_scale: Some(Vec2::new(0.0, 1.0)),
        ..metrics(800.0, 600.0, 96.0)
    };
    resources
        .attach_surface(HeadlessSurface::new(1), m)
        .expect("attach");

    assert_eq!(resources.output_size(), PixelSize::new(800, 600));
    let transform = resources
        .swap_chain()
        .and_then(|s| s.transform())
        .expect("present transform");
    assert_eq!(transform.inverse_scale, Vec2::ONE);
}

#[test]
fn zero_area_keeps_previous_resources() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    backend.take_events();

    resources
        .set_logical_size(LogicalSize::new(0.0, 600.0))
        .expect("minimize");

    assert!(backend.take_events().is_empty());
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert_eq!(resources.render_target_size(), PixelSize::new(800, 600));
    assert!(resources.targets().is_some());
}

#[test]
fn zero_area_attach_creates_device_only() {
    let (backend, mut resources) = manager();
    resources
        .attach_surface(HeadlessSurface::new(1), metrics(0.0, 0.0, 96.0))
        .expect("attach");

    assert_eq!(resources.state(), DeviceState::DeviceReady);
    assert!(resources.swap_chain().is_none());
    assert_eq!(backend.live_devices(), 1);

    resources
        .set_logical_size(LogicalSize::new(320.0, 240.0))
        .expect("restore");
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert_eq!(resources.render_target_size(), PixelSize::new(320, 240));
}

#[test]
fn recovery_with_zero_area_surface_restores_device_only() {
    let (backend, mut resources) = manager();
    resources
        .attach_surface(HeadlessSurface::new(1), metrics(0.0, 0.0, 96.0))
        .expect("attach");
    let recorder = Recorder::register(&mut resources, &backend);

    resources.handle_device_lost().expect("recovery");

    assert_eq!(
        recorder.entries(),
        vec![
            "lost live=1".to_string(),
            "restored live=1 state=device ready swap_chain=false".to_string(),
        ]
    );

    resources
        .set_logical_size(LogicalSize::new(320.0, 240.0))
        .expect("grow");
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert!(resources.swap_chain().is_some());
}

#[test]
fn present_loss_runs_one_recovery_cycle() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);
    let old_device = device_id(&resources);

    backend.fail_next_present(LossReason::Removed);
    resources.present().expect("loss is recovered internally");

    assert_eq!(
        recorder.entries(),
        vec![
            "lost live=1".to_string(),
            "restored live=1 state=surface ready swap_chain=true".to_string(),
        ]
    );
    assert_ne!(device_id(&resources), old_device);
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert_eq!(backend.live_devices(), 1);
    assert_eq!(backend.live_swap_chains(), 1);
    assert_eq!(backend.live_targets(), 1);
    assert_eq!(resources.render_target_size(), PixelSize::new(800, 600));

    resources.present().expect("present on the new device");
    assert_eq!(backend.presents(), 1);
    assert_eq!(recorder.entries().len(), 2);
}

#[test]
fn recovery_releases_surface_before_device() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let old_device = device_id(&resources);
    let old_swap_chain = swap_chain_id(&resources);
    backend.take_events();

    resources.handle_device_lost().expect("recovery");

    let events = backend.take_events();
    let pos = |wanted: HeadlessEvent| {
        events
            .iter()
            .position(|e| *e == wanted)
            .unwrap_or_else(|| panic!("missing {wanted:?} in {events:?}"))
    };
    let targets_gone = events
        .iter()
        .position(|e| matches!(e, HeadlessEvent::TargetsReleased { .. }))
        .expect("targets released");
    let swap_chain_gone = pos(HeadlessEvent::SwapChainReleased { id: old_swap_chain });
    let device_gone = pos(HeadlessEvent::DeviceReleased { id: old_device });
    let device_new = events
        .iter()
        .position(|e| matches!(e, HeadlessEvent::DeviceCreated { .. }))
        .expect("device recreated");

    assert!(targets_gone < swap_chain_gone);
    assert!(swap_chain_gone < device_gone);
    assert!(device_gone < device_new);
}

#[test]
fn loss_during_resize_recovers_at_new_size() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);

    backend.fail_next_resize(LossReason::Reset);
    resources.set_dpi(192.0).expect("recovered");

    assert_eq!(recorder.entries().len(), 2);
    // The observer runs while the failed swap chain still exists.
    assert_eq!(recorder.swap_chains_at_loss(), vec![1]);
    assert_eq!(backend.live_swap_chains(), 1);
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
    assert_eq!(
        resources.swap_chain().expect("swap chain").desc().size,
        PixelSize::new(1600, 1200)
    );
}

#[test]
fn validation_detects_adapter_change() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);

    resources.validate_device().expect("healthy device");
    assert!(recorder.entries().is_empty());

    backend.swap_adapter();
    resources.validate_device().expect("recovered");

    assert_eq!(recorder.entries().len(), 2);
    let adapter = resources.adapter().expect("adapter");
    assert_eq!(adapter.vendor, HARDWARE_VENDOR);
    assert_eq!(adapter.device, 2);
}

#[test]
fn validation_detects_removed_device() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);
    let old_device = device_id(&resources);

    backend.remove_device(LossReason::Reset);
    resources.validate_device().expect("recovered");

    assert_eq!(recorder.entries().len(), 2);
    assert_ne!(device_id(&resources), old_device);
}

#[test]
fn falls_back_to_lower_feature_level() {
    let (backend, mut resources) = manager();
    backend.set_hardware_level(Some(FeatureLevel::Downlevel));

    resources
        .attach_surface(HeadlessSurface::new(1), metrics(640.0, 480.0, 96.0))
        .expect("attach");

    assert_eq!(resources.feature_level(), Some(FeatureLevel::Downlevel));
    assert_eq!(resources.adapter().map(|a| a.vendor), Some(HARDWARE_VENDOR));
}

#[test]
fn falls_back_to_software_adapter() {
    let (backend, mut resources) = manager();
    backend.set_hardware_level(None);

    resources
        .attach_surface(HeadlessSurface::new(1), metrics(640.0, 480.0, 96.0))
        .expect("attach");

    assert_eq!(resources.feature_level(), Some(FeatureLevel::Full));
    assert_eq!(resources.adapter().map(|a| a.vendor), Some(SOFTWARE_VENDOR));
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
}

#[test]
fn device_creation_failure_is_fatal() {
    let (backend, mut resources) = manager();
    backend.set_creation_fails(true);

    let err = resources
        .attach_surface(HeadlessSurface::new(1), metrics(640.0, 480.0, 96.0))
        .unwrap_err();

    assert!(matches!(err, DeviceError::NoSupportedFeatureLevel { tried: 6 }));
    assert_eq!(resources.state(), DeviceState::Uninitialized);
    assert!(resources.device().is_none());
    assert_eq!(backend.live_devices(), 0);
}

#[test]
fn swap_chain_failure_leaves_device_ready() {
    let (backend, mut resources) = manager();
    backend.fail_next_swap_chain();

    let err = resources
        .attach_surface(HeadlessSurface::new(1), metrics(640.0, 480.0, 96.0))
        .unwrap_err();

    assert!(matches!(err, DeviceError::OutOfMemory));
    assert_eq!(resources.state(), DeviceState::DeviceReady);
    assert!(resources.swap_chain().is_none());
    assert!(resources.targets().is_none());
    assert_eq!(backend.live_devices(), 1);
}

#[test]
fn failed_recovery_stays_lost() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);

    backend.set_creation_fails(true);
    backend.fail_next_present(LossReason::Removed);
    let err = resources.present().unwrap_err();

    assert!(matches!(err, DeviceError::RecoveryFailed(_)));
    assert_eq!(resources.state(), DeviceState::Lost);
    assert!(resources.device().is_none());
    assert_eq!(backend.live_devices(), 0);
    assert_eq!(recorder.entries(), vec!["lost live=1".to_string()]);

    // A later explicit recovery succeeds once the driver is back.
    backend.set_creation_fails(false);
    resources.handle_device_lost().expect("second recovery");
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
}

#[test]
fn dropped_observer_is_skipped() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let recorder = Recorder::register(&mut resources, &backend);
    drop(recorder);

    backend.fail_next_present(LossReason::Removed);
    resources.present().expect("recovered without observer");
    assert_eq!(resources.state(), DeviceState::SurfaceReady);
}

#[test]
fn present_before_attach_is_not_ready() {
    let (_backend, mut resources) = manager();
    let err = resources.present().unwrap_err();
    assert!(matches!(
        err,
        DeviceError::NotReady(DeviceState::Uninitialized)
    ));
}

#[test]
fn trim_reaches_the_backend() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let device = device_id(&resources);
    backend.take_events();

    resources.trim();

    assert_eq!(backend.take_events(), vec![HeadlessEvent::Trimmed { device }]);
}

#[test]
fn reattach_replaces_swap_chain_and_keeps_device() {
    let (backend, mut resources) = attached(800.0, 600.0, 96.0);
    let device = device_id(&resources);
    let old_swap_chain = swap_chain_id(&resources);

    resources
        .attach_surface(HeadlessSurface::new(2), metrics(1024.0, 768.0, 96.0))
        .expect("reattach");

    assert_eq!(device_id(&resources), device);
    assert_ne!(swap_chain_id(&resources), old_swap_chain);
    assert_eq!(resources.surface(), Some(&HeadlessSurface::new(2)));
    assert_eq!(backend.live_swap_chains(), 1);
    assert_eq!(resources.render_target_size(), PixelSize::new(1024, 768));
}
