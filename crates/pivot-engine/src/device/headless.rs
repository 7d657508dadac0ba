//! GPU-less backend that records every call.
//!
//! Used by tests and tooling to drive [`DeviceResources`](super::DeviceResources)
//! through creation, resizing, rotation and loss without a graphics driver.
//! Faults are injected through the shared handle: cloning the backend before
//! handing it to the manager keeps a handle for the test.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Affine2;

use crate::coords::PixelSize;

use super::backend::{
    AdapterId, Backend, DeviceStatus, PresentTransform, SwapChainDesc, TargetDesc,
};
use super::{AdapterKind, DeviceCandidate, DeviceConfig, DeviceError, FeatureLevel, LossReason};

pub const HARDWARE_VENDOR: u32 = 0x1234;
pub const SOFTWARE_VENDOR: u32 = 0x1414;
pub const SOFTWARE_DEVICE: u32 = 0x8c;

/// One recorded backend call or object release.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessEvent {
    FactoriesCreated,
    DeviceCreated { id: u64, candidate: DeviceCandidate },
    DeviceReleased { id: u64 },
    SwapChainCreated { id: u64, size: PixelSize },
    SwapChainResized { id: u64, size: PixelSize },
    SwapChainReleased { id: u64 },
    PresentTransformSet { id: u64, transform: PresentTransform },
    TargetsCreated { id: u64, size: PixelSize },
    TargetsReleased { id: u64 },
    Presented { swap_chain: u64 },
    Trimmed { device: u64 },
}

#[derive(Debug)]
struct HeadlessState {
    events: Vec<HeadlessEvent>,
    next_id: u64,

    hardware_level: Option<FeatureLevel>,
    software_available: bool,
    creation_fails: bool,
    adapter_generation: u32,

    lost: Option<(u64, LossReason)>,
    fail_next_present: Option<LossReason>,
    fail_next_resize: Option<LossReason>,
    fail_next_swap_chain: bool,

    live_devices: usize,
    live_swap_chains: usize,
    live_targets: usize,
    presents: usize,
}

impl HeadlessState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn hardware_adapter(&self) -> AdapterId {
        AdapterId {
            vendor: HARDWARE_VENDOR,
            device: self.adapter_generation,
            name: format!("Headless GPU {}", self.adapter_generation),
        }
    }

    fn loss_for(&self, device: u64) -> Option<LossReason> {
        self.lost
            .filter(|(id, _)| *id == device)
            .map(|(_, reason)| reason)
    }
}

type Shared = Rc<RefCell<HeadlessState>>;

/// Recording backend with fault injection.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    state: Shared,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadlessSurface {
    pub id: u64,
}

impl HeadlessSurface {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

#[derive(Debug)]
pub struct HeadlessFactories {
    pub debug: bool,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    id: u64,
    adapter: AdapterId,
    kind: AdapterKind,
    bound_target: Option<u64>,
    state: Shared,
}

impl HeadlessDevice {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Targets currently bound to the 2D context.
    pub fn bound_target(&self) -> Option<u64> {
        self.bound_target
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live_devices -= 1;
        state.events.push(HeadlessEvent::DeviceReleased { id: self.id });
    }
}

#[derive(Debug)]
pub struct HeadlessSwapChain {
    id: u64,
    device: u64,
    desc: SwapChainDesc,
    transform: Option<PresentTransform>,
    outstanding_targets: Rc<RefCell<usize>>,
    state: Shared,
}

impl HeadlessSwapChain {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn desc(&self) -> &SwapChainDesc {
        &self.desc
    }

    pub fn transform(&self) -> Option<PresentTransform> {
        self.transform
    }
}

impl Drop for HeadlessSwapChain {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live_swap_chains -= 1;
        state.events.push(HeadlessEvent::SwapChainReleased { id: self.id });
    }
}

#[derive(Debug)]
pub struct HeadlessTargets {
    id: u64,
    size: PixelSize,
    dpi: f32,
    transform_2d: Affine2,
    swap_chain_refs: Rc<RefCell<usize>>,
    state: Shared,
}

impl HeadlessTargets {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    pub fn transform_2d(&self) -> Affine2 {
        self.transform_2d
    }
}

impl Drop for HeadlessTargets {
    fn drop(&mut self) {
        *self.swap_chain_refs.borrow_mut() -= 1;
        let mut state = self.state.borrow_mut();
        state.live_targets -= 1;
        state.events.push(HeadlessEvent::TargetsReleased { id: self.id });
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// Full-level hardware adapter plus a software fallback.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                events: Vec::new(),
                next_id: 0,
                hardware_level: Some(FeatureLevel::Full),
                software_available: true,
                creation_fails: false,
                adapter_generation: 1,
                lost: None,
                fail_next_present: None,
                fail_next_resize: None,
                fail_next_swap_chain: false,
                live_devices: 0,
                live_swap_chains: 0,
                live_targets: 0,
                presents: 0,
            })),
        }
    }

    /// Caps the hardware adapter at `level`; `None` removes it entirely.
    pub fn set_hardware_level(&self, level: Option<FeatureLevel>) {
        self.state.borrow_mut().hardware_level = level;
    }

    pub fn set_software_available(&self, available: bool) {
        self.state.borrow_mut().software_available = available;
    }

    /// Makes every device creation fail regardless of candidate.
    pub fn set_creation_fails(&self, fails: bool) {
        self.state.borrow_mut().creation_fails = fails;
    }

    /// Marks the most recently created device as lost.
    pub fn remove_device(&self, reason: LossReason) {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        let device = state.events.iter().rev().find_map(|e| match e {
            HeadlessEvent::DeviceCreated { id, .. } => Some(*id),
            _ => None,
        });
        state.lost = Some((device.unwrap_or(id), reason));
    }

    pub fn fail_next_present(&self, reason: LossReason) {
        self.state.borrow_mut().fail_next_present = Some(reason);
    }

    pub fn fail_next_resize(&self, reason: LossReason) {
        self.state.borrow_mut().fail_next_resize = Some(reason);
    }

    /// The next swap chain creation fails with [`DeviceError::OutOfMemory`].
    pub fn fail_next_swap_chain(&self) {
        self.state.borrow_mut().fail_next_swap_chain = true;
    }

    /// Simulates the system default hardware adapter changing.
    pub fn swap_adapter(&self) {
        self.state.borrow_mut().adapter_generation += 1;
    }

    pub fn events(&self) -> Vec<HeadlessEvent> {
        self.state.borrow().events.clone()
    }

    pub fn take_events(&self) -> Vec<HeadlessEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    pub fn live_devices(&self) -> usize {
        self.state.borrow().live_devices
    }

    pub fn live_swap_chains(&self) -> usize {
        self.state.borrow().live_swap_chains
    }

    pub fn live_targets(&self) -> usize {
        self.state.borrow().live_targets
    }

    pub fn presents(&self) -> usize {
        self.state.borrow().presents
    }

    fn check_device(&self, device: &HeadlessDevice) -> Result<(), DeviceError> {
        match self.state.borrow().loss_for(device.id) {
            Some(reason) => Err(DeviceError::Lost(reason)),
            None => Ok(()),
        }
    }
}

impl Backend for HeadlessBackend {
    type Surface = HeadlessSurface;
    type Factories = HeadlessFactories;
    type Device = HeadlessDevice;
    type SwapChain = HeadlessSwapChain;
    type Targets = HeadlessTargets;

    fn create_factories(&mut self, config: &DeviceConfig) -> Result<HeadlessFactories, DeviceError> {
        self.state.borrow_mut().events.push(HeadlessEvent::FactoriesCreated);
        Ok(HeadlessFactories {
            debug: config.debug,
        })
    }

    fn create_device(
        &mut self,
        _factories: &HeadlessFactories,
        candidate: DeviceCandidate,
        _config: &DeviceConfig,
    ) -> Result<HeadlessDevice, DeviceError> {
        let mut state = self.state.borrow_mut();
        if state.creation_fails {
            return Err(DeviceError::Backend("device creation failed".into()));
        }

        let adapter = match candidate.adapter {
            AdapterKind::Hardware => match state.hardware_level {
                None => return Err(DeviceError::Backend("no hardware adapter".into())),
                Some(max) if max.satisfies(candidate.level) => state.hardware_adapter(),
                Some(_) => return Err(DeviceError::FeatureLevelUnsupported(candidate.level)),
            },
            AdapterKind::Software if state.software_available => AdapterId {
                vendor: SOFTWARE_VENDOR,
                device: SOFTWARE_DEVICE,
                name: "Headless Software Rasterizer".into(),
            },
            AdapterKind::Software => {
                return Err(DeviceError::Backend("no software adapter".into()));
            }
        };

        let id = state.next_id();
        state.live_devices += 1;
        state.events.push(HeadlessEvent::DeviceCreated { id, candidate });

        Ok(HeadlessDevice {
            id,
            adapter,
            kind: candidate.adapter,
            bound_target: None,
            state: self.state.clone(),
        })
    }

    fn adapter_id(&self, device: &HeadlessDevice) -> AdapterId {
        device.adapter.clone()
    }

    fn current_adapter_id(&mut self, device: &HeadlessDevice) -> Result<AdapterId, DeviceError> {
        self.check_device(device)?;
        match device.kind {
            AdapterKind::Hardware => Ok(self.state.borrow().hardware_adapter()),
            AdapterKind::Software => Ok(device.adapter.clone()),
        }
    }

    fn device_status(&self, device: &HeadlessDevice) -> DeviceStatus {
        match self.state.borrow().loss_for(device.id) {
            None => DeviceStatus::Ok,
            Some(LossReason::Reset) => DeviceStatus::Reset,
            Some(_) => DeviceStatus::Removed,
        }
    }

    fn create_swap_chain(
        &mut self,
        device: &HeadlessDevice,
        surface: &HeadlessSurface,
        desc: &SwapChainDesc,
    ) -> Result<HeadlessSwapChain, DeviceError> {
        self.check_device(device)?;

        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next_swap_chain) {
            return Err(DeviceError::OutOfMemory);
        }

        let id = state.next_id();
        state.live_swap_chains += 1;
        state.events.push(HeadlessEvent::SwapChainCreated {
            id,
            size: desc.size,
        });
        log::trace!("headless swap chain {id} on surface {}", surface.id);

        Ok(HeadlessSwapChain {
            id,
            device: device.id,
            desc: *desc,
            transform: None,
            outstanding_targets: Rc::new(RefCell::new(0)),
            state: self.state.clone(),
        })
    }

    fn resize_swap_chain(
        &mut self,
        device: &HeadlessDevice,
        swap_chain: &mut HeadlessSwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), DeviceError> {
        self.check_device(device)?;

        if *swap_chain.outstanding_targets.borrow() > 0 {
            return Err(DeviceError::Backend(
                "swap chain resized while back-buffer views are alive".into(),
            ));
        }

        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_next_resize.take() {
            state.lost = Some((device.id, reason));
            return Err(DeviceError::Lost(reason));
        }

        swap_chain.desc = *desc;
        state.events.push(HeadlessEvent::SwapChainResized {
            id: swap_chain.id,
            size: desc.size,
        });
        Ok(())
    }

    fn set_present_transform(
        &mut self,
        swap_chain: &mut HeadlessSwapChain,
        transform: PresentTransform,
    ) -> Result<(), DeviceError> {
        swap_chain.transform = Some(transform);
        self.state
            .borrow_mut()
            .events
            .push(HeadlessEvent::PresentTransformSet {
                id: swap_chain.id,
                transform,
            });
        Ok(())
    }

    fn create_targets(
        &mut self,
        device: &mut HeadlessDevice,
        swap_chain: &HeadlessSwapChain,
        desc: &TargetDesc,
    ) -> Result<HeadlessTargets, DeviceError> {
        self.check_device(device)?;
        if swap_chain.device != device.id {
            return Err(DeviceError::Backend("swap chain belongs to another device".into()));
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.live_targets += 1;
        state.events.push(HeadlessEvent::TargetsCreated {
            id,
            size: desc.size,
        });

        *swap_chain.outstanding_targets.borrow_mut() += 1;
        device.bound_target = Some(id);

        Ok(HeadlessTargets {
            id,
            size: desc.size,
            dpi: desc.dpi,
            transform_2d: desc.transform_2d,
            swap_chain_refs: swap_chain.outstanding_targets.clone(),
            state: self.state.clone(),
        })
    }

    fn release_targets(&mut self, device: &mut HeadlessDevice, targets: HeadlessTargets) {
        if device.bound_target == Some(targets.id) {
            device.bound_target = None;
        }
        drop(targets);
    }

    fn present(
        &mut self,
        device: &HeadlessDevice,
        swap_chain: &mut HeadlessSwapChain,
    ) -> Result<(), DeviceError> {
        self.check_device(device)?;

        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_next_present.take() {
            state.lost = Some((device.id, reason));
            return Err(DeviceError::Lost(reason));
        }

        state.presents += 1;
        state.events.push(HeadlessEvent::Presented {
            swap_chain: swap_chain.id,
        });
        Ok(())
    }

    fn trim(&mut self, device: &HeadlessDevice) {
        self.state
            .borrow_mut()
            .events
            .push(HeadlessEvent::Trimmed { device: device.id });
    }
}
