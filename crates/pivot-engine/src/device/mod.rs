//! Graphics device + surface management.
//!
//! This module is responsible for:
//! - creating the device at the best available feature level
//! - building the swap chain and views for the attached surface
//! - pre-rotating content for the display orientation
//! - detecting device loss and recreating everything behind it
//!
//! [`DeviceResources`] drives a [`Backend`]. [`gpu::WgpuBackend`] renders
//! through wgpu; [`headless::HeadlessBackend`] records calls without a GPU.

mod backend;
mod error;
mod feature;
mod init;
mod metrics;
mod notify;
mod orientation;
mod resources;
mod state;

pub mod gpu;
pub mod headless;

pub use backend::{
    AdapterId, Backend, DeviceStatus, PresentTransform, SwapChainDesc, TargetDesc,
};
pub use error::{DeviceError, LossReason};
pub use feature::{AdapterKind, DeviceCandidate, FeatureLevel, device_candidates, first_supported};
pub use init::DeviceConfig;
pub use metrics::{DEFAULT_DPI, SurfaceMetrics};
pub use notify::DeviceNotify;
pub use orientation::{
    DisplayOrientation, DisplayRotation, compute_display_rotation, orientation_transform_2d,
    orientation_transform_3d,
};
pub use resources::DeviceResources;
pub use state::DeviceState;
