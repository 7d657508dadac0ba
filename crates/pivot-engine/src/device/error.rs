use std::fmt;

use thiserror::Error;

use super::{DeviceState, FeatureLevel};

/// Why a device stopped being usable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LossReason {
    /// The adapter was physically removed or its driver was upgraded.
    Removed,
    /// The driver reset the device (hang, TDR, invalid command stream).
    Reset,
    /// The system default adapter is no longer the one the device runs on.
    AdapterChanged,
    /// The presentation surface can no longer be used and must be recreated.
    SurfaceLost,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LossReason::Removed => "device removed",
            LossReason::Reset => "device reset",
            LossReason::AdapterChanged => "adapter changed",
            LossReason::SurfaceLost => "surface lost",
        };
        f.write_str(text)
    }
}

/// Errors raised by the device layer.
///
/// Two classes exist. [`DeviceError::Lost`] is recoverable and is handled
/// inside [`DeviceResources`](super::DeviceResources) by a full recovery cycle;
/// hosts observe it only through [`DeviceNotify`](super::DeviceNotify).
/// Every other variant is fatal and is returned to the caller.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("graphics device lost: {0}")]
    Lost(LossReason),

    #[error("feature level {0} is not supported by the adapter")]
    FeatureLevelUnsupported(FeatureLevel),

    #[error("no adapter supports any requested feature level ({tried} candidates tried)")]
    NoSupportedFeatureLevel { tried: usize },

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("graphics backend error: {0}")]
    Backend(String),

    #[error("device resources are not ready (state: {0})")]
    NotReady(DeviceState),

    #[error("device loss recovery is already in progress")]
    RecoveryInProgress,

    #[error("device loss recovery failed: {0}")]
    RecoveryFailed(#[source] Box<DeviceError>),
}

impl DeviceError {
    /// Returns `true` for conditions that are recovered by recreating the device.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, DeviceError::Lost(_))
    }

    /// Returns `true` for errors that terminate manager usability.
    pub fn is_fatal(&self) -> bool {
        !self.is_device_lost()
    }
}
