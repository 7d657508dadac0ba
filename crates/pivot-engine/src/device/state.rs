use std::fmt;

/// Lifecycle state of a [`DeviceResources`](super::DeviceResources) instance.
///
/// `Uninitialized -> DeviceReady -> SurfaceReady <-> Resizing`, with `Lost`
/// reachable from any device-holding state. Recovery returns to
/// `SurfaceReady`; a failed recovery stays in `Lost`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum DeviceState {
    /// Only device-independent resources exist.
    #[default]
    Uninitialized,
    /// A device exists; no presentable surface is built.
    DeviceReady,
    /// Device and surface-dependent resources are consistent and presentable.
    SurfaceReady,
    /// Surface-dependent resources are being rebuilt.
    Resizing,
    /// The device was lost and has not been restored.
    Lost,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::DeviceReady => "device ready",
            DeviceState::SurfaceReady => "surface ready",
            DeviceState::Resizing => "resizing",
            DeviceState::Lost => "lost",
        };
        f.write_str(text)
    }
}
