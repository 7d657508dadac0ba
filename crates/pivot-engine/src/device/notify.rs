use super::{Backend, DeviceResources};

/// Observer told when the device is lost and restored.
///
/// The observer typically owns the [`DeviceResources`] it registers with, so
/// the manager keeps only a weak reference. Both callbacks run synchronously
/// inside [`DeviceResources::handle_device_lost`], once each per loss cycle.
pub trait DeviceNotify<B: Backend> {
    /// All GPU-resident content owned by the observer must be dropped.
    /// No draw calls are valid until `on_device_restored`.
    fn on_device_lost(&self);

    /// A new device exists; recreate GPU content from `resources`.
    ///
    /// The swap chain is rebuilt before this call, unless the surface has no
    /// area: then the state is [`DeviceState::DeviceReady`] and the swap chain
    /// follows on the next resize to a nonzero size.
    ///
    /// [`DeviceState::DeviceReady`]: super::DeviceState::DeviceReady
    fn on_device_restored(&self, resources: &DeviceResources<B>);
}
