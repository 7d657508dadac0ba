use super::FeatureLevel;

/// Creation parameters for [`DeviceResources`](super::DeviceResources).
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Feature levels to request, most capable first.
    pub feature_levels: Vec<FeatureLevel>,

    /// Retry the level list on a software adapter when no hardware adapter works.
    pub allow_software_fallback: bool,

    /// Pixel format of the swap chain back buffer.
    ///
    /// Fixed for the lifetime of the manager; the 2D layer expects 8-bit BGRA.
    pub back_buffer_format: wgpu::TextureFormat,

    /// Number of swap chain buffers (2 = double, 3 = triple buffering).
    pub buffer_count: u32,

    /// Format of the depth/stencil buffer created alongside the back buffer.
    pub depth_format: wgpu::TextureFormat,

    /// Present mode (swap behavior).
    ///
    /// FIFO is broadly supported and waits for vertical sync.
    pub present_mode: wgpu::PresentMode,

    /// Prefer an sRGB presentation format when the surface offers one.
    pub prefer_srgb: bool,

    /// Enables backend validation and the debug 2D factory.
    pub debug: bool,

    /// Prefer the discrete adapter on hybrid systems.
    pub high_performance: bool,
}

impl DeviceConfig {
    /// Buffer count clamped to the supported double/triple buffering range.
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count.clamp(2, 3)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            feature_levels: FeatureLevel::ALL.to_vec(),
            allow_software_fallback: true,
            back_buffer_format: wgpu::TextureFormat::Bgra8Unorm,
            buffer_count: 2,
            depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            present_mode: wgpu::PresentMode::Fifo,
            prefer_srgb: true,
            debug: cfg!(debug_assertions),
            high_performance: true,
        }
    }
}
