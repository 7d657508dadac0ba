//! Size and viewport types shared by the device layer and its hosts.
//!
//! Two unit systems are in play:
//! - logical units (device-independent, 1/96 inch) as reported by the host
//! - physical pixels, the unit of swap chain buffers and viewports

mod size;
mod viewport;

pub use size::{LogicalSize, PixelSize};
pub use viewport::Viewport;
