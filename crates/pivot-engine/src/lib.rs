//! Pivot engine crate.
//!
//! Graphics device and swap chain lifetime management: device creation at the
//! best available feature level, DPI- and orientation-aware surface resources,
//! and transparent recovery from device loss. The winit runtime in [`window`]
//! hosts it for a desktop window.

pub mod coords;
pub mod core;
pub mod device;
pub mod draw;
pub mod logging;
pub mod window;
