//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window and feeds window geometry, DPI,
//! focus and visibility changes into [`DeviceResources`](crate::device::DeviceResources).

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
