//! Core engine-facing contracts.
//!
//! This module defines the stable interface between the runtime (platform loop)
//! and higher layers (studio, tools). Device loss reaches the app through
//! [`App::on_device_lost`] and [`App::on_device_restored`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
