//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code logs through
//! the `log` facade only; `env_logger` is installed by the host.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
