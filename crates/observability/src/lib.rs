//! Tracing/logging setup shared by every binary in the workspace.

/// Subscriber configuration and installation.
pub mod logging;

pub use logging::{LogConfig, init, parse_level};
