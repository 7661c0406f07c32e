//! # Chat Real Diagnostics
//!
//! Debugging and diagnostic tools for Chat Real.
//! Provides logging setup driven by the debug environment and per-track
//! stream health monitoring.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod stream_health;

// Re-export main types
pub use debug_logger::{DebugEnv, DebugLogger};
pub use stream_health::{StreamHealth, StreamMonitor};
