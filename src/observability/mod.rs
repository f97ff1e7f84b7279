//! Observability for the telemetry agent
//!
//! The agent's diagnostic sink is a line-oriented structured log stream;
//! this module owns its initialization.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
