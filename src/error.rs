//! Crate-level error type
//!
//! Every failure category in the agent has a defined retry or skip policy;
//! nothing here is fatal in the sense of halting forever. This type exists
//! so callers above the supervisor (the binary, tests) can hold any module
//! failure in one place.

use thiserror::Error;

use crate::config::ConfigError;
use crate::link::LinkError;
use crate::sensor::SensorError;
use crate::session::{PublishError, SessionError};
use crate::telemetry::EncodeError;

/// Main error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Telemetry encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("{operation} gave up after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
