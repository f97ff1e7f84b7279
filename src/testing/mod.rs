//! Testing utilities and mock implementations
//!
//! This module provides mock collaborators for testing the agent without
//! requiring a radio, an MQTT broker, or sensor hardware.

pub mod mocks;

pub use mocks::*;
