//! Distance telemetry agent
//!
//! A single-board telemetry agent that periodically samples a distance
//! sensor and publishes readings to an MQTT broker, keeping the network
//! link and the broker session alive across outages.
//!
//! # Overview
//!
//! This crate provides:
//! - The connectivity supervisor: a state machine that establishes and
//!   re-establishes the link and the broker session, and gates publication
//!   on connectivity health
//! - Link and session managers with swappable retry policies
//! - A fixed-shape telemetry wire encoding with a bounded payload size
//! - Host-side collaborator implementations (Linux link driver, rumqttc
//!   broker client, simulated sensor)
//!
//! # Quick Start
//!
//! ```rust
//! use distance_agent::link::SignalQuality;
//! use distance_agent::telemetry::{decode, encode, TelemetryRecord};
//!
//! // Classify a link's signal strength
//! assert_eq!(SignalQuality::classify(-61).to_string(), "Amazing");
//!
//! // Encode one reading for the wire
//! let record = TelemetryRecord {
//!     device: "ESP32".to_string(),
//!     distance_cm: 42,
//! };
//! let payload = encode(&record).unwrap();
//! assert_eq!(payload, r#"{"device":"ESP32","distance_cm":42}"#);
//! assert_eq!(decode(&payload).unwrap(), record);
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod observability;
pub mod sensor;
pub mod session;
pub mod supervisor;
pub mod telemetry;
pub mod testing;

pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use link::{LinkManager, LinkState, SignalQuality};
pub use session::{BrokerStatus, SessionManager, SessionState};
pub use supervisor::{RetryPolicy, Supervisor, SupervisorPolicy, SupervisorState};
pub use telemetry::{Reading, TelemetryRecord};
