//! Telemetry records and wire encoding
//!
//! The wire message is a two-field JSON record with fixed key order
//! (`device`, then `distance_cm`) - no envelope, no timestamp, no sequence
//! number. Subscribers on the other end of the topic parse it positionally,
//! so the field order is part of the contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Hard ceiling on the encoded payload size.
///
/// Matches the transmit buffer of the smallest deployed device; encoding
/// fails loudly instead of truncating when a record would exceed it.
pub const MAX_PAYLOAD_BYTES: usize = 128;

/// One sampled sensor value plus its validity flag.
///
/// Produced every cycle regardless of connectivity; only valid readings are
/// encoded and published.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device: String,
    pub distance_cm: i32,
    pub valid: bool,
}

impl Reading {
    /// Placeholder reading for a failed or out-of-range measurement.
    pub fn invalid(device: &str) -> Self {
        Self {
            device: device.to_string(),
            distance_cm: 0,
            valid: false,
        }
    }
}

/// The fixed-shape wire record. Field declaration order is the serialized
/// key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub device: String,
    pub distance_cm: i32,
}

/// Telemetry encoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize telemetry record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("encoded record is {len} bytes, exceeds the {MAX_PAYLOAD_BYTES}-byte payload bound")]
    Oversize { len: usize },
}

/// Render a record to its wire form, mirroring it to the diagnostic sink
/// before transmission.
pub fn encode(record: &TelemetryRecord) -> Result<String, EncodeError> {
    let payload = serde_json::to_string(record)?;
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(EncodeError::Oversize { len: payload.len() });
    }
    debug!(device = %record.device, distance_cm = record.distance_cm, %payload, "telemetry encoded");
    Ok(payload)
}

/// Parse a wire payload back into a record.
pub fn decode(payload: &str) -> Result<TelemetryRecord, EncodeError> {
    Ok(serde_json::from_str(payload)?)
}
