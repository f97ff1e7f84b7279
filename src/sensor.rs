//! Distance sensor boundary
//!
//! The physical measurement routine is an external collaborator: anything that
//! can produce a calibrated centimeter value behind [`DistanceSensor`] plugs
//! into the agent. This module holds the trait, the validity guard applied to
//! every raw measurement, and a simulated driver used when no hardware is
//! attached.

use async_trait::async_trait;
use thiserror::Error;

use crate::telemetry::Reading;

/// Shortest distance an HC-SR04-class sensor can resolve, in centimeters.
pub const MIN_RANGE_CM: f64 = 2.0;
/// Longest distance an HC-SR04-class sensor can resolve, in centimeters.
pub const MAX_RANGE_CM: f64 = 400.0;

/// Distance sensor errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no echo received within the measurement window")]
    NoEcho,
    #[error("sensor fault: {0}")]
    Fault(String),
}

/// External distance measurement collaborator.
///
/// `measure` returns the raw distance in centimeters. The agent never
/// publishes the raw value directly; it goes through [`guard_measurement`]
/// first so a missing echo or a garbage result cannot reach the broker.
#[async_trait]
pub trait DistanceSensor: Send {
    async fn measure(&mut self) -> Result<f64, SensorError>;
}

#[async_trait]
impl DistanceSensor for Box<dyn DistanceSensor> {
    async fn measure(&mut self) -> Result<f64, SensorError> {
        (**self).measure().await
    }
}

/// Apply the validity guard to a raw measurement and build the cycle Reading.
///
/// A measurement is valid only when it is finite and inside the sensor's
/// physical range; everything else produces `valid = false` so the supervisor
/// skips publication for that cycle. Valid values are rounded to whole
/// centimeters.
pub fn guard_measurement(device: &str, raw: Result<f64, SensorError>) -> Reading {
    match raw {
        Ok(cm) if cm.is_finite() && (MIN_RANGE_CM..=MAX_RANGE_CM).contains(&cm) => Reading {
            device: device.to_string(),
            distance_cm: cm.round() as i32,
            valid: true,
        },
        Ok(cm) => {
            tracing::warn!(raw_cm = cm, "discarding out-of-range measurement");
            Reading::invalid(device)
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding failed measurement");
            Reading::invalid(device)
        }
    }
}

/// Log-only stand-in driver for running the agent without hardware attached.
///
/// Walks a fixed sawtooth between the range limits so downstream plumbing
/// (encoding, publication, broker behavior) can be exercised end to end.
pub struct SimulatedSensor {
    current_cm: f64,
    step_cm: f64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            current_cm: 50.0,
            step_cm: 7.0,
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistanceSensor for SimulatedSensor {
    async fn measure(&mut self) -> Result<f64, SensorError> {
        let value = self.current_cm;
        self.current_cm += self.step_cm;
        if self.current_cm >= MAX_RANGE_CM || self.current_cm <= MIN_RANGE_CM {
            self.step_cm = -self.step_cm;
            self.current_cm += self.step_cm;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_accepts_in_range() {
        let reading = guard_measurement("ESP32", Ok(42.4));
        assert!(reading.valid);
        assert_eq!(reading.distance_cm, 42);
        assert_eq!(reading.device, "ESP32");
    }

    #[test]
    fn test_guard_rounds_half_up() {
        let reading = guard_measurement("ESP32", Ok(42.5));
        assert_eq!(reading.distance_cm, 43);
    }

    #[test]
    fn test_guard_rejects_non_finite() {
        assert!(!guard_measurement("ESP32", Ok(f64::NAN)).valid);
        assert!(!guard_measurement("ESP32", Ok(f64::INFINITY)).valid);
    }

    #[test]
    fn test_guard_rejects_out_of_range() {
        assert!(!guard_measurement("ESP32", Ok(0.5)).valid);
        assert!(!guard_measurement("ESP32", Ok(1200.0)).valid);
        // Range limits themselves are measurable.
        assert!(guard_measurement("ESP32", Ok(MIN_RANGE_CM)).valid);
        assert!(guard_measurement("ESP32", Ok(MAX_RANGE_CM)).valid);
    }

    #[test]
    fn test_guard_rejects_sensor_error() {
        let reading = guard_measurement("ESP32", Err(SensorError::NoEcho));
        assert!(!reading.valid);
    }

    #[tokio::test]
    async fn test_simulated_sensor_stays_in_range() {
        let mut sensor = SimulatedSensor::new();
        for _ in 0..200 {
            let cm = sensor.measure().await.expect("simulated measure");
            assert!((MIN_RANGE_CM..=MAX_RANGE_CM).contains(&cm), "cm={cm}");
        }
    }
}
