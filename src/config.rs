//! Configuration system for the telemetry agent
//!
//! The configuration surface is static: it is read once at startup from a
//! TOML file and never reloaded. Credentials are resolved through environment
//! variable indirection so secrets stay out of the config file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Main agent configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub device: DeviceSection,
    pub wifi: WifiSection,
    pub mqtt: MqttSection,
    pub sensor: SensorSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Display name published in every telemetry record
    /// (must match [a-zA-Z0-9._-]+)
    pub name: String,
}

/// Network link section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    pub ssid: String,
    /// Authentication mode; only `open` and `wpa-psk` have a connect path
    pub auth_mode: AuthMode,
    /// Environment variable containing the network passphrase
    pub password_env: Option<String>,
    /// Host interface the link driver watches
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Interval between link status polls during one connect call
    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,
    /// Status polls per connect call before the call times out
    #[serde(default = "default_connect_poll_limit")]
    pub connect_poll_limit: u32,
}

/// Broker session section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    /// Environment variable containing the broker username
    pub username_env: Option<String>,
    /// Environment variable containing the broker password
    pub password_env: Option<String>,
    /// Fixed delay between session connect attempts
    #[serde(default = "default_session_retry_ms")]
    pub session_retry_ms: u64,
}

/// Sensor section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// Sensor driver selection ("simulated" is the only built-in)
    #[serde(default = "default_sensor_driver")]
    pub driver: String,
    pub trig_pin: u8,
    pub echo_pin: u8,
}

/// Steady-state publication cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Delay applied after each publish cycle
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            cycle_ms: default_cycle_ms(),
        }
    }
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_connect_poll_ms() -> u64 {
    500
}

fn default_connect_poll_limit() -> u32 {
    20
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_session_retry_ms() -> u64 {
    5000
}

fn default_sensor_driver() -> String {
    "simulated".to_string()
}

fn default_cycle_ms() -> u64 {
    1000
}

/// Link authentication modes.
///
/// All four modes are part of the configuration vocabulary, but only `Open`
/// and `WpaPsk` have a functional connect path; `Wep` and `WpaEap` are
/// rejected at validation time rather than silently falling through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    WpaEap,
}

impl AuthMode {
    pub fn is_supported(&self) -> bool {
        matches!(self, AuthMode::Open | AuthMode::WpaPsk)
    }

    pub fn requires_password(&self) -> bool {
        !matches!(self, AuthMode::Open)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthMode::Open => "open",
            AuthMode::Wep => "wep",
            AuthMode::WpaPsk => "wpa-psk",
            AuthMode::WpaEap => "wpa-eap",
        };
        f.write_str(label)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device name: {0}")]
    InvalidDeviceName(String),
    #[error("Auth mode '{0}' is declared but has no connect path; use 'open' or 'wpa-psk'")]
    UnsupportedAuthMode(AuthMode),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_name(&self.device.name)?;

        if !self.wifi.auth_mode.is_supported() {
            return Err(ConfigError::UnsupportedAuthMode(self.wifi.auth_mode));
        }
        if self.wifi.ssid.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "wifi.ssid must not be empty".to_string(),
            ));
        }
        if self.wifi.auth_mode.requires_password() && self.wifi.password_env.is_none() {
            return Err(ConfigError::InvalidConfig(format!(
                "wifi.auth_mode '{}' requires wifi.password_env",
                self.wifi.auth_mode
            )));
        }
        if self.wifi.connect_poll_limit == 0 {
            return Err(ConfigError::InvalidConfig(
                "wifi.connect_poll_limit must be greater than 0".to_string(),
            ));
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.topic must not be empty".to_string(),
            ));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.client_id must not be empty".to_string(),
            ));
        }
        if self.sensor.trig_pin == self.sensor.echo_pin {
            return Err(ConfigError::InvalidConfig(
                "sensor.trig_pin and sensor.echo_pin must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Helper method to get an optional environment-resolved credential.
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get the network passphrase from its environment variable.
    ///
    /// `None` for auth modes that carry no password. The variable name is
    /// checked at validation time; the variable itself is resolved here.
    pub fn get_wifi_password(&self) -> Result<Option<String>, ConfigError> {
        if !self.wifi.auth_mode.requires_password() {
            return Ok(None);
        }
        let env_name = match self.wifi.password_env.as_ref() {
            Some(name) => name,
            None => {
                return Err(ConfigError::InvalidConfig(format!(
                    "wifi.auth_mode '{}' requires wifi.password_env",
                    self.wifi.auth_mode
                )))
            }
        };
        std::env::var(env_name)
            .map(Some)
            .map_err(|_| ConfigError::EnvVarNotFound(env_name.clone()))
    }

    /// Get the broker username from its environment variable.
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get the broker password from its environment variable.
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
name = "ESP32"

[wifi]
ssid = "garage"
auth_mode = "open"

[mqtt]
host = "localhost"
topic = "garage_sensor"
client_id = "garage-esp32"

[sensor]
trig_pin = 5
echo_pin = 18
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate the published device name.
fn validate_device_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceName(format!(
            "Device name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
