//! Process configuration, loaded once at startup from a TOML file and
//! immutable thereafter.
//!
//! Only the battery list is mandatory; broker settings and poll cadence fall
//! back to defaults that match a stock local setup:
//!
//! ```toml
//! [[devices]]
//! address = "A4:C1:37:23:D0:5E"
//! label = "BATT1"
//!
//! [[devices]]
//! address = "A4:C1:37:33:D0:72"
//! label = "BATT2"
//!
//! [mqtt]
//! host = "localhost"
//! port = 1883
//!
//! [poll]
//! collection_window_ms = 600
//! device_pause_ms = 300
//! refresh_interval_ms = 2000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::message;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error while reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// One battery to poll: its transport address and the label that keys the
/// store and the publish topic.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    pub label: String,
}

/// Broker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub base_topic: String,
    pub keep_alive_s: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "bmsbridge".into(),
            base_topic: "bms".into(),
            keep_alive_s: 60,
        }
    }
}

/// Poll cadence and the per-cycle collection window.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// How long each session waits for the notification response.
    pub collection_window_ms: u64,
    /// Radio recovery pause between batteries within a round.
    pub device_pause_ms: u64,
    /// Idle time between one round finishing and the next starting.
    pub refresh_interval_ms: u64,
    /// Hex override of the request payload written each cycle. Defaults to
    /// the basic info request.
    pub request: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            collection_window_ms: 600,
            device_pause_ms: 300,
            refresh_interval_ms: 2000,
            request: None,
        }
    }
}

impl PollConfig {
    pub fn collection_window(&self) -> Duration {
        Duration::from_millis(self.collection_window_ms)
    }

    pub fn device_pause(&self) -> Duration {
        Duration::from_millis(self.device_pause_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// The request payload each cycle writes to the command channel.
    pub fn request(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.request {
            Some(text) => hex::decode(text.replace(' ', ""))
                .map_err(|e| ConfigError::Validation(format!("invalid request hex: {e}"))),
            None => Ok(message::REQUEST.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[devices]] entry is required".into(),
            ));
        }
        self.poll.request()?;
        Ok(())
    }
}
