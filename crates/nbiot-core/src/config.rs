//! Configuration
//!
//! Settings live in a JSON file (`nbiot.json` by default). Secrets and
//! per-deployment values can be overridden from the environment, optionally
//! loaded from a `.env` file:
//!
//! | Variable         | Setting             |
//! |------------------|---------------------|
//! | `APN`            | `network.apn`       |
//! | `BROKER_ADDRESS` | `mqtt.broker`       |
//! | `DEVICE_NAME`    | `mqtt.client_id`    |
//! | `DEVICE_SECRET`  | `mqtt.password`     |
//! | `BLYNK_TOKEN`    | `blynk.token`       |
//! | `MODEM_PORT`     | `serial.port`       |
//! | `MODEM_BAUD`     | `serial.baud_rate`  |

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::device::{BlynkSettings, MqttOptions};
use crate::protocol::{ApnCommand, TransactionConfig, DEFAULT_BAUD_RATE};
use crate::state::DEFAULT_STATE_FILE;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "nbiot.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The file could not be written
    #[error("Failed to write config {path}: {source}")]
    Write {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The file is not valid JSON for [`ModemConfig`]
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A setting failed validation
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Setting name
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Link to the modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Serial device; `None` picks the first port found
    pub port: Option<String>,
    /// Line speed
    pub baud_rate: u32,
    /// `host:port` of a serial-to-TCP bridge, used instead of `port`
    pub tcp_bridge: Option<String>,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            tcp_bridge: None,
        }
    }
}

/// Network attach settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Access point name
    pub apn: String,
    /// Which command sets the APN
    pub apn_command: ApnCommand,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            apn: "nbiot".to_string(),
            apn_command: ApnCommand::default(),
        }
    }
}

/// Local device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// File holding the persisted lamp state
    pub state_file: PathBuf,
    /// Topic the lamp state is published to
    pub lamp_topic: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            lamp_topic: "ds/Lamp".to_string(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Link to the modem
    pub serial: SerialSettings,
    /// Default transaction policy
    pub transaction: TransactionConfig,
    /// Network attach
    pub network: NetworkSettings,
    /// MQTT broker and session
    pub mqtt: MqttOptions,
    /// Blynk account
    pub blynk: BlynkSettings,
    /// Device files and topics
    pub device: DeviceSettings,
}

impl ModemConfig {
    /// Parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ModemConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from the process environment, after loading `.env`
    /// from the working directory if there is one
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(apn) = lookup("APN") {
            self.network.apn = apn;
        }
        if let Some(broker) = lookup("BROKER_ADDRESS") {
            self.mqtt.broker = broker;
        }
        if let Some(name) = lookup("DEVICE_NAME") {
            self.mqtt.client_id = name;
        }
        if let Some(secret) = lookup("DEVICE_SECRET") {
            self.mqtt.password = secret;
        }
        if let Some(token) = lookup("BLYNK_TOKEN") {
            self.blynk.token = token;
        }
        if let Some(port) = lookup("MODEM_PORT") {
            self.serial.port = Some(port);
        }
        if let Some(baud) = lookup("MODEM_BAUD") {
            self.serial.baud_rate = baud.parse().map_err(|_| ConfigError::Invalid {
                key: "MODEM_BAUD".to_string(),
                reason: format!("'{}' is not a baud rate", baud),
            })?;
        }
        self.validate()
    }

    /// Reject settings the engine or modem cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction.max_attempts == 0 {
            return Err(invalid("transaction.max_attempts", "must be at least 1"));
        }
        if self.transaction.per_attempt_timeout.is_zero() {
            return Err(invalid("transaction.per_attempt_timeout_ms", "must be positive"));
        }
        if self.serial.baud_rate == 0 {
            return Err(invalid("serial.baud_rate", "must be positive"));
        }
        if self.network.apn.trim().is_empty() {
            return Err(invalid("network.apn", "must not be empty"));
        }
        if self.network.apn.contains('"') {
            return Err(invalid("network.apn", "must not contain quotes"));
        }
        if self.mqtt.qos > 2 {
            return Err(invalid("mqtt.qos", "must be 0, 1 or 2"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = ModemConfig::default();
        config.validate().unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.network.apn, "nbiot");
        assert_eq!(config.device.state_file, PathBuf::from("state.db"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{
            "network": { "apn": "iot.1nce.net", "apn_command": "default_context" },
            "transaction": { "max_attempts": 3 }
        }"#;
        let config: ModemConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.network.apn, "iot.1nce.net");
        assert_eq!(config.network.apn_command, ApnCommand::DefaultContext);
        assert_eq!(config.transaction.max_attempts, 3);
        assert_eq!(config.transaction.per_attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("APN", "internet.apn"),
            ("BLYNK_TOKEN", "tok"),
            ("DEVICE_NAME", "lamp-01"),
            ("DEVICE_SECRET", "s3cret"),
            ("MODEM_BAUD", "9600"),
        ]
        .into_iter()
        .collect();

        let mut config = ModemConfig::default();
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.network.apn, "internet.apn");
        assert_eq!(config.blynk.token, "tok");
        assert_eq!(config.mqtt.client_id, "lamp-01");
        assert_eq!(config.mqtt.password, "s3cret");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.mqtt.broker, "blynk.cloud");
    }

    #[test]
    fn test_bad_env_baud() {
        let mut config = ModemConfig::default();
        let err = config
            .apply_env_from(|key| (key == "MODEM_BAUD").then(|| "fast".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = ModemConfig::default();
        config.transaction.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ModemConfig::default();
        config.network.apn = "bad\"apn".to_string();
        assert!(config.validate().is_err());
    }
}
