//! Blynk integration through the modem's HTTP client
//!
//! Each operation is a single `AT+HTTPGET`. A `connected` flag gates a
//! reconnect (check module, set APN, attach) before every operation.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::{error, info, warn};

use super::sim7020::Sim7020;
use crate::protocol::{Command, ParsedResponse, ProtocolError};

/// Blynk account and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlynkSettings {
    /// Device auth token
    pub token: String,
    /// Server host (or IP) serving the HTTP API
    pub server: String,
    /// Attempts per operation, on top of the engine's own retries
    pub max_retries: u32,
    /// Pause between operation attempts, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for BlynkSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            server: "blynk.cloud".to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl BlynkSettings {
    fn update_url(&self, pin: &str, value: &dyn Display) -> String {
        format!(
            "http://{}/{}/update/{}?value={}",
            self.server, self.token, pin, value
        )
    }

    fn get_url(&self, pin: &str) -> String {
        format!("http://{}/{}/get/{}", self.server, self.token, pin)
    }
}

/// Blynk client owning the device it talks through
pub struct BlynkClient {
    device: Sim7020,
    settings: BlynkSettings,
    connected: bool,
}

impl BlynkClient {
    /// Wrap `device`; nothing is sent until the first operation
    pub fn new(device: Sim7020, settings: BlynkSettings) -> Self {
        Self {
            device,
            settings,
            connected: false,
        }
    }

    /// Whether the last connection attempt succeeded
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The underlying device
    pub fn device(&self) -> &Sim7020 {
        &self.device
    }

    /// Mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut Sim7020 {
        &mut self.device
    }

    /// Check the module, set the APN and attach to the network
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        let result = self.try_connect();
        self.connected = result.is_ok();
        match &result {
            Ok(()) => info!("Connected to network and Blynk"),
            Err(e) => error!("Connection error: {}", e),
        }
        result
    }

    fn try_connect(&mut self) -> Result<(), ProtocolError> {
        self.device.initialize()?;
        let connection = self.device.connection_mut();
        connection.set_apn()?;
        connection.attach()
    }

    /// Reconnect if the last connection attempt failed or never happened
    pub fn ensure_connected(&mut self) -> Result<(), ProtocolError> {
        if !self.connected {
            info!("Attempting reconnection...");
            self.connect()?;
        }
        Ok(())
    }

    /// Write `value` to virtual pin `pin`
    pub fn send_value(&mut self, pin: &str, value: impl Display) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        let command = Command::HttpGet {
            url: self.settings.update_url(pin, &value),
        };
        self.with_retries(&command)?;
        info!("Value {} sent to virtual pin {}", value, pin);
        Ok(())
    }

    /// Read virtual pin `pin`; the value is the last word of the last
    /// response parameter
    pub fn get_value(&mut self, pin: &str) -> Result<String, ProtocolError> {
        self.ensure_connected()?;
        let command = Command::HttpGet {
            url: self.settings.get_url(pin),
        };
        let response = self.with_retries(&command)?;
        let value = response
            .last_param()
            .and_then(|p| p.split_whitespace().last())
            .ok_or_else(|| ProtocolError::InvalidResponse {
                command: command.to_string(),
                reason: "no value in response".to_string(),
            })?
            .to_string();
        info!("Retrieved value {} from virtual pin {}", value, pin);
        Ok(value)
    }

    /// Detach from the network
    pub fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.connected = false;
        self.device.connection_mut().detach()?;
        info!("Disconnected from Blynk and NB-IoT network");
        Ok(())
    }

    fn with_retries(&mut self, command: &Command) -> Result<ParsedResponse, ProtocolError> {
        let attempts = self.settings.max_retries.max(1);
        let delay = Duration::from_millis(self.settings.retry_delay_ms);
        let mut attempt = 1;

        loop {
            match self.device.engine_mut().execute(command) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_terminal_command_failure() && attempt < attempts => {
                    warn!("Attempt {} failed: {}", attempt, e);
                    self.device.engine_mut().clock().sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_terminal_command_failure() {
                        error!("'{}' failed after {} attempts", command, attempts);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let settings = BlynkSettings {
            token: "TOKEN".to_string(),
            ..BlynkSettings::default()
        };
        assert_eq!(
            settings.update_url("V0", &1),
            "http://blynk.cloud/TOKEN/update/V0?value=1"
        );
        assert_eq!(settings.get_url("V1"), "http://blynk.cloud/TOKEN/get/V1");
    }
}
