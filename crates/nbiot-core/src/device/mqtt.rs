//! MQTT over AT commands
//!
//! The modem runs the MQTT client itself; this module only issues the
//! `AT+CMQ*` commands. Payloads travel hex-encoded.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{AtEngine, Command, ParsedResponse, ProtocolError};

/// Topic used to ask the cloud for a pin value
pub const PIN_REQUEST_TOPIC: &str = "get/ds";

/// Broker and session parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttOptions {
    /// Broker host name or address
    pub broker: String,
    /// Broker port
    pub port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Broker user name
    pub username: String,
    /// Broker password
    pub password: String,
    /// `AT+CMQNEW` command timeout in milliseconds
    pub command_timeout_ms: u32,
    /// `AT+CMQNEW` receive buffer size
    pub buffer_size: u32,
    /// MQTT protocol version/clean-session field of `AT+CMQCON`
    pub clean_session: u8,
    /// Keep-alive interval in seconds
    pub keepalive_secs: u16,
    /// QoS used for publish and subscribe
    pub qos: u8,
    /// Retain flag for publishes
    pub retain: bool,
}

impl Default for MqttOptions {
    fn default() -> Self {
        Self {
            broker: "blynk.cloud".to_string(),
            port: 1883,
            client_id: default_client_id(),
            username: "device".to_string(),
            password: String::new(),
            command_timeout_ms: 12000,
            buffer_size: 1024,
            clean_session: 3,
            keepalive_secs: 45,
            qos: 1,
            retain: false,
        }
    }
}

/// `nbiot-` followed by the first 8 hex digits of a random UUID
fn default_client_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("nbiot-{}", &id[..8])
}

/// MQTT commands for one session, borrowing the engine for its duration
pub struct MqttSession<'a> {
    at: &'a mut AtEngine,
    options: MqttOptions,
}

impl<'a> MqttSession<'a> {
    /// Session on slot 0 of `at`
    pub fn new(at: &'a mut AtEngine, options: MqttOptions) -> Self {
        Self { at, options }
    }

    /// Session parameters
    pub fn options(&self) -> &MqttOptions {
        &self.options
    }

    /// Allocate the connection (`AT+CMQNEW`)
    pub fn open(&mut self) -> Result<ParsedResponse, ProtocolError> {
        self.at.execute(&Command::MqttNew {
            broker: self.options.broker.clone(),
            port: self.options.port,
            timeout_ms: self.options.command_timeout_ms,
            buffer_size: self.options.buffer_size,
        })
    }

    /// Send CONNECT with credentials (`AT+CMQCON`)
    pub fn authenticate(&mut self) -> Result<ParsedResponse, ProtocolError> {
        self.at.execute(&Command::MqttConnect {
            clean_session: self.options.clean_session,
            client_id: self.options.client_id.clone(),
            keepalive_secs: self.options.keepalive_secs,
            username: self.options.username.clone(),
            password: self.options.password.clone(),
        })
    }

    /// Open and authenticate
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        info!(broker = %self.options.broker, port = self.options.port, "MQTT connect");
        self.open()?;
        self.authenticate()?;
        Ok(())
    }

    /// Publish raw bytes to `topic`
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<ParsedResponse, ProtocolError> {
        let command =
            Command::mqtt_publish(topic, self.options.qos, self.options.retain, payload);
        info!(topic, bytes = payload.len(), "MQTT publish");
        self.at.execute(&command)
    }

    /// Publish a text message to `topic`
    pub fn publish_str(&mut self, topic: &str, message: &str) -> Result<ParsedResponse, ProtocolError> {
        self.publish(topic, message.as_bytes())
    }

    /// Ask the cloud for the value of `pin_name` (e.g. `"Integer V0"`)
    pub fn request_pin_value(&mut self, pin_name: &str) -> Result<ParsedResponse, ProtocolError> {
        self.publish(PIN_REQUEST_TOPIC, pin_name.as_bytes())
    }

    /// Subscribe to `topic` with the configured QoS
    pub fn subscribe(&mut self, topic: &str) -> Result<ParsedResponse, ProtocolError> {
        info!(topic, "MQTT subscribe");
        self.at.execute(&Command::MqttSubscribe {
            topic: topic.to_string(),
            qos: self.options.qos,
        })
    }

    /// Unsubscribe from `topic`
    pub fn unsubscribe(&mut self, topic: &str) -> Result<ParsedResponse, ProtocolError> {
        self.at.execute(&Command::MqttUnsubscribe {
            topic: topic.to_string(),
        })
    }

    /// Disconnect with a single attempt; the session is gone either way
    pub fn disconnect(self) -> Result<(), ProtocolError> {
        let config = self.at.config().single_attempt();
        match self.at.execute_with(&Command::MqttDisconnect, &config) {
            Ok(_) => Ok(()),
            Err(e) if e.is_terminal_command_failure() => {
                warn!("MQTT disconnect not acknowledged: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode a hex payload received from the modem; invalid input yields an
/// empty string
pub fn decode_hex_payload(hex_payload: &str) -> String {
    hex::decode(hex_payload.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = MqttOptions::default();
        assert_eq!(options.port, 1883);
        assert_eq!(options.keepalive_secs, 45);
        assert_eq!(options.clean_session, 3);
        assert!(options.client_id.starts_with("nbiot-"));
        assert_eq!(options.client_id.len(), "nbiot-".len() + 8);
    }

    #[test]
    fn test_decode_hex_payload() {
        assert_eq!(decode_hex_payload("48656c6c6f"), "Hello");
        assert_eq!(decode_hex_payload("31"), "1");
        assert_eq!(decode_hex_payload("zz"), "");
        assert_eq!(decode_hex_payload("ff"), "");
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: MqttOptions =
            serde_json::from_str(r#"{"broker": "mqtt.example.org", "client_id": "lamp"}"#).unwrap();
        assert_eq!(options.broker, "mqtt.example.org");
        assert_eq!(options.client_id, "lamp");
        assert_eq!(options.buffer_size, 1024);
    }
}
