//! Device-level orchestration
//!
//! Fixed sequences of engine calls: network attach, signal quality, MQTT and
//! Blynk sessions, plus the SIM7020 device that ties them to its power pin
//! and lamp state.

pub mod blynk;
pub mod connection;
pub mod gpio;
pub mod mqtt;
mod sim7020;

pub use blynk::{BlynkClient, BlynkSettings};
pub use connection::{AttachReport, NetworkConnection, SignalQuality};
pub use gpio::{blink, LampIndicators, MemoryPin, OutputPin};
pub use mqtt::{decode_hex_payload, MqttOptions, MqttSession};
pub use sim7020::{Sim7020, POWER_OFF_SETTLE, POWER_ON_SETTLE};
