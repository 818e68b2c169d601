//! # nbiot-core
//!
//! Core functionality for driving SIM7020 NB-IoT modules over AT commands.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A transaction engine: send a command, poll for `OK`/`ERROR`, retry
//! - Response decomposition into command name and parameters
//! - Serial and TCP transports, plus a scripted transport for tests
//! - Network attach, signal quality, MQTT and Blynk sequences
//! - Persisted lamp state and power/indicator pins
//!
//! ## Example
//!
//! ```rust,ignore
//! use nbiot_core::prelude::*;
//!
//! let transport = open_transport("/dev/ttyUSB0", Some(115200))?;
//! let engine = AtEngine::new(transport, TransactionConfig::default());
//! let mut network = NetworkConnection::new(engine, "nbiot");
//!
//! network.check()?;
//! let report = network.configure_apn()?;
//! println!("attached: {}", report.attached);
//! println!("signal: {:?}", network.signal_quality()?);
//! ```

pub mod config;
pub mod demo;
pub mod device;
pub mod protocol;
pub mod state;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, ModemConfig};
    pub use crate::demo::SimulatedModem;
    pub use crate::device::{
        BlynkClient, MemoryPin, MqttOptions, MqttSession, NetworkConnection, OutputPin,
        SignalQuality, Sim7020,
    };
    pub use crate::protocol::{
        open_transport, AtEngine, Command, ParsedResponse, ProtocolError, Transport,
        TransactionConfig,
    };
    pub use crate::state::{LampState, WriteMode};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
