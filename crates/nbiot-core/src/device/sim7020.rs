//! SIM7020 device
//!
//! Composes the network connection (which owns the transaction engine), the
//! power-enable pin and the persisted lamp state.

use std::time::Duration;
use tracing::info;

use super::{
    connection::NetworkConnection,
    gpio::OutputPin,
    mqtt::{MqttOptions, MqttSession},
};
use crate::protocol::{AtEngine, ProtocolError};
use crate::state::{LampState, StateError};

/// Time the module needs after power-up before it accepts commands
pub const POWER_ON_SETTLE: Duration = Duration::from_secs(2);

/// Time to wait after cutting power
pub const POWER_OFF_SETTLE: Duration = Duration::from_secs(1);

/// A SIM7020 NB-IoT module
pub struct Sim7020 {
    connection: NetworkConnection,
    power_pin: Box<dyn OutputPin>,
    lamp: LampState,
}

impl Sim7020 {
    /// Assemble a device; the module stays unpowered until [`power_on`](Self::power_on)
    pub fn new(
        connection: NetworkConnection,
        power_pin: impl OutputPin + 'static,
        lamp: LampState,
    ) -> Self {
        Self {
            connection,
            power_pin: Box::new(power_pin),
            lamp,
        }
    }

    /// Network connection
    pub fn connection(&self) -> &NetworkConnection {
        &self.connection
    }

    /// Mutable network connection
    pub fn connection_mut(&mut self) -> &mut NetworkConnection {
        &mut self.connection
    }

    /// Engine used for raw commands
    pub fn engine_mut(&mut self) -> &mut AtEngine {
        self.connection.engine_mut()
    }

    /// Drive the power-enable pin high and wait for the module to boot
    pub fn power_on(&mut self) {
        self.power_pin.set_high();
        self.connection.engine().clock().sleep(POWER_ON_SETTLE);
        info!("SIM7020 powered on");
    }

    /// Drive the power-enable pin low
    pub fn power_off(&mut self) {
        self.power_pin.set_low();
        self.connection.engine().clock().sleep(POWER_OFF_SETTLE);
        info!("SIM7020 powered off");
    }

    /// Power pin level
    pub fn is_powered(&self) -> bool {
        self.power_pin.is_high()
    }

    /// Check that the module answers
    pub fn initialize(&mut self) -> Result<(), ProtocolError> {
        self.connection.check()?;
        info!("SIM7020 module successfully connected");
        Ok(())
    }

    /// Persisted lamp state
    pub fn lamp(&self) -> &LampState {
        &self.lamp
    }

    /// Flip the lamp state and persist it; returns the new state
    pub fn toggle_lamp(&mut self) -> Result<bool, StateError> {
        self.lamp.toggle()
    }

    /// Set the lamp state and persist it
    pub fn set_lamp(&mut self, on: bool) -> Result<(), StateError> {
        self.lamp.set(on)
    }

    /// Start an MQTT session on this device's engine
    pub fn mqtt(&mut self, options: MqttOptions) -> MqttSession<'_> {
        MqttSession::new(self.connection.engine_mut(), options)
    }
}
