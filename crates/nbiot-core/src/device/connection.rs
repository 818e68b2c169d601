//! Network connection management
//!
//! Fixed command sequences for bringing the modem onto the NB-IoT network and
//! for reading signal quality. Each step is one engine call; the sequences
//! do not branch on intermediate replies, they only stop when the engine
//! reports a terminal failure.

use tracing::info;

use crate::protocol::{ApnCommand, AtEngine, Command, FailureKind, ParsedResponse, ProtocolError};

/// RSSI value meaning "not known or not detectable"
pub const RSSI_UNKNOWN: u8 = 99;

/// Signal quality as reported by `AT+CSQ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// Received signal strength, 0..=31 or 99
    pub rssi: u8,
    /// Channel bit error rate, 0..=7 or 99
    pub ber: u8,
}

impl SignalQuality {
    /// Parse a decomposed `+CSQ: <rssi>,<ber>` response
    pub fn from_response(response: &ParsedResponse) -> Result<Self, ProtocolError> {
        let command = Command::SignalQuality.to_string();
        if response.command_name != "+CSQ" {
            return Err(ProtocolError::InvalidResponse {
                command,
                reason: format!("unexpected response '{}'", response.command_name),
            });
        }
        Ok(Self {
            rssi: response.param_as(0, &command)?,
            ber: response.param_as(1, &command)?,
        })
    }

    /// False for the "not known or not detectable" reading (99)
    pub fn is_known(&self) -> bool {
        self.rssi != RSSI_UNKNOWN && self.rssi <= 31
    }

    /// Signal strength in dBm (`-113 + 2 * rssi`), if known
    pub fn dbm(&self) -> Option<i32> {
        self.is_known().then(|| -113 + 2 * i32::from(self.rssi))
    }
}

/// Result of the attach sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachReport {
    /// `+CGATT: 1` was reported
    pub attached: bool,
    /// Decomposed `AT+CGCONTRDP` response (context id, bearer, APN, address...)
    pub context: ParsedResponse,
}

/// Network-level operations on top of the transaction engine
pub struct NetworkConnection {
    at: AtEngine,
    apn: String,
    apn_command: ApnCommand,
    signal_quality: Option<SignalQuality>,
}

impl NetworkConnection {
    /// Wrap an engine; nothing is sent yet
    pub fn new(at: AtEngine, apn: impl Into<String>) -> Self {
        Self {
            at,
            apn: apn.into(),
            apn_command: ApnCommand::default(),
            signal_quality: None,
        }
    }

    /// Choose the command used to set the APN
    pub fn with_apn_command(mut self, apn_command: ApnCommand) -> Self {
        self.apn_command = apn_command;
        self
    }

    /// APN used by [`set_apn`](Self::set_apn)
    pub fn apn(&self) -> &str {
        &self.apn
    }

    /// The engine driving this connection
    pub fn engine(&self) -> &AtEngine {
        &self.at
    }

    /// Engine used for raw commands
    pub fn engine_mut(&mut self) -> &mut AtEngine {
        &mut self.at
    }

    /// Last signal quality read by [`signal_quality`](Self::signal_quality)
    pub fn last_signal_quality(&self) -> Option<SignalQuality> {
        self.signal_quality
    }

    /// Check that the module answers `AT`.
    ///
    /// Silence on every attempt is reported as
    /// [`ProtocolError::ModuleNotResponding`]; an `ERROR` reply means the
    /// module is there, so that failure is returned unchanged.
    pub fn check(&mut self) -> Result<(), ProtocolError> {
        match self.at.execute(&Command::Attention) {
            Ok(_) => Ok(()),
            Err(ProtocolError::CommandFailed {
                command,
                outcome: FailureKind::Timeout,
                attempts,
            }) => Err(ProtocolError::ModuleNotResponding { command, attempts }),
            Err(e) => Err(e),
        }
    }

    /// Set the APN with the configured command
    pub fn set_apn(&mut self) -> Result<(), ProtocolError> {
        self.at
            .execute(&Command::set_apn(self.apn_command, &self.apn))?;
        info!(apn = %self.apn, "APN set");
        Ok(())
    }

    /// Radio off, set APN, radio on, query attach state, read the context
    pub fn configure_apn(&mut self) -> Result<AttachReport, ProtocolError> {
        self.at.execute(&Command::SetFunctionality(false))?;
        self.set_apn()?;
        self.at.execute(&Command::SetFunctionality(true))?;
        let attach = self.at.execute(&Command::QueryAttach)?;
        let context = self.at.execute(&Command::ReadContextParameters)?;

        let attached = attach.command_name == "+CGATT" && attach.param(0) == Some("1");
        info!(attached, context = ?context.parameters, "network configured");
        Ok(AttachReport { attached, context })
    }

    /// Attach to packet service (`AT+CGATT=1`)
    pub fn attach(&mut self) -> Result<(), ProtocolError> {
        self.at.execute(&Command::SetAttach(true))?;
        info!("Network connection established");
        Ok(())
    }

    /// Detach from packet service (`AT+CGATT=0`)
    pub fn detach(&mut self) -> Result<(), ProtocolError> {
        self.at.execute(&Command::SetAttach(false))?;
        info!("Network disconnection completed");
        Ok(())
    }

    /// Query `AT+CSQ` and remember the result
    pub fn signal_quality(&mut self) -> Result<SignalQuality, ProtocolError> {
        let response = self.at.execute(&Command::SignalQuality)?;
        let quality = SignalQuality::from_response(&response)?;
        info!(rssi = quality.rssi, ber = quality.ber, dbm = ?quality.dbm(), "signal quality");
        self.signal_quality = Some(quality);
        Ok(quality)
    }
}
