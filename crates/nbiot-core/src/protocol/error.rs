//! Protocol errors

use std::fmt;

use thiserror::Error;

/// Final outcome kind of a command that exhausted all of its attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The modem answered with an `ERROR` line
    Error,
    /// No terminator arrived before the deadline, or the channel closed
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => f.write_str("ERROR"),
            FailureKind::Timeout => f.write_str("TIMEOUT"),
        }
    }
}

/// Errors that can occur while talking to the modem
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The link to the modem failed while sending or receiving
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Every attempt of a command ended in `ERROR` or a timeout
    #[error("Command '{command}' failed with {outcome} after {attempts} attempt(s)")]
    CommandFailed {
        /// Command text as written, without the line terminator
        command: String,
        /// How the last attempt ended
        outcome: FailureKind,
        /// Attempts spent
        attempts: u32,
    },

    /// An `OK` response without the expected content
    #[error("Invalid response to '{command}': {reason}")]
    InvalidResponse {
        /// Command text as written
        command: String,
        /// What was missing or malformed
        reason: String,
    },

    /// The module stayed silent on every attempt of a liveness check
    #[error("Module did not answer '{command}' after {attempts} attempt(s)")]
    ModuleNotResponding {
        /// Command text as written
        command: String,
        /// Attempts spent
        attempts: u32,
    },

    /// No serial port with the requested name
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Low-level I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when every attempt of a command was spent without an `OK`.
    ///
    /// Resource failures (serial or I/O errors) are never terminal command
    /// failures; they are reported as soon as they happen.
    pub fn is_terminal_command_failure(&self) -> bool {
        matches!(self, ProtocolError::CommandFailed { .. })
    }

    /// Attempts spent, for terminal command failures
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ProtocolError::CommandFailed { attempts, .. }
            | ProtocolError::ModuleNotResponding { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Final outcome kind, for terminal command failures
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ProtocolError::CommandFailed { outcome, .. } => Some(*outcome),
            ProtocolError::ModuleNotResponding { .. } => Some(FailureKind::Timeout),
            _ => None,
        }
    }
}
