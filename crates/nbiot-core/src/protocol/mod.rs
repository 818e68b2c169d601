//! AT Command Protocol
//!
//! Implements reliable request/response transactions with the modem over a
//! line-oriented AT command link.
//!
//! A transaction writes one command, polls the transport byte by byte until
//! the reply ends in `OK\r\n` or `ERROR\r\n` (or the deadline passes),
//! retries failed attempts with a fixed delay, and decomposes the final
//! response into a command name and parameters.

mod classifier;
pub mod clock;
pub mod commands;
mod engine;
mod error;
pub mod observer;
mod parser;
pub mod scripted;
pub mod serial;
pub mod transport;

pub use classifier::{classify, finish, ResponseOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{ApnCommand, Command};
pub use engine::{AtEngine, Counters, Transaction, TransactionConfig};
pub use error::{FailureKind, ProtocolError};
pub use observer::{ObservedEvent, RecordingObserver, ResponseObserver, TracingObserver};
pub use parser::{decompose, ParsedResponse};
pub use scripted::{Reply, ScriptedTransport};
pub use serial::{clear_buffers, configure_port, list_ports, open_port, open_transport, PortInfo};
pub use transport::{SerialTransport, TcpTransport, Transport};

/// Default baud rate of SIM7020 modules
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default per-attempt response timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Terminator appended to every command
pub const LINE_TERMINATOR: &[u8] = b"\r\n";
