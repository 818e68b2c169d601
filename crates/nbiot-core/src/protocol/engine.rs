//! AT command transaction engine
//!
//! Sends one command at a time, polls the transport for the reply with a
//! per-attempt deadline, retries on `ERROR` or timeout, and decomposes the
//! final `OK` response.

use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    classifier::{classify, finish, ResponseOutcome},
    clock::{Clock, SystemClock},
    observer::{ResponseObserver, TracingObserver},
    parser::{decompose, ParsedResponse},
    transport::Transport,
    Command, FailureKind, ProtocolError, DEFAULT_TIMEOUT_MS, LINE_TERMINATOR,
};

/// Shortest sleep between two empty polls; a zero interval would never let a
/// virtual clock reach the deadline
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Durations stored as integer milliseconds in configuration files
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Retry and timing policy for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Attempts before giving up (values below 1 are treated as 1)
    pub max_attempts: u32,
    /// How long to wait for a terminator after each write
    #[serde(rename = "per_attempt_timeout_ms", with = "duration_ms")]
    pub per_attempt_timeout: Duration,
    /// Pause between a failed attempt and the next one
    #[serde(rename = "inter_attempt_delay_ms", with = "duration_ms")]
    pub inter_attempt_delay: Duration,
    /// Settle delay before a terminal failure is reported (zero disables it)
    #[serde(rename = "fail_delay_ms", with = "duration_ms")]
    pub fail_delay: Duration,
    /// Sleep between polls that found no data
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Discard unread input before each write
    pub clear_before_write: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            per_attempt_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            inter_attempt_delay: Duration::from_secs(1),
            fail_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(2),
            clear_before_write: true,
        }
    }
}

impl TransactionConfig {
    /// One attempt, no settle delay: for fire-and-forget teardown commands
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            fail_delay: Duration::ZERO,
            ..self.clone()
        }
    }
}

/// A completed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Decomposed `OK` response
    pub response: ParsedResponse,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Time from the first write to the decomposed response
    pub elapsed: Duration,
}

/// Cumulative engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Bytes written, terminators included
    pub tx_bytes: u64,
    /// Bytes read
    pub rx_bytes: u64,
    /// Attempts started
    pub attempts: u64,
    /// Transactions started
    pub transactions: u64,
    /// Transactions that exhausted their attempts
    pub failures: u64,
}

/// Owns the transport and runs AT command transactions over it.
///
/// `&mut self` on every operation guarantees a single in-flight command.
pub struct AtEngine {
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    observer: Box<dyn ResponseObserver>,
    config: TransactionConfig,
    counters: Counters,
}

impl AtEngine {
    /// Create an engine on an already configured transport, using the system
    /// clock and logging responses through `tracing`
    pub fn new(transport: impl Transport + 'static, config: TransactionConfig) -> Self {
        Self {
            transport: Box::new(transport),
            clock: Box::new(SystemClock::new()),
            observer: Box::new(TracingObserver),
            config,
            counters: Counters::default(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the observability sink
    pub fn with_observer(mut self, observer: impl ResponseObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Default policy
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Replace the default policy
    pub fn set_config(&mut self, config: TransactionConfig) {
        self.config = config;
    }

    /// Time source used for deadlines and delays
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Snapshot of the counters
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Run `command` with the engine's default policy and return the parsed
    /// response
    pub fn execute(&mut self, command: &Command) -> Result<ParsedResponse, ProtocolError> {
        self.transact(command).map(|t| t.response)
    }

    /// Run `command` with an explicit policy
    pub fn execute_with(
        &mut self,
        command: &Command,
        config: &TransactionConfig,
    ) -> Result<ParsedResponse, ProtocolError> {
        self.transact_with(command, config).map(|t| t.response)
    }

    /// Like [`execute`](Self::execute), but also reports attempts and timing
    pub fn transact(&mut self, command: &Command) -> Result<Transaction, ProtocolError> {
        let config = self.config.clone();
        self.transact_with(command, &config)
    }

    /// Write, read until a terminator or the deadline, retry, decompose.
    ///
    /// Transport errors abort immediately; only `ERROR` replies and
    /// timeouts are retried.
    pub fn transact_with(
        &mut self,
        command: &Command,
        config: &TransactionConfig,
    ) -> Result<Transaction, ProtocolError> {
        let text = command.to_string();
        let max_attempts = config.max_attempts.max(1);
        let started = self.clock.now();

        let mut outcome = ResponseOutcome::Timeout;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            debug!(attempt, max_attempts, command = %text, "sending AT command");

            outcome = self.run_attempt(&text, config)?;
            if outcome.is_success() {
                break;
            }

            warn!(
                attempt,
                max_attempts,
                command = %text,
                outcome = ?outcome,
                "AT command attempt failed"
            );
            if attempt < max_attempts {
                self.clock.sleep(config.inter_attempt_delay);
            }
        }

        match outcome {
            ResponseOutcome::Success(body) => {
                let response = decompose(&body);
                debug!(
                    command = %text,
                    name = %response.command_name,
                    parameters = ?response.parameters,
                    attempts,
                    "AT command succeeded"
                );
                if !response.parameters.is_empty() {
                    self.observer
                        .notify(&response.command_name, &response.parameters);
                }
                self.counters.transactions = self.counters.transactions.saturating_add(1);
                Ok(Transaction {
                    response,
                    attempts,
                    elapsed: self.clock.now().saturating_sub(started),
                })
            }
            other => {
                let kind = match other {
                    ResponseOutcome::Error => FailureKind::Error,
                    _ => FailureKind::Timeout,
                };
                if !config.fail_delay.is_zero() {
                    self.clock.sleep(config.fail_delay);
                }
                let err = ProtocolError::CommandFailed {
                    command: text,
                    outcome: kind,
                    attempts,
                };
                self.observer.notify_error(&err.to_string());
                self.counters.failures = self.counters.failures.saturating_add(1);
                Err(err)
            }
        }
    }

    /// One write followed by a deadline-bounded read
    fn run_attempt(
        &mut self,
        text: &str,
        config: &TransactionConfig,
    ) -> Result<ResponseOutcome, ProtocolError> {
        if config.clear_before_write {
            self.transport
                .clear_input()
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        }

        let mut line = Vec::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(LINE_TERMINATOR);
        self.transport
            .write_all(&line)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        self.transport
            .flush()
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(line.len() as u64);
        self.counters.attempts = self.counters.attempts.saturating_add(1);

        let poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let deadline = self.clock.now() + config.per_attempt_timeout;
        let mut buffer: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            if self.clock.now() >= deadline {
                debug!(
                    received = buffer.len(),
                    partial = %String::from_utf8_lossy(&buffer),
                    "deadline reached"
                );
                return Ok(finish(&buffer));
            }

            let available = self
                .transport
                .bytes_available()
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
            if available == 0 {
                self.clock.sleep(poll_interval);
                continue;
            }

            match self.transport.read(&mut byte) {
                Ok(0) => {
                    debug!(received = buffer.len(), "transport closed");
                    return Ok(finish(&buffer));
                }
                Ok(_) => {
                    buffer.push(byte[0]);
                    self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(1);
                    let outcome = classify(&buffer);
                    if outcome.is_terminal() {
                        return Ok(outcome);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    self.clock.sleep(poll_interval);
                }
                Err(e) => return Err(ProtocolError::SerialError(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ManualClock, Reply, ScriptedTransport};

    fn engine(script: &ScriptedTransport, clock: &ManualClock) -> AtEngine {
        AtEngine::new(script.clone(), TransactionConfig::default()).with_clock(clock.clone())
    }

    #[test]
    fn test_default_config() {
        let config = TransactionConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.per_attempt_timeout, Duration::from_millis(5000));
        assert_eq!(config.inter_attempt_delay, Duration::from_secs(1));
        assert!(config.clear_before_write);
    }

    #[test]
    fn test_single_attempt_policy() {
        let config = TransactionConfig::default().single_attempt();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.fail_delay, Duration::ZERO);
        assert_eq!(config.per_attempt_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_config_serde_uses_milliseconds() {
        let json = r#"{"max_attempts": 3, "per_attempt_timeout_ms": 250}"#;
        let config: TransactionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.per_attempt_timeout, Duration::from_millis(250));
        assert_eq!(config.inter_attempt_delay, Duration::from_secs(1));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["per_attempt_timeout_ms"], 250);
    }

    #[test]
    fn test_writes_command_with_terminator() {
        let script = ScriptedTransport::new([Reply::ok()]);
        let clock = ManualClock::new();
        let mut at = engine(&script, &clock);

        at.execute(&Command::SignalQuality).unwrap();
        assert_eq!(script.written(), b"AT+CSQ\r\n".to_vec());
    }

    #[test]
    fn test_zero_attempts_still_sends_once() {
        let script = ScriptedTransport::new([Reply::ok()]);
        let clock = ManualClock::new();
        let mut at = engine(&script, &clock);
        let config = TransactionConfig {
            max_attempts: 0,
            ..TransactionConfig::default()
        };

        let t = at.transact_with(&Command::Attention, &config).unwrap();
        assert_eq!(t.attempts, 1);
    }

    #[test]
    fn test_counters() {
        let script = ScriptedTransport::new([Reply::error(), Reply::text("OK\r\n")]);
        let clock = ManualClock::new();
        let mut at = engine(&script, &clock);

        at.execute(&Command::Attention).unwrap();
        let counters = at.counters();
        assert_eq!(counters.attempts, 2);
        assert_eq!(counters.transactions, 1);
        assert_eq!(counters.failures, 0);
        assert_eq!(counters.tx_bytes, 8);
        assert_eq!(counters.rx_bytes, ("\r\nERROR\r\n".len() + "OK\r\n".len()) as u64);
    }
}
