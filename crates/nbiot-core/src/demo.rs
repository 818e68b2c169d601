//! Demo Mode - Simulated SIM7020 modem
//!
//! Answers AT commands the way a module on a healthy network would, so the
//! CLI and device sequences can be exercised without hardware. Signal
//! quality is randomized and an optional error rate makes the modem reject
//! commands now and then to show the retry logic at work.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use tracing::trace;

use crate::protocol::Transport;

/// In-memory modem implementing [`Transport`]
pub struct SimulatedModem {
    /// Bytes written but not yet terminated by `\r\n`
    line: Vec<u8>,
    /// Reply bytes waiting to be read
    output: VecDeque<u8>,
    functionality: bool,
    attached: bool,
    apn: Option<String>,
    mqtt_open: bool,
    /// Messages published, as (topic, decoded payload)
    published: Vec<(String, String)>,
    /// Virtual pin values stored by Blynk update requests
    pins: HashMap<String, String>,
    /// Probability that a command is answered with `ERROR`
    error_rate: f64,
    rng: StdRng,
}

impl Default for SimulatedModem {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedModem {
    /// Create a simulator seeded from system entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a simulator with reproducible signal readings
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            line: Vec::new(),
            output: VecDeque::new(),
            functionality: true,
            attached: false,
            apn: None,
            mqtt_open: false,
            published: Vec::new(),
            pins: HashMap::new(),
            error_rate: 0.0,
            rng,
        }
    }

    /// Reject commands at random with probability `rate` (clamped to 0..=1)
    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Whether packet service is attached
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// APN set by the last context command
    pub fn apn(&self) -> Option<&str> {
        self.apn.as_deref()
    }

    /// Messages published so far, as (topic, decoded payload)
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    /// Value stored for a Blynk virtual pin
    pub fn pin(&self, pin: &str) -> Option<&str> {
        self.pins.get(pin).map(String::as_str)
    }

    fn respond(&mut self, command: &str) {
        trace!(command, "simulated modem received");
        let reply = if self.error_rate > 0.0 && self.rng.gen_bool(self.error_rate) {
            Err(())
        } else {
            self.handle(command)
        };

        let text = match reply {
            Ok(None) => "\r\nOK\r\n".to_string(),
            Ok(Some(info)) => format!("\r\n{}\r\n\r\nOK\r\n", info),
            Err(()) => "\r\nERROR\r\n".to_string(),
        };
        self.output.extend(text.bytes());
    }

    /// `Ok(Some(line))` is an information line followed by OK
    fn handle(&mut self, command: &str) -> Result<Option<String>, ()> {
        let (name, args) = match command.find(['=', '?']) {
            Some(pos) => (&command[..pos], &command[pos..]),
            None => (command, ""),
        };

        match (name, args) {
            ("AT", "") => Ok(None),
            ("ATI", "") => Ok(Some("SIM7020E R1752.05".to_string())),
            ("AT+CFUN", "?") => Ok(Some(format!("+CFUN: {}", u8::from(self.functionality)))),
            ("AT+CFUN", "=0") => {
                self.functionality = false;
                self.attached = false;
                Ok(None)
            }
            ("AT+CFUN", "=1") => {
                self.functionality = true;
                Ok(None)
            }
            ("AT+CGDCONT", args) | ("AT*MCGDEFCONT", args) => {
                let apn = args.rsplit(',').next().unwrap_or("").trim_matches('"');
                self.apn = Some(apn.to_string());
                Ok(None)
            }
            ("AT+CGATT", "?") => {
                if self.functionality && self.apn.is_some() {
                    self.attached = true;
                }
                Ok(Some(format!("+CGATT: {}", u8::from(self.attached))))
            }
            ("AT+CGATT", "=1") if self.functionality => {
                self.attached = true;
                Ok(None)
            }
            ("AT+CGATT", "=0") => {
                self.attached = false;
                Ok(None)
            }
            ("AT+CGCONTRDP", "") if self.attached => Ok(Some(format!(
                "+CGCONTRDP: 1,5,\"{}\",\"10.{}.{}.{}\"",
                self.apn.as_deref().unwrap_or(""),
                self.rng.gen_range(0..=255u8),
                self.rng.gen_range(0..=255u8),
                self.rng.gen_range(1..=254u8),
            ))),
            ("AT+CSQ", "") => {
                let rssi = if self.functionality {
                    self.rng.gen_range(10..=25u8)
                } else {
                    99
                };
                Ok(Some(format!("+CSQ: {},99", rssi)))
            }
            ("AT+CMQNEW", _) if self.attached => {
                self.mqtt_open = true;
                Ok(Some("+CMQNEW: 0".to_string()))
            }
            ("AT+CMQCON", _) | ("AT+CMQSUB", _) | ("AT+CMQUNSUB", _) if self.mqtt_open => {
                Ok(None)
            }
            ("AT+CMQPUB", args) if self.mqtt_open => {
                let fields: Vec<&str> = args.trim_start_matches('=').split(',').collect();
                let topic = fields.get(1).map(|t| t.trim_matches('"')).ok_or(())?;
                let payload = fields.last().map(|p| p.trim_matches('"')).ok_or(())?;
                let decoded = hex::decode(payload).map_err(|_| ())?;
                self.published.push((
                    topic.to_string(),
                    String::from_utf8_lossy(&decoded).into_owned(),
                ));
                Ok(None)
            }
            ("AT+CMQDISCON", _) => {
                self.mqtt_open = false;
                Ok(None)
            }
            ("AT+HTTPGET", args) if self.attached => self.http_get(args),
            _ => Err(()),
        }
    }

    fn http_get(&mut self, args: &str) -> Result<Option<String>, ()> {
        let url = args.trim_start_matches('=').trim_matches('"');
        let path = url.split("://").nth(1).unwrap_or(url);
        // host/token/(update|get)/pin
        let mut parts = path.splitn(4, '/').skip(2);
        let action = parts.next().ok_or(())?;
        let rest = parts.next().ok_or(())?;

        match action {
            "update" => {
                let (pin, query) = rest.split_once('?').ok_or(())?;
                let value = query.strip_prefix("value=").ok_or(())?;
                self.pins.insert(pin.to_string(), value.to_string());
                Ok(Some("+HTTPGET: 200".to_string()))
            }
            "get" => {
                let value = self.pins.get(rest).map(String::as_str).unwrap_or("0");
                Ok(Some(format!("+HTTPGET: 200,\"{}\"", value)))
            }
            _ => Err(()),
        }
    }
}

impl Read for SimulatedModem {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedModem {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        while let Some(pos) = self.line.windows(2).position(|w| w == b"\r\n") {
            let raw: Vec<u8> = self.line.drain(..pos + 2).collect();
            let command = String::from_utf8_lossy(&raw[..pos]).trim().to_string();
            if !command.is_empty() {
                self.respond(&command);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for SimulatedModem {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.output.len())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.output.clear();
        Ok(())
    }
}
