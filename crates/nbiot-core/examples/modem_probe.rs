//! SIM7020 probe
//!
//! Sends a handful of harmless queries and prints what came back, how many
//! attempts each took and how long. Useful for checking wiring and baud rate
//! before running the full attach sequence.
//!
//! Usage:
//!   cargo run --example modem_probe -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyUSB0)
//!   --baud RATE       Baud rate (default: 115200)
//!   --timeout MS      Per-attempt timeout in ms (default: 2000)
//!   --attempts N      Attempts per command (default: 3)
//!   --demo            Probe the simulated modem instead

use nbiot_core::demo::SimulatedModem;
use nbiot_core::protocol::{
    open_transport, AtEngine, Command, Transport, TransactionConfig, DEFAULT_BAUD_RATE,
};
use std::time::Duration;

const PROBES: [&str; 5] = ["AT", "ATI", "AT+CFUN?", "AT+CSQ", "AT+CGATT?"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut port_name = "/dev/ttyUSB0".to_string();
    let mut baud_rate = DEFAULT_BAUD_RATE;
    let mut timeout_ms = 2000u64;
    let mut attempts = 3u32;
    let mut demo = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if let Some(v) = args.get(i) {
                    port_name = v.clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                baud_rate = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(baud_rate);
            }
            "--timeout" | "-t" => {
                i += 1;
                timeout_ms = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(timeout_ms);
            }
            "--attempts" | "-n" => {
                i += 1;
                attempts = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(attempts);
            }
            "--demo" => demo = true,
            other => eprintln!("ignoring unknown argument {}", other),
        }
        i += 1;
    }

    let transport: Box<dyn Transport> = if demo {
        Box::new(SimulatedModem::new())
    } else {
        match open_transport(&port_name, Some(baud_rate)) {
            Ok(t) => Box::new(t),
            Err(e) => {
                eprintln!("Failed to open {}: {}", port_name, e);
                std::process::exit(1);
            }
        }
    };

    let config = TransactionConfig {
        max_attempts: attempts,
        per_attempt_timeout: Duration::from_millis(timeout_ms),
        ..TransactionConfig::default()
    };
    let mut engine = AtEngine::new(transport, config);

    println!("Probing {} at {} baud", if demo { "simulator" } else { port_name.as_str() }, baud_rate);
    println!("{:-<60}", "");
    for probe in PROBES {
        match engine.transact(&Command::from(probe)) {
            Ok(tx) => println!(
                "{:<12} OK   {:<14} {:?} ({} attempt(s), {:?})",
                probe, tx.response.command_name, tx.response.parameters, tx.attempts, tx.elapsed
            ),
            Err(e) => println!("{:<12} FAIL {}", probe, e),
        }
    }

    let counters = engine.counters();
    println!("{:-<60}", "");
    println!(
        "tx {} bytes, rx {} bytes, {} attempts, {} failures",
        counters.tx_bytes, counters.rx_bytes, counters.attempts, counters.failures
    );
}
