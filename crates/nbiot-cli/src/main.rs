//! `nbiot` - talk to a SIM7020 NB-IoT modem from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use nbiot_core::config::{ModemConfig, DEFAULT_CONFIG_FILE};
use nbiot_core::demo::SimulatedModem;
use nbiot_core::device::{
    blink, BlynkClient, LampIndicators, MemoryPin, NetworkConnection, Sim7020,
};
use nbiot_core::protocol::{
    list_ports, open_transport, AtEngine, Command, SystemClock, TcpTransport, Transport,
};
use nbiot_core::state::LampState;

#[derive(Parser, Debug)]
#[command(name = "nbiot", version, about = "SIM7020 NB-IoT modem tool")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serial port (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Talk to a simulated modem instead of hardware
    #[arg(long)]
    demo: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List serial ports
    Ports,
    /// Send one raw AT command and print the decomposed response
    Send {
        /// Command text without the trailing CR LF, e.g. "AT+CSQ"
        command: String,
        /// Attempts for this command only
        #[arg(long)]
        attempts: Option<u32>,
        /// Per-attempt timeout in milliseconds for this command only
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run the APN/attach sequence and print the context
    Attach,
    /// Print the signal quality
    Signal,
    /// Publish a message over MQTT
    Publish { topic: String, message: String },
    /// Subscribe to an MQTT topic
    Subscribe { topic: String },
    /// Publish the persisted lamp state, optionally toggling it first
    Lamp {
        #[arg(long)]
        toggle: bool,
    },
    /// Read a Blynk virtual pin
    BlynkGet { pin: String },
    /// Write a Blynk virtual pin
    BlynkSet { pin: String, value: String },
    /// Print the effective configuration as JSON
    Config,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ModemConfig> {
    let mut config = ModemConfig::load_or_default(&cli.config)?;
    config.apply_env()?;
    if let Some(port) = &cli.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn open_link(config: &ModemConfig, demo: bool) -> Result<Box<dyn Transport>> {
    if demo {
        info!("Using simulated modem");
        return Ok(Box::new(SimulatedModem::new()));
    }

    if let Some(addr) = &config.serial.tcp_bridge {
        let transport = TcpTransport::connect(addr)
            .with_context(|| format!("Failed to connect to TCP bridge {}", addr))?;
        info!("Connected to TCP bridge {}", addr);
        return Ok(Box::new(transport));
    }

    let port = match &config.serial.port {
        Some(port) => port.clone(),
        None => match list_ports().into_iter().next() {
            Some(info) => info.name,
            None => bail!("No serial ports found; pass --port or use --demo"),
        },
    };
    let transport = open_transport(&port, Some(config.serial.baud_rate))
        .with_context(|| format!("Failed to open {}", port))?;
    info!("Opened {} at {} baud", port, config.serial.baud_rate);
    Ok(Box::new(transport))
}

fn network(config: &ModemConfig, demo: bool) -> Result<NetworkConnection> {
    let engine = AtEngine::new(open_link(config, demo)?, config.transaction.clone());
    Ok(NetworkConnection::new(engine, config.network.apn.clone())
        .with_apn_command(config.network.apn_command))
}

fn device(config: &ModemConfig, demo: bool) -> Result<Sim7020> {
    let lamp = LampState::load(config.device.state_file.clone())?;
    Ok(Sim7020::new(network(config, demo)?, MemoryPin::new(), lamp))
}

/// Bring the modem up to an attached state
fn attached_device(config: &ModemConfig, demo: bool) -> Result<Sim7020> {
    let mut device = device(config, demo)?;
    device.power_on();
    device.initialize()?;
    let report = device.connection_mut().configure_apn()?;
    if !report.attached {
        bail!("Modem did not attach to the network");
    }
    Ok(device)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!(config = %cli.config.display(), demo = cli.demo, "configuration ready");

    match cli.command {
        Cmd::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                match (port.vid, port.pid) {
                    (Some(vid), Some(pid)) => println!(
                        "{}  {:04x}:{:04x}  {}",
                        port.name,
                        vid,
                        pid,
                        port.product.unwrap_or_default()
                    ),
                    _ => println!("{}", port.name),
                }
            }
        }
        Cmd::Send {
            command,
            attempts,
            timeout_ms,
        } => {
            let mut net = network(&config, cli.demo)?;
            let mut tx_config = config.transaction.clone();
            if let Some(attempts) = attempts {
                tx_config.max_attempts = attempts;
            }
            if let Some(ms) = timeout_ms {
                tx_config.per_attempt_timeout = Duration::from_millis(ms);
            }
            let tx = net
                .engine_mut()
                .transact_with(&Command::from(command), &tx_config)?;
            println!("command:    {}", tx.response.command_name);
            println!("parameters: {:?}", tx.response.parameters);
            println!("attempts:   {}", tx.attempts);
            println!("elapsed:    {:?}", tx.elapsed);
        }
        Cmd::Attach => {
            let mut net = network(&config, cli.demo)?;
            net.check()?;
            let report = net.configure_apn()?;
            println!("attached: {}", report.attached);
            println!("context:  {:?}", report.context.parameters);
        }
        Cmd::Signal => {
            let mut net = network(&config, cli.demo)?;
            let quality = net.signal_quality()?;
            match quality.dbm() {
                Some(dbm) => println!("rssi {} ({} dBm), ber {}", quality.rssi, dbm, quality.ber),
                None => println!("rssi unknown, ber {}", quality.ber),
            }
        }
        Cmd::Publish { topic, message } => {
            let mut device = attached_device(&config, cli.demo)?;
            let mut session = device.mqtt(config.mqtt.clone());
            session.connect()?;
            session.publish_str(&topic, &message)?;
            session.disconnect()?;
            println!("published to {}", topic);
        }
        Cmd::Subscribe { topic } => {
            let mut device = attached_device(&config, cli.demo)?;
            let mut session = device.mqtt(config.mqtt.clone());
            session.connect()?;
            session.subscribe(&topic)?;
            println!("subscribed to {}", topic);
        }
        Cmd::Lamp { toggle } => {
            let mut device = attached_device(&config, cli.demo)?;
            if toggle {
                device.toggle_lamp()?;
            }
            let on = device.lamp().is_on();
            let topic = config.device.lamp_topic.clone();
            let mut session = device.mqtt(config.mqtt.clone());
            session.connect()?;
            session.publish_str(&topic, if on { "1" } else { "0" })?;
            session.disconnect()?;

            let mut indicators = LampIndicators::new(MemoryPin::new(), MemoryPin::new());
            indicators.show(on);
            blink(
                indicators.onboard_mut(),
                &SystemClock::new(),
                3,
                Duration::from_millis(100),
            );
            println!("lamp {}", if on { "on" } else { "off" });
        }
        Cmd::BlynkGet { pin } => {
            let mut blynk = BlynkClient::new(device(&config, cli.demo)?, config.blynk.clone());
            let value = blynk.get_value(&pin)?;
            println!("{} = {}", pin, value);
        }
        Cmd::BlynkSet { pin, value } => {
            let mut blynk = BlynkClient::new(device(&config, cli.demo)?, config.blynk.clone());
            blynk.send_value(&pin, &value)?;
            println!("{} <- {}", pin, value);
        }
        Cmd::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
