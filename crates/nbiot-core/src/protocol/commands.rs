//! Protocol commands
//!
//! Defines the AT commands used with SIM7020-class modems. `Display` renders
//! the exact text sent on the wire (without the `\r\n` terminator); the
//! modem is strict about quoting, so these formats must not drift.

use std::fmt;

/// Which command sets the APN during network attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApnCommand {
    /// `AT+CGDCONT=1,"IP","<apn>"`
    #[default]
    PdpContext,
    /// `AT*MCGDEFCONT="IP","<apn>"` (SIM7020 default PDN context)
    DefaultContext,
}

/// AT commands understood by the modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness check (`AT`)
    Attention,
    /// Set phone functionality (`AT+CFUN=0|1`)
    SetFunctionality(bool),
    /// Define PDP context 1 (`AT+CGDCONT=1,"IP","<apn>"`)
    DefinePdpContext {
        /// Access point name
        apn: String,
    },
    /// Set default PDN context (`AT*MCGDEFCONT="IP","<apn>"`)
    SetDefaultContext {
        /// Access point name
        apn: String,
    },
    /// Attach or detach packet service (`AT+CGATT=1|0`)
    SetAttach(bool),
    /// Query packet service attach state (`AT+CGATT?`)
    QueryAttach,
    /// Read dynamic PDP context parameters (`AT+CGCONTRDP`)
    ReadContextParameters,
    /// Signal quality report (`AT+CSQ`)
    SignalQuality,
    /// Create an MQTT connection slot (`AT+CMQNEW`)
    MqttNew {
        /// Broker host
        broker: String,
        /// Broker port
        port: u16,
        /// Command timeout in milliseconds
        timeout_ms: u32,
        /// Receive buffer size
        buffer_size: u32,
    },
    /// Send MQTT CONNECT on slot 0 (`AT+CMQCON`)
    MqttConnect {
        /// Version/clean-session field
        clean_session: u8,
        /// Client identifier
        client_id: String,
        /// Keep-alive interval in seconds
        keepalive_secs: u16,
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// Publish a hex-encoded payload on slot 0 (`AT+CMQPUB`)
    MqttPublish {
        /// Topic name
        topic: String,
        /// Quality of service
        qos: u8,
        /// Retain flag
        retain: bool,
        /// Payload, hex encoded
        hex_payload: String,
    },
    /// Subscribe on slot 0 (`AT+CMQSUB`)
    MqttSubscribe {
        /// Topic filter
        topic: String,
        /// Quality of service
        qos: u8,
    },
    /// Unsubscribe on slot 0 (`AT+CMQUNSUB`)
    MqttUnsubscribe {
        /// Topic filter
        topic: String,
    },
    /// Disconnect slot 0 (`AT+CMQDISCON=0`)
    MqttDisconnect,
    /// HTTP GET through the modem (`AT+HTTPGET="<url>"`)
    HttpGet {
        /// Full URL, scheme included
        url: String,
    },
    /// Any other command, sent verbatim
    Raw(String),
}

impl Command {
    /// APN command for the given style
    pub fn set_apn(style: ApnCommand, apn: &str) -> Self {
        match style {
            ApnCommand::PdpContext => Command::DefinePdpContext {
                apn: apn.to_string(),
            },
            ApnCommand::DefaultContext => Command::SetDefaultContext {
                apn: apn.to_string(),
            },
        }
    }

    /// Publish `payload`, hex-encoding it as the modem expects
    pub fn mqtt_publish(topic: &str, qos: u8, retain: bool, payload: &[u8]) -> Self {
        Command::MqttPublish {
            topic: topic.to_string(),
            qos,
            retain,
            hex_payload: hex::encode(payload),
        }
    }

    /// Wire text of the command, without terminator
    pub fn to_at_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Attention => write!(f, "AT"),
            Command::SetFunctionality(on) => write!(f, "AT+CFUN={}", u8::from(*on)),
            Command::DefinePdpContext { apn } => write!(f, "AT+CGDCONT=1,\"IP\",\"{}\"", apn),
            Command::SetDefaultContext { apn } => write!(f, "AT*MCGDEFCONT=\"IP\",\"{}\"", apn),
            Command::SetAttach(on) => write!(f, "AT+CGATT={}", u8::from(*on)),
            Command::QueryAttach => write!(f, "AT+CGATT?"),
            Command::ReadContextParameters => write!(f, "AT+CGCONTRDP"),
            Command::SignalQuality => write!(f, "AT+CSQ"),
            Command::MqttNew {
                broker,
                port,
                timeout_ms,
                buffer_size,
            } => write!(
                f,
                "AT+CMQNEW=\"{}\",\"{}\",{},{}",
                broker, port, timeout_ms, buffer_size
            ),
            Command::MqttConnect {
                clean_session,
                client_id,
                keepalive_secs,
                username,
                password,
            } => write!(
                f,
                "AT+CMQCON=0,{},\"{}\",{},1,0,\"{}\",\"{}\"",
                clean_session, client_id, keepalive_secs, username, password
            ),
            Command::MqttPublish {
                topic,
                qos,
                retain,
                hex_payload,
            } => write!(
                f,
                "AT+CMQPUB=0,\"{}\",{},{},0,{},\"{}\"",
                topic,
                qos,
                u8::from(*retain),
                hex_payload.len(),
                hex_payload
            ),
            Command::MqttSubscribe { topic, qos } => {
                write!(f, "AT+CMQSUB=0,\"{}\",{}", topic, qos)
            }
            Command::MqttUnsubscribe { topic } => write!(f, "AT+CMQUNSUB=0,\"{}\"", topic),
            Command::MqttDisconnect => write!(f, "AT+CMQDISCON=0"),
            Command::HttpGet { url } => write!(f, "AT+HTTPGET=\"{}\"", url),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::Raw(text.to_string())
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Command::Raw(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_network_command_formats() {
        assert_eq!(Command::Attention.to_string(), "AT");
        assert_eq!(Command::SetFunctionality(false).to_string(), "AT+CFUN=0");
        assert_eq!(Command::SetFunctionality(true).to_string(), "AT+CFUN=1");
        assert_eq!(Command::SetAttach(true).to_string(), "AT+CGATT=1");
        assert_eq!(Command::SetAttach(false).to_string(), "AT+CGATT=0");
        assert_eq!(Command::QueryAttach.to_string(), "AT+CGATT?");
        assert_eq!(Command::ReadContextParameters.to_string(), "AT+CGCONTRDP");
        assert_eq!(Command::SignalQuality.to_string(), "AT+CSQ");
    }

    #[test]
    fn test_apn_command_styles() {
        assert_eq!(
            Command::set_apn(ApnCommand::PdpContext, "nbiot").to_string(),
            r#"AT+CGDCONT=1,"IP","nbiot""#
        );
        assert_eq!(
            Command::set_apn(ApnCommand::DefaultContext, "nbiot").to_string(),
            r#"AT*MCGDEFCONT="IP","nbiot""#
        );
    }

    #[test]
    fn test_mqtt_command_formats() {
        let new = Command::MqttNew {
            broker: "blynk.cloud".to_string(),
            port: 1883,
            timeout_ms: 12000,
            buffer_size: 1024,
        };
        assert_eq!(new.to_string(), r#"AT+CMQNEW="blynk.cloud","1883",12000,1024"#);

        let con = Command::MqttConnect {
            clean_session: 3,
            client_id: "lamp-01".to_string(),
            keepalive_secs: 45,
            username: "device".to_string(),
            password: "s3cret".to_string(),
        };
        assert_eq!(
            con.to_string(),
            r#"AT+CMQCON=0,3,"lamp-01",45,1,0,"device","s3cret""#
        );

        let sub = Command::MqttSubscribe {
            topic: "downlink/ds/Lamp".to_string(),
            qos: 1,
        };
        assert_eq!(sub.to_string(), r#"AT+CMQSUB=0,"downlink/ds/Lamp",1"#);
        assert_eq!(
            Command::MqttUnsubscribe {
                topic: "ds/Lamp".to_string()
            }
            .to_string(),
            r#"AT+CMQUNSUB=0,"ds/Lamp""#
        );
        assert_eq!(Command::MqttDisconnect.to_string(), "AT+CMQDISCON=0");
    }

    #[test]
    fn test_mqtt_publish_hex_encodes_payload() {
        let cmd = Command::mqtt_publish("ds/Lamp", 1, false, b"hello");
        assert_eq!(
            cmd.to_string(),
            r#"AT+CMQPUB=0,"ds/Lamp",1,0,0,10,"68656c6c6f""#
        );

        let cmd = Command::mqtt_publish("ds/Lamp", 1, true, b"Hello");
        assert_eq!(
            cmd.to_string(),
            r#"AT+CMQPUB=0,"ds/Lamp",1,1,0,10,"48656c6c6f""#
        );
    }

    #[test]
    fn test_http_get_and_raw() {
        let cmd = Command::HttpGet {
            url: "http://blynk.cloud/TOKEN/get/V0".to_string(),
        };
        assert_eq!(cmd.to_string(), r#"AT+HTTPGET="http://blynk.cloud/TOKEN/get/V0""#);
        assert_eq!(Command::from("ATI").to_string(), "ATI");
    }
}
