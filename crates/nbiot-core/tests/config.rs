//! Config file and state file handling on disk

use nbiot_core::config::{ConfigError, ModemConfig};
use nbiot_core::protocol::ApnCommand;
use nbiot_core::state::LampState;
use pretty_assertions::assert_eq;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nbiot.json");

    let mut config = ModemConfig::default();
    config.serial.port = Some("/dev/ttyAMA0".to_string());
    config.network.apn_command = ApnCommand::DefaultContext;
    config.transaction.per_attempt_timeout = Duration::from_millis(8000);
    config.save(&path).unwrap();

    let loaded = ModemConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"per_attempt_timeout_ms\": 8000"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ModemConfig::load_or_default(dir.path().join("absent.json")).unwrap();
    assert_eq!(config.transaction.max_attempts, 5);
    assert!(matches!(
        ModemConfig::load(dir.path().join("absent.json")),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn test_malformed_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nbiot.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(ModemConfig::load(&path), Err(ConfigError::Parse { .. })));

    fs::write(&path, r#"{"transaction": {"max_attempts": 0}}"#).unwrap();
    assert!(matches!(ModemConfig::load(&path), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_lamp_state_accepts_legacy_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");

    fs::write(&path, "True").unwrap();
    assert!(LampState::load(&path).unwrap().is_on());

    fs::write(&path, "").unwrap();
    assert!(LampState::load(&path).unwrap().is_on());

    fs::write(&path, "garbage").unwrap();
    assert!(LampState::load(&path).is_err());
}
