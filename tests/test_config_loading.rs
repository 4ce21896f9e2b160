//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, merging with command
//! line flags, and error handling.

use clap::Parser;
use cloudiot_device::cli::CliOverrides;
use cloudiot_device::config::{ConfigError, DeviceConfig, MessageType};
use cloudiot_device::JwtAlgorithm;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    overrides: CliOverrides,
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[device]
project_id = "test-project"
registry_id = "test-registry"
device_id = "test-device"

[auth]
private_key_file = "rsa_private.pem"
algorithm = "RS256"

[telemetry]
num_messages = 5
"#
    )
    .unwrap();

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.project_id, "test-project");
    assert_eq!(config.device.registry_id, "test-registry");
    assert_eq!(config.device.device_id, "test-device");
    assert_eq!(config.auth.algorithm, JwtAlgorithm::Rs256);
    assert_eq!(config.telemetry.num_messages, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_file_is_completed_by_flags() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[device]
registry_id = "test-registry"
cloud_region = "asia-east1"

[mqtt]
message_type = "state"
"#
    )
    .unwrap();

    let mut config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingField(_))
    ));

    let cli = TestCli::try_parse_from([
        "cloudiot-device",
        "--project-id",
        "flag-project",
        "--device-id",
        "flag-device",
        "--private-key-file",
        "ec_private.pem",
        "--algorithm",
        "ES256",
    ])
    .unwrap();
    cli.overrides.apply_to(&mut config);

    assert!(config.validate().is_ok());
    assert_eq!(config.device.project_id, "flag-project");
    assert_eq!(config.device.registry_id, "test-registry");
    assert_eq!(config.mqtt.message_type, MessageType::State);
    assert_eq!(
        config.client_id(),
        "projects/flag-project/locations/asia-east1/registries/test-registry/devices/flag-device"
    );
}

#[test]
fn test_flags_win_over_file_values() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[mqtt]
bridge_hostname = "mqtt.example.com"
bridge_port = 1883

[telemetry]
num_messages = 50
"#
    )
    .unwrap();

    let mut config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    let cli = TestCli::try_parse_from([
        "cloudiot-device",
        "--mqtt-bridge-port",
        "443",
        "--num-messages",
        "0",
    ])
    .unwrap();
    cli.overrides.apply_to(&mut config);

    assert_eq!(config.mqtt.bridge_hostname, "mqtt.example.com");
    assert_eq!(config.mqtt.bridge_port, 443);
    assert_eq!(config.telemetry.num_messages, 0);
}

#[test]
fn test_missing_config_file_returns_error() {
    let result = DeviceConfig::load_from_file(Path::new("/nonexistent/device.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_returns_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[device\nproject_id = ").unwrap();

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_wrong_value_type_returns_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[mqtt]\nbridge_port = \"eight\"").unwrap();

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_unknown_algorithm_in_file_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[auth]\nalgorithm = \"HS256\"").unwrap();

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_zero_connect_timeout_is_rejected() {
    let mut config = DeviceConfig::default();
    config.device.project_id = "p".to_string();
    config.device.registry_id = "r".to_string();
    config.device.device_id = "d".to_string();
    config.auth.private_key_file = PathBuf::from("key.pem");
    config.telemetry.connect_timeout_secs = 0;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
fn test_identifier_with_space_is_rejected() {
    let mut config = DeviceConfig::default();
    config.device.project_id = "my project".to_string();

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidIdentifier {
            field: "project_id",
            ..
        }
    ));
    assert!(err.to_string().contains("my project"));
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = DeviceConfig::default();
    config.device.project_id = "p".to_string();
    config.mqtt.message_type = MessageType::State;

    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: DeviceConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}
