//! Device configuration
//!
//! Configuration can come from a TOML file, from command-line flags, or both;
//! every field has a default so a file only needs the values it overrides.
//! Command-line values are applied on top of the file by the binary.

use crate::auth::JwtAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub peripheral: PeripheralSection,
}

/// Cloud identity of the device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub registry_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default = "default_cloud_region")]
    pub cloud_region: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            registry_id: String::new(),
            device_id: String::new(),
            cloud_region: default_cloud_region(),
        }
    }
}

fn default_cloud_region() -> String {
    "us-central1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// PEM private key used to sign the connection token
    #[serde(default)]
    pub private_key_file: PathBuf,
    #[serde(default = "default_algorithm")]
    pub algorithm: JwtAlgorithm,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            private_key_file: PathBuf::new(),
            algorithm: default_algorithm(),
        }
    }
}

fn default_algorithm() -> JwtAlgorithm {
    JwtAlgorithm::Rs256
}

/// Kind of message published on the telemetry topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Telemetry event, published to `/devices/{id}/events`
    Event,
    /// Device state, published to `/devices/{id}/state`
    State,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    #[serde(default = "default_bridge_hostname")]
    pub bridge_hostname: String,
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
    /// CA root certificate bundle used to verify the bridge
    #[serde(default = "default_ca_certs")]
    pub ca_certs: PathBuf,
    #[serde(default = "default_message_type")]
    pub message_type: MessageType,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            bridge_hostname: default_bridge_hostname(),
            bridge_port: default_bridge_port(),
            ca_certs: default_ca_certs(),
            message_type: default_message_type(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

fn default_bridge_hostname() -> String {
    "mqtt.googleapis.com".to_string()
}

fn default_bridge_port() -> u16 {
    8883
}

fn default_ca_certs() -> PathBuf {
    PathBuf::from("roots.pem")
}

fn default_message_type() -> MessageType {
    MessageType::Event
}

fn default_keep_alive() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Number of telemetry messages to publish before exiting
    #[serde(default = "default_num_messages")]
    pub num_messages: u32,
    /// Seconds between telemetry messages
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Seconds to wait for the bridge to accept the connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            num_messages: default_num_messages(),
            interval_secs: default_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_num_messages() -> u32 {
    100
}

fn default_interval() -> u64 {
    1
}

fn default_connect_timeout() -> u64 {
    5
}

/// Serial-attached sensor board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeripheralSection {
    #[serde(default = "default_peripheral_enabled")]
    pub enabled: bool,
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for PeripheralSection {
    fn default() -> Self {
        Self {
            enabled: default_peripheral_enabled(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

fn default_peripheral_enabled() -> bool {
    true
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),
    #[error("Invalid identifier for {field}: '{value}' must match [a-zA-Z0-9._-]+")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceConfig {
    /// Load configuration from a TOML file
    ///
    /// The result is not validated; required values may still be supplied on
    /// the command line. Call [`DeviceConfig::validate`] once all sources
    /// have been merged.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Render the configuration as a TOML document
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that the merged configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("project_id", &self.device.project_id)?;
        validate_identifier("registry_id", &self.device.registry_id)?;
        validate_identifier("device_id", &self.device.device_id)?;

        if self.auth.private_key_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("private_key_file"));
        }
        if self.telemetry.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.telemetry.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.peripheral.enabled && self.peripheral.port.is_empty() {
            return Err(ConfigError::MissingField("peripheral.port"));
        }

        Ok(())
    }

    /// MQTT client id expected by the bridge
    pub fn client_id(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.device.project_id,
            self.device.cloud_region,
            self.device.registry_id,
            self.device.device_id
        )
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField(field));
    }

    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !valid_chars {
        return Err(ConfigError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DeviceConfig {
        let mut config = DeviceConfig::default();
        config.device.project_id = "my-project".to_string();
        config.device.registry_id = "my-registry".to_string();
        config.device.device_id = "my-device".to_string();
        config.auth.private_key_file = PathBuf::from("rsa_private.pem");
        config
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[device]
project_id = "my-project"
registry_id = "my-registry"
device_id = "my-device"
cloud_region = "europe-west1"

[auth]
private_key_file = "ec_private.pem"
algorithm = "ES256"

[mqtt]
bridge_hostname = "mqtt.example.com"
bridge_port = 443
ca_certs = "/etc/ssl/roots.pem"
message_type = "state"

[telemetry]
num_messages = 10
interval_secs = 2

[peripheral]
enabled = false
"#;

        let config: DeviceConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.cloud_region, "europe-west1");
        assert_eq!(config.auth.algorithm, JwtAlgorithm::Es256);
        assert_eq!(config.mqtt.bridge_port, 443);
        assert_eq!(config.mqtt.message_type, MessageType::State);
        assert_eq!(config.telemetry.num_messages, 10);
        assert_eq!(config.telemetry.connect_timeout_secs, 5);
        assert!(!config.peripheral.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: DeviceConfig = toml::from_str("").unwrap();
        assert_eq!(config.device.cloud_region, "us-central1");
        assert_eq!(config.auth.algorithm, JwtAlgorithm::Rs256);
        assert_eq!(config.mqtt.bridge_hostname, "mqtt.googleapis.com");
        assert_eq!(config.mqtt.bridge_port, 8883);
        assert_eq!(config.mqtt.ca_certs, PathBuf::from("roots.pem"));
        assert_eq!(config.mqtt.message_type, MessageType::Event);
        assert_eq!(config.telemetry.num_messages, 100);
        assert_eq!(config.telemetry.interval_secs, 1);
        assert_eq!(config.peripheral.port, "/dev/ttyACM0");
        assert_eq!(config.peripheral.baud_rate, 115_200);
    }

    #[test]
    fn test_validate_requires_identity() {
        let config = DeviceConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("project_id"))
        ));

        let mut config = valid_config();
        config.auth.private_key_file = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("private_key_file"))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_identifier() {
        let mut config = valid_config();
        config.device.device_id = "bad/device".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdentifier {
                field: "device_id",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = valid_config();
        config.telemetry.interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_messages_is_valid() {
        let mut config = valid_config();
        config.telemetry.num_messages = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_loads_back() {
        let config = valid_config();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[device]"));
        assert_eq!(toml::from_str::<DeviceConfig>(&rendered).unwrap(), config);
    }

    #[test]
    fn test_client_id() {
        assert_eq!(
            valid_config().client_id(),
            "projects/my-project/locations/us-central1/registries/my-registry/devices/my-device"
        );
    }
}
