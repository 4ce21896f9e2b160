//! Command-line overrides for the device configuration
//!
//! Every flag is optional; a flag that is given replaces the value from the
//! configuration file.

use crate::auth::JwtAlgorithm;
use crate::config::{DeviceConfig, MessageType};
use crate::error::DeviceResult;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files tried, in order, when no configuration file is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["device.toml", "config/device.toml"];

#[derive(Debug, Clone, Default, Args)]
pub struct CliOverrides {
    /// GCP cloud project name
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT", global = true)]
    pub project_id: Option<String>,

    /// Cloud IoT registry id
    #[arg(long, global = true)]
    pub registry_id: Option<String>,

    /// Cloud IoT device id
    #[arg(long, global = true)]
    pub device_id: Option<String>,

    /// Path to private key file
    #[arg(long, value_name = "FILE", global = true)]
    pub private_key_file: Option<PathBuf>,

    /// Which encryption algorithm to use to generate the JWT
    #[arg(long, value_enum, ignore_case = true, global = true)]
    pub algorithm: Option<JwtAlgorithm>,

    /// GCP cloud region
    #[arg(long, global = true)]
    pub cloud_region: Option<String>,

    /// CA root certificate
    #[arg(long, value_name = "FILE", global = true)]
    pub ca_certs: Option<PathBuf>,

    /// Number of messages to publish
    #[arg(long, global = true)]
    pub num_messages: Option<u32>,

    /// MQTT bridge hostname
    #[arg(long, global = true)]
    pub mqtt_bridge_hostname: Option<String>,

    /// MQTT bridge port
    #[arg(long, global = true)]
    pub mqtt_bridge_port: Option<u16>,

    /// Indicates whether the message to be published is a telemetry event or a device state message
    #[arg(long, value_enum, global = true)]
    pub message_type: Option<MessageType>,

    /// Run without the serial sensor board
    #[arg(long, global = true)]
    pub no_remote_device: bool,

    /// Serial port of the sensor board
    #[arg(long, value_name = "PORT", global = true)]
    pub serial_port: Option<String>,
}

impl CliOverrides {
    /// Apply every given flag to `config`
    pub fn apply_to(&self, config: &mut DeviceConfig) {
        if let Some(project_id) = &self.project_id {
            config.device.project_id = project_id.clone();
        }
        if let Some(registry_id) = &self.registry_id {
            config.device.registry_id = registry_id.clone();
        }
        if let Some(device_id) = &self.device_id {
            config.device.device_id = device_id.clone();
        }
        if let Some(cloud_region) = &self.cloud_region {
            config.device.cloud_region = cloud_region.clone();
        }
        if let Some(private_key_file) = &self.private_key_file {
            config.auth.private_key_file = private_key_file.clone();
        }
        if let Some(algorithm) = self.algorithm {
            config.auth.algorithm = algorithm;
        }
        if let Some(ca_certs) = &self.ca_certs {
            config.mqtt.ca_certs = ca_certs.clone();
        }
        if let Some(hostname) = &self.mqtt_bridge_hostname {
            config.mqtt.bridge_hostname = hostname.clone();
        }
        if let Some(port) = self.mqtt_bridge_port {
            config.mqtt.bridge_port = port;
        }
        if let Some(message_type) = self.message_type {
            config.mqtt.message_type = message_type;
        }
        if let Some(num_messages) = self.num_messages {
            config.telemetry.num_messages = num_messages;
        }
        if self.no_remote_device {
            config.peripheral.enabled = false;
        }
        if let Some(port) = &self.serial_port {
            config.peripheral.port = port.clone();
        }
    }
}

/// Build the effective configuration: file, then flags, then validation
///
/// Without an explicit path the first existing default file is used; a
/// file is optional, flags alone are enough.
pub fn load_configuration(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
) -> DeviceResult<DeviceConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()),
    };

    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            DeviceConfig::load_from_file(&path)?
        }
        None => DeviceConfig::default(),
    };

    overrides.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}
