//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management,
//! configuration handling, and topic construction.

use crate::config::{DeviceConfig, MessageType};
use rumqttc::{MqttOptions, TlsConfiguration, Transport as RumqttcTransport};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The bridge ignores the username; the JWT in the password authenticates.
pub const BRIDGE_USERNAME: &str = "unused";

/// Connection state of the device
///
/// Transitions are driven by broker events only:
/// `Disconnected -> Connecting -> Connected -> Disconnected`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Failed to read CA certificate {path}")]
    CaCertificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid client configuration: {0}")]
    InvalidOptions(String),
    #[error("Event loop already started")]
    AlreadyStarted,
    #[error("Publishing failed")]
    PublishFailed(#[source] rumqttc::ClientError),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] rumqttc::ClientError),
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] rumqttc::ClientError),
}

/// Pure function to configure MQTT options for the bridge
pub fn configure_mqtt_options(
    config: &DeviceConfig,
    password: &str,
) -> Result<MqttOptions, MqttError> {
    if config.mqtt.bridge_hostname.is_empty() {
        return Err(MqttError::InvalidOptions(
            "bridge hostname must not be empty".to_string(),
        ));
    }
    if config.mqtt.keep_alive_secs == 0 {
        return Err(MqttError::InvalidOptions(
            "keep alive must be at least one second".to_string(),
        ));
    }

    let mut mqtt_options = MqttOptions::new(
        config.client_id(),
        config.mqtt.bridge_hostname.clone(),
        config.mqtt.bridge_port,
    );
    mqtt_options.set_credentials(BRIDGE_USERNAME, password);
    mqtt_options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs));

    // The bridge only accepts TLS, verified against the configured roots
    let ca = std::fs::read(&config.mqtt.ca_certs).map_err(|source| MqttError::CaCertificate {
        path: config.mqtt.ca_certs.clone(),
        source,
    })?;
    mqtt_options.set_transport(RumqttcTransport::tls_with_config(
        TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: None,
        },
    ));

    Ok(mqtt_options)
}

/// Per-device topic construction
pub struct TopicBuilder;

impl TopicBuilder {
    /// Build telemetry topic: `/devices/{device_id}/events` or `/devices/{device_id}/state`
    pub fn build_telemetry_topic(device_id: &str, message_type: MessageType) -> String {
        let suffix = match message_type {
            MessageType::Event => "events",
            MessageType::State => "state",
        };
        format!("/devices/{device_id}/{suffix}")
    }

    /// Build configuration topic: `/devices/{device_id}/config`
    pub fn build_config_topic(device_id: &str) -> String {
        format!("/devices/{device_id}/config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DeviceConfig {
        let mut config = DeviceConfig::default();
        config.device.project_id = "my-project".to_string();
        config.device.registry_id = "my-registry".to_string();
        config.device.device_id = "my-device".to_string();
        config.mqtt.ca_certs =
            PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/roots.pem"));
        config
    }

    #[test]
    fn test_topic_construction() {
        assert_eq!(
            TopicBuilder::build_telemetry_topic("my-device", MessageType::Event),
            "/devices/my-device/events"
        );
        assert_eq!(
            TopicBuilder::build_telemetry_topic("my-device", MessageType::State),
            "/devices/my-device/state"
        );
        assert_eq!(
            TopicBuilder::build_config_topic("my-device"),
            "/devices/my-device/config"
        );
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = test_config();
        let options = configure_mqtt_options(&config, "token").unwrap();

        assert_eq!(options.client_id(), config.client_id());
        assert_eq!(
            options.broker_address(),
            ("mqtt.googleapis.com".to_string(), 8883)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert_eq!(
            options.credentials(),
            Some((BRIDGE_USERNAME.to_string(), "token".to_string()))
        );
    }

    #[test]
    fn test_missing_ca_certificate() {
        let mut config = test_config();
        config.mqtt.ca_certs = PathBuf::from("/nonexistent/roots.pem");

        let result = configure_mqtt_options(&config, "token");
        assert!(matches!(result, Err(MqttError::CaCertificate { .. })));
    }

    #[test]
    fn test_empty_hostname_rejected() {
        let mut config = test_config();
        config.mqtt.bridge_hostname = String::new();

        let result = configure_mqtt_options(&config, "token");
        assert!(matches!(result, Err(MqttError::InvalidOptions(_))));
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
