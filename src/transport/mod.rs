//! Transport layer between the device and the cloud bridge
//!
//! This module provides the transport abstraction used by the device
//! lifecycle and its MQTT implementation. Transports report everything the
//! broker tells them as [`DeviceEvent`]s on a channel handed over at connect
//! time; the device session is the single consumer of that channel.

use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc;

pub mod mqtt;

/// Broker-driven events, in the order the transport observed them
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A connection attempt has started
    Connecting,
    /// The broker accepted the connection
    Connected { session_present: bool },
    /// The connection was closed or could not be established
    Disconnected { reason: String },
    /// The broker acknowledged a QoS 1 publish
    PublishAcked { pkid: u16 },
    /// The broker answered a subscribe request; `0x80` marks a refused topic
    SubscribeAcked { pkid: u16, granted_qos: Vec<u8> },
    /// A message arrived on a subscribed topic
    Message {
        topic: String,
        qos: QoS,
        payload: Bytes,
    },
}

/// Transport trait for device communication
///
/// This trait provides an abstraction over the bridge connection to enable
/// dependency injection and testing.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start connecting; progress is reported on `events`
    async fn connect(&mut self, events: mpsc::Sender<DeviceEvent>) -> Result<(), Self::Error>;

    /// Disconnect from the bridge and stop reporting events
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Publish a payload to a topic
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), Self::Error>;
}
