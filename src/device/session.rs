//! Device session: the single consumer of broker events
//!
//! The session owns the connectivity state and the LED flag. Events arrive on
//! one channel in the order the transport observed them and are handled one at
//! a time, so neither piece of state needs a lock. Connectivity is exported
//! through a `watch` channel for the lifecycle to wait on.

use super::indicator::Indicator;
use crate::error::{DeviceError, DeviceResult};
use crate::transport::mqtt::{ConnectionState, MessageHandler};
use crate::transport::DeviceEvent;
use rumqttc::QoS;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Interval between connectivity checks while waiting for a connection
const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration document delivered on the config topic
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub led_on: Option<bool>,
}

/// What a configuration message did to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// The message had no payload
    Empty,
    /// The payload was not a configuration document
    Invalid,
    /// The document did not change anything
    Unchanged,
    /// The LED was switched to the contained state
    Applied(bool),
}

pub struct DeviceSession {
    connection: watch::Sender<ConnectionState>,
    led_on: bool,
    indicator: Box<dyn Indicator>,
}

impl DeviceSession {
    /// Create a session and the monitor observing its connectivity
    pub fn new(indicator: Box<dyn Indicator>) -> (Self, ConnectionMonitor) {
        let (connection, receiver) = watch::channel(ConnectionState::Disconnected);
        let session = Self {
            connection,
            led_on: false,
            indicator,
        };
        (session, ConnectionMonitor { receiver })
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.borrow().clone()
    }

    /// Handle one broker event
    pub fn handle_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connecting => self.set_connection_state(ConnectionState::Connecting),
            DeviceEvent::Connected { session_present } => self.on_connect(session_present),
            DeviceEvent::Disconnected { reason } => self.on_disconnect(&reason),
            DeviceEvent::PublishAcked { pkid } => self.on_publish(pkid),
            DeviceEvent::SubscribeAcked { pkid, granted_qos } => {
                self.on_subscribe(pkid, &granted_qos)
            }
            DeviceEvent::Message {
                topic,
                qos,
                payload,
            } => {
                self.on_message(&topic, qos, &payload);
            }
        }
    }

    pub fn on_connect(&mut self, session_present: bool) {
        info!(session_present, "Connection Accepted.");
        self.set_connection_state(ConnectionState::Connected);
    }

    pub fn on_disconnect(&mut self, reason: &str) {
        info!("Disconnected: {}", reason);
        self.set_connection_state(ConnectionState::Disconnected);
    }

    pub fn on_publish(&mut self, pkid: u16) {
        debug!(pkid, "Published message acked.");
    }

    pub fn on_subscribe(&mut self, pkid: u16, granted_qos: &[u8]) {
        match MessageHandler::validate_subscription_success(granted_qos) {
            Ok(()) => info!(pkid, ?granted_qos, "Subscribed"),
            Err(e) => warn!(pkid, "Subscription failed. {}", e),
        }
    }

    /// Apply a configuration message
    pub fn on_message(&mut self, topic: &str, qos: QoS, payload: &[u8]) -> ConfigOutcome {
        info!(
            "Received message '{}' on topic '{}' with Qos {}",
            String::from_utf8_lossy(payload),
            topic,
            qos as u8
        );

        if payload.is_empty() {
            info!("no payload");
            return ConfigOutcome::Empty;
        }

        let update: ConfigUpdate = match serde_json::from_slice(payload) {
            Ok(update) => update,
            Err(e) => {
                warn!("Ignoring configuration that is not a valid document: {}", e);
                return ConfigOutcome::Invalid;
            }
        };

        match update.led_on {
            Some(led_on) if led_on != self.led_on => {
                self.led_on = led_on;
                if let Err(e) = self.indicator.set(led_on) {
                    error!("Failed to switch indicator: {}", e);
                }
                ConfigOutcome::Applied(led_on)
            }
            _ => ConfigOutcome::Unchanged,
        }
    }

    fn set_connection_state(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }
}

/// Read side of the session's connectivity state
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    receiver: watch::Receiver<ConnectionState>,
}

impl ConnectionMonitor {
    pub fn state(&self) -> ConnectionState {
        self.receiver.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.receiver.borrow() == ConnectionState::Connected
    }

    /// Wait until connected, checking once per second
    ///
    /// The timeout is counted in whole seconds.
    pub async fn wait_for_connection(&self, timeout: Duration) -> DeviceResult<()> {
        let timeout_secs = timeout.as_secs();
        let mut waited = 0;

        while !self.is_connected() && waited < timeout_secs {
            tokio::time::sleep(CONNECTION_POLL_INTERVAL).await;
            waited += 1;
        }

        if self.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::connect_timeout(timeout_secs))
        }
    }
}

/// Feed every event on `events` to the session until the channel closes
pub async fn run_session(
    mut session: DeviceSession,
    mut events: mpsc::Receiver<DeviceEvent>,
) -> DeviceSession {
    while let Some(event) = events.recv().await {
        session.handle_event(event);
    }
    debug!("Event channel closed, device session finished");
    session
}
