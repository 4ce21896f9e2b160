//! Impure I/O operations for MQTT client
//!
//! This module owns the `rumqttc` client and drives its event loop on a
//! background task, forwarding routed events to the device session.

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::DeviceConfig;
use crate::mqtt_span;
use crate::transport::{DeviceEvent, Transport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, QoS};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Capacity of the request channel between client and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long a clean disconnect may take before the event loop is stopped
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// MQTT transport client for the cloud bridge
pub struct MqttClient {
    client_id: String,
    client: AsyncClient,
    /// Taken by `connect`; the mutex makes the client `Sync`
    event_loop: Mutex<Option<EventLoop>>,
    event_loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl MqttClient {
    /// Create a client for the configured bridge, authenticated by `password`
    ///
    /// No network traffic happens until [`Transport::connect`] is called.
    pub fn new(config: &DeviceConfig, password: &str) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(config, password)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        Ok(MqttClient {
            client_id: config.client_id(),
            client,
            event_loop: Mutex::new(Some(event_loop)),
            event_loop_handle: None,
            shutdown_tx: None,
        })
    }

    /// Check whether the event loop task is still running
    pub fn is_running(&self) -> bool {
        self.event_loop_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Poll the event loop until a fatal event, an error, or shutdown
    ///
    /// The loop never reconnects: the first connection error ends it.
    async fn drive_event_loop(
        mut event_loop: EventLoop,
        events: mpsc::Sender<DeviceEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        if events.send(DeviceEvent::Connecting).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                            EventRoute::Forward(device_event) => {
                                if events.send(device_event).await.is_err() {
                                    debug!("Device session gone, stopping MQTT event loop");
                                    break;
                                }
                            }
                            EventRoute::Fatal(device_event) => {
                                let _ = events.send(device_event).await;
                                break;
                            }
                            EventRoute::InfrastructureEvent(event_str) => {
                                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
                            }
                            EventRoute::OutgoingEvent => {}
                        },
                        Err(e) => {
                            error!("MQTT event loop error: {}", e);
                            let _ = events
                                .send(DeviceEvent::Disconnected {
                                    reason: e.to_string(),
                                })
                                .await;
                            break;
                        }
                    }
                }
            }
        }

        info!("MQTT event loop stopped");
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self, events: mpsc::Sender<DeviceEvent>) -> Result<(), Self::Error> {
        let event_loop = self
            .event_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(MqttError::AlreadyStarted)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!("Connecting to MQTT bridge as {}", self.client_id);
        let span = mqtt_span!(client_id = %self.client_id);
        let handle = tokio::spawn(
            Self::drive_event_loop(event_loop, events, shutdown_rx).instrument(span),
        );

        self.shutdown_tx = Some(shutdown_tx);
        self.event_loop_handle = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        let result = if self.is_running() {
            self.client
                .disconnect()
                .await
                .map_err(MqttError::DisconnectFailed)
        } else {
            Ok(())
        };

        if let Some(mut handle) = self.event_loop_handle.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                .await
                .is_err()
            {
                warn!("MQTT event loop did not stop after disconnect, forcing shutdown");
                if let Some(shutdown_tx) = &self.shutdown_tx {
                    let _ = shutdown_tx.send(true);
                }
                let _ = handle.await;
            }
        }

        result
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        debug!("Subscribing to {}", topic);
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(MqttError::SubscriptionFailed)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), Self::Error> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(MqttError::PublishFailed)
    }
}
