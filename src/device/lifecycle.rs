//! Device lifecycle: connect, publish telemetry, disconnect
//!
//! All collaborators are injected, so the same sequence runs against the
//! MQTT bridge in the binary and against mocks in tests.

use super::indicator::Indicator;
use super::sensors::LocalSensors;
use super::session::{run_session, DeviceSession};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::peripheral::PeripheralHandle;
use crate::telemetry::TelemetryPayload;
use crate::transport::mqtt::{ConnectionState, TopicBuilder};
use crate::transport::Transport;
use crate::{lifecycle_span, telemetry_span};
use chrono::Local;
use rumqttc::QoS;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};

/// Capacity of the channel between transport and session
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// What a completed run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub messages_published: u32,
    pub publish_failures: u32,
    pub led_on: bool,
    pub final_state: ConnectionState,
}

/// Device lifecycle management with dependency injection
pub struct DeviceLifecycle<T>
where
    T: Transport + 'static,
{
    config: DeviceConfig,
    transport: T,
    sensors: Box<dyn LocalSensors>,
    peripheral: PeripheralHandle,
    indicator: Box<dyn Indicator>,
}

impl<T> DeviceLifecycle<T>
where
    T: Transport + 'static,
{
    /// Create a new device lifecycle with injected dependencies
    pub fn new(
        config: DeviceConfig,
        transport: T,
        sensors: Box<dyn LocalSensors>,
        peripheral: PeripheralHandle,
        indicator: Box<dyn Indicator>,
    ) -> Self {
        Self {
            config,
            transport,
            sensors,
            peripheral,
            indicator,
        }
    }

    pub fn telemetry_topic(&self) -> String {
        TopicBuilder::build_telemetry_topic(&self.config.device.device_id, self.config.mqtt.message_type)
    }

    pub fn config_topic(&self) -> String {
        TopicBuilder::build_config_topic(&self.config.device.device_id)
    }

    /// Run until every configured message has been published
    pub async fn run(self) -> DeviceResult<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until every configured message has been published or `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> DeviceResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let span = lifecycle_span!(device_id = %self.config.device.device_id);
        self.execute(shutdown).instrument(span).await
    }

    async fn execute<F>(self, shutdown: F) -> DeviceResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let telemetry_topic = self.telemetry_topic();
        let config_topic = self.config_topic();
        let DeviceLifecycle {
            config,
            mut transport,
            mut sensors,
            peripheral,
            indicator,
        } = self;
        tokio::pin!(shutdown);

        let (session, monitor) = DeviceSession::new(indicator);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session_task = tokio::spawn(run_session(session, events_rx));

        if let Err(e) = transport.connect(events_tx).await {
            session_task.abort();
            release_peripheral(peripheral).await;
            return Err(DeviceError::transport(e));
        }

        let connect_timeout = Duration::from_secs(config.telemetry.connect_timeout_secs);
        let interrupted = tokio::select! {
            result = monitor.wait_for_connection(connect_timeout) => {
                if let Err(e) = result {
                    error!("{}", e);
                    if let Err(e) = transport.disconnect().await {
                        warn!("Disconnect after failed connection: {}", e);
                    }
                    session_task.abort();
                    release_peripheral(peripheral).await;
                    return Err(e);
                }
                false
            }
            _ = &mut shutdown => {
                info!("Shutdown requested while connecting");
                true
            }
        };

        let mut messages_published = 0;
        let mut publish_failures = 0;

        if !interrupted {
            if let Err(e) = transport.subscribe(&config_topic, QoS::AtLeastOnce).await {
                error!("Failed to subscribe to {}: {}", config_topic, e);
            }

            let num_messages = config.telemetry.num_messages;
            let interval = Duration::from_secs(config.telemetry.interval_secs);

            for message_number in 1..=num_messages {
                let payload =
                    TelemetryPayload::compose(&sensors.poll(), &peripheral.latest(), Local::now());

                let span = telemetry_span!(message_number, topic = %telemetry_topic);
                let published = match payload.to_json() {
                    Ok(json) => {
                        span.in_scope(|| {
                            info!("Publishing message {}/{}: '{}'", message_number, num_messages, json)
                        });
                        transport
                            .publish(&telemetry_topic, json.into_bytes(), QoS::AtLeastOnce)
                            .instrument(span)
                            .await
                            .map_err(DeviceError::transport)
                    }
                    Err(e) => Err(DeviceError::from(e)),
                };

                match published {
                    Ok(()) => messages_published += 1,
                    Err(e) => {
                        error!("Failed to publish message {}: {}", message_number, e);
                        publish_failures += 1;
                    }
                }

                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested, stopping telemetry");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        if let Err(e) = transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }

        let session = session_task.await.map_err(|e| {
            DeviceError::internal_error(format!("Device session task failed: {e}"))
        })?;
        release_peripheral(peripheral).await;

        let summary = RunSummary {
            messages_published,
            publish_failures,
            led_on: session.led_on(),
            final_state: session.connection_state(),
        };
        info!(?summary, "Device run complete");
        Ok(summary)
    }
}

async fn release_peripheral(peripheral: PeripheralHandle) {
    if let Err(e) = tokio::task::spawn_blocking(move || peripheral.join()).await {
        error!("Failed to stop peripheral reader: {}", e);
    }
}
