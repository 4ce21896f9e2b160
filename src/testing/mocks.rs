//! Mock implementations for testing
//!
//! Provides a scripted Transport and a recording Indicator so the device
//! lifecycle can be exercised without a broker or hardware.

use crate::device::indicator::{Indicator, IndicatorError};
use crate::error::DeviceError;
use crate::transport::{DeviceEvent, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Topic, payload and QoS of one publish
pub type PublishedMessage = (String, Vec<u8>, QoS);

/// Mock transport for testing
///
/// Clones share their recorded history, so a test can keep one clone while
/// the lifecycle owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscriptions: Arc<Mutex<Vec<(String, QoS)>>>,
    pub disconnect_count: Arc<Mutex<u32>>,
    pub should_fail_publish: bool,
    connect_events: Vec<DeviceEvent>,
    granted_qos: u8,
    config_payload: Option<Bytes>,
    events: Arc<Mutex<Option<mpsc::Sender<DeviceEvent>>>>,
    next_pkid: Arc<Mutex<u16>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            published_messages: Arc::default(),
            subscriptions: Arc::default(),
            disconnect_count: Arc::default(),
            should_fail_publish: false,
            connect_events: vec![
                DeviceEvent::Connecting,
                DeviceEvent::Connected {
                    session_present: false,
                },
            ],
            granted_qos: 1,
            config_payload: None,
            events: Arc::default(),
            next_pkid: Arc::new(Mutex::new(1)),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose broker never answers the connect
    pub fn never_connects() -> Self {
        Self {
            connect_events: vec![DeviceEvent::Connecting],
            ..Default::default()
        }
    }

    /// A transport whose broker refuses the connection
    pub fn refused() -> Self {
        Self {
            connect_events: vec![
                DeviceEvent::Connecting,
                DeviceEvent::Disconnected {
                    reason: "Connection refused: NotAuthorized".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    pub fn with_publish_failure() -> Self {
        Self {
            should_fail_publish: true,
            ..Default::default()
        }
    }

    /// Deliver `payload` on the subscribed topic right after each subscribe
    pub fn with_config(mut self, payload: impl Into<Bytes>) -> Self {
        self.config_payload = Some(payload.into());
        self
    }

    /// Answer subscribes with the given SubAck return code
    pub fn with_granted_qos(mut self, code: u8) -> Self {
        self.granted_qos = code;
        self
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn get_subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn get_disconnect_count(&self) -> u32 {
        *self.disconnect_count.lock().await
    }

    async fn emit(&self, event: DeviceEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    async fn next_pkid(&self) -> u16 {
        let mut pkid = self.next_pkid.lock().await;
        let current = *pkid;
        *pkid = pkid.wrapping_add(1).max(1);
        current
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = DeviceError;

    async fn connect(&mut self, events: mpsc::Sender<DeviceEvent>) -> Result<(), Self::Error> {
        *self.events.lock().await = Some(events);
        for event in self.connect_events.clone() {
            self.emit(event).await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        *self.disconnect_count.lock().await += 1;
        self.emit(DeviceEvent::Disconnected {
            reason: "Client disconnected".to_string(),
        })
        .await;
        // Closing the channel ends the device session
        self.events.lock().await.take();
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        self.subscriptions
            .lock()
            .await
            .push((topic.to_string(), qos));

        let pkid = self.next_pkid().await;
        self.emit(DeviceEvent::SubscribeAcked {
            pkid,
            granted_qos: vec![self.granted_qos],
        })
        .await;

        if let Some(payload) = &self.config_payload {
            self.emit(DeviceEvent::Message {
                topic: topic.to_string(),
                qos,
                payload: payload.clone(),
            })
            .await;
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), Self::Error> {
        if self.should_fail_publish {
            return Err(DeviceError::internal_error("Mock publish failure"));
        }

        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), payload, qos));

        let pkid = self.next_pkid().await;
        self.emit(DeviceEvent::PublishAcked { pkid }).await;
        Ok(())
    }
}

/// Indicator that records every switch
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    calls: Arc<std::sync::Mutex<Vec<bool>>>,
    should_fail: bool,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An indicator that records the attempt and then fails
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<bool> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) -> Result<(), IndicatorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(on);
        }
        if self.should_fail {
            Err(IndicatorError::Unavailable("mock indicator failure".to_string()))
        } else {
            Ok(())
        }
    }
}
