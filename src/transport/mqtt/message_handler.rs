//! Pure routing of `rumqttc` events
//!
//! This module contains pure functions that turn raw MQTT events into the
//! [`DeviceEvent`]s consumed by the device session.

use crate::transport::DeviceEvent;
use rumqttc::{ConnectReturnCode, Event, Outgoing, Packet, SubscribeReasonCode};

/// Return code the broker uses in a SubAck for a refused subscription
pub const SUBSCRIPTION_FAILURE: u8 = 0x80;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => {
                    if connack.code == ConnectReturnCode::Success {
                        EventRoute::Forward(DeviceEvent::Connected {
                            session_present: connack.session_present,
                        })
                    } else {
                        EventRoute::Fatal(DeviceEvent::Disconnected {
                            reason: format!("Connection refused: {:?}", connack.code),
                        })
                    }
                }
                Packet::PubAck(puback) => {
                    EventRoute::Forward(DeviceEvent::PublishAcked { pkid: puback.pkid })
                }
                Packet::SubAck(suback) => EventRoute::Forward(DeviceEvent::SubscribeAcked {
                    pkid: suback.pkid,
                    granted_qos: suback.return_codes.iter().map(Self::granted_qos_code).collect(),
                }),
                Packet::Publish(publish) => EventRoute::Forward(DeviceEvent::Message {
                    topic: publish.topic.clone(),
                    qos: publish.qos,
                    payload: publish.payload.clone(),
                }),
                Packet::Disconnect => EventRoute::Fatal(DeviceEvent::Disconnected {
                    reason: "Broker disconnected".to_string(),
                }),
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::Fatal(DeviceEvent::Disconnected {
                reason: "Client disconnected".to_string(),
            }),
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Wire code for a SubAck return code (pure function)
    pub fn granted_qos_code(code: &SubscribeReasonCode) -> u8 {
        match code {
            SubscribeReasonCode::Success(qos) => *qos as u8,
            SubscribeReasonCode::Failure => SUBSCRIPTION_FAILURE,
        }
    }

    /// Validate subscription success from SubAck codes (pure function)
    pub fn validate_subscription_success(granted_qos: &[u8]) -> Result<(), String> {
        if granted_qos.iter().any(|&code| code >= SUBSCRIPTION_FAILURE) {
            Err(format!(
                "Subscription failed with return codes: {granted_qos:?}"
            ))
        } else {
            Ok(())
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Deliver to the device session
    Forward(DeviceEvent),
    /// Deliver to the device session, then stop the event loop
    Fatal(DeviceEvent),
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
