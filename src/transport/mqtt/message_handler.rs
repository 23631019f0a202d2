//! Pure message routing and processing logic for MQTT events
//!
//! Routing decisions are pure; [`InboundForwarder`] is the only piece that
//! performs I/O, handing accepted messages to the agent host's channel.

use crate::transport::InboundEvent;
use rumqttc::v5::{mqttbytes::QoS, Event};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Whether an inbound publish should reach the agent host
    ///
    /// Commands are never retained, so retained copies are stale leftovers.
    pub fn should_forward(topic: &str, retain: bool) -> bool {
        if retain {
            debug!(topic = %topic, "Ignoring retained message");
            return false;
        }
        true
    }

    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => {
                use rumqttc::v5::mqttbytes::v5::Packet;
                match incoming {
                    Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                    Packet::Publish(publish) => EventRoute::MessageReceived {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload.to_vec(),
                        retain: publish.retain,
                    },
                    Packet::Disconnect(_) => EventRoute::Disconnected,
                    Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                        packet_id: suback.pkid,
                    },
                    other => EventRoute::InfrastructureEvent(format!("{other:?}")),
                }
            }
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// QoS for an outgoing publish
    ///
    /// Retained documents and command results use QoS 1; the `logs` and
    /// `telemetry` streams use QoS 0.
    pub fn determine_qos_level(topic: &str, retain: bool) -> QoS {
        if retain {
            return QoS::AtLeastOnce;
        }
        if topic.ends_with("/logs") || topic.contains("/telemetry/") {
            QoS::AtMostOnce
        } else {
            QoS::AtLeastOnce
        }
    }

    /// Subscription QoS for a command filter
    pub fn subscription_qos() -> QoS {
        QoS::AtLeastOnce
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed
    SubscriptionConfirmed { packet_id: u16 },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// Hands inbound events to the agent host (impure I/O)
#[derive(Default, Clone)]
pub struct InboundForwarder {
    sender: Option<mpsc::Sender<InboundEvent>>,
}

impl InboundForwarder {
    pub fn new() -> Self {
        Self { sender: None }
    }

    pub fn set_sender(&mut self, sender: mpsc::Sender<InboundEvent>) {
        self.sender = Some(sender);
    }

    pub async fn forward(&self, event: InboundEvent) -> Result<(), String> {
        match &self.sender {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| format!("Failed to forward inbound event: {e}")),
            None => {
                warn!("Received MQTT event but no inbound sender configured - event dropped");
                Err("No inbound sender configured".to_string())
            }
        }
    }
}
