//! Transport layer for component messaging
//!
//! Components only ever publish; inbound commands are delivered by the
//! transport to an [`InboundEvent`] channel that the agent host drains.

pub mod mqtt;

/// Events delivered by the transport to the agent host
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A message arrived on a subscribed topic
    Message {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// The broker connection was re-established after a loss
    Reconnected,
}

/// Transport trait for component publishing and command delivery
///
/// Abstracts over the broker client so components can be tested against an
/// in-memory recorder.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the transport broker/server
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Disconnect from the transport broker/server
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Publish a payload; retained payloads are delivered to late subscribers
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool)
    -> Result<(), Self::Error>;

    /// Subscribe to a topic filter; filters are restored after reconnection
    async fn subscribe(&mut self, filter: &str) -> Result<(), Self::Error>;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool;

    /// Set the channel receiving inbound messages and reconnect notices
    fn set_inbound_sender(&self, sender: tokio::sync::mpsc::Sender<InboundEvent>);
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;
