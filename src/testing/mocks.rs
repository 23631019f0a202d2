//! Mock implementations for testing
//!
//! Provides an in-memory [`Transport`] that records every publish and can
//! inject inbound events, so components and the host can be exercised without
//! an MQTT broker.

use crate::transport::{InboundEvent, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// One recorded publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload parsed as JSON (`Value::Null` if it is not JSON)
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.payload).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Error)]
#[error("Mock transport failure: {0}")]
pub struct MockTransportError(pub String);

/// Mock transport for testing
#[derive(Debug, Default)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    should_fail: AtomicBool,
    connected: AtomicBool,
    inbound_sender: std::sync::Mutex<Option<mpsc::Sender<InboundEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose connect and publish calls fail
    pub fn with_failure() -> Self {
        let transport = Self::default();
        transport.set_should_fail(true);
        transport
    }

    /// Toggle failure injection at runtime
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        self.should_fail.load(Ordering::SeqCst)
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    /// Recorded publishes on exactly `topic`
    pub async fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published_messages
            .lock()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Recorded topics in publish order
    pub async fn published_topics(&self) -> Vec<String> {
        self.published_messages
            .lock()
            .await
            .iter()
            .map(|m| m.topic.clone())
            .collect()
    }

    pub async fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.published_messages.lock().await.clear();
    }

    /// Deliver an event to the registered inbound channel
    pub async fn inject(&self, event: InboundEvent) -> Result<(), MockTransportError> {
        let sender = self
            .inbound_sender
            .lock()
            .map_err(|_| MockTransportError("inbound sender lock poisoned".to_string()))?
            .clone();

        match sender {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|_| MockTransportError("inbound channel closed".to_string())),
            None => Err(MockTransportError("no inbound sender registered".to_string())),
        }
    }

    /// Deliver a non-retained command message
    pub async fn inject_message(&self, topic: &str, payload: &[u8]) -> Result<(), MockTransportError> {
        self.inject(InboundEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain: false,
        })
        .await
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.should_fail() {
            return Err(MockTransportError("Mock connection failure".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), Self::Error> {
        if self.should_fail() {
            return Err(MockTransportError("Mock publish failure".to_string()));
        }

        self.published_messages.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), Self::Error> {
        if self.should_fail() {
            return Err(MockTransportError("Mock subscribe failure".to_string()));
        }
        self.subscriptions.lock().await.push(filter.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_inbound_sender(&self, sender: mpsc::Sender<InboundEvent>) {
        if let Ok(mut slot) = self.inbound_sender.lock() {
            *slot = Some(sender);
        }
    }
}
