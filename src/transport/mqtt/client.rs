//! Impure I/O operations for MQTT client
//!
//! Owns the rumqttc client and a supervisor task that polls the event loop,
//! reconnects with backoff, restores subscriptions, and forwards inbound
//! events to the agent host.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, InboundForwarder, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{InboundEvent, Transport};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::PublishProperties;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

const REQUEST_CHANNEL_CAPACITY: usize = 10;

type SharedForwarder = Arc<std::sync::Mutex<InboundForwarder>>;

/// MQTT transport client for one agent process
pub struct MqttClient {
    agent_id: String,
    config: MqttSection,
    client: Arc<Mutex<AsyncClient>>,
    // Held until connect() moves it into the supervisor; the Mutex keeps the client Sync
    event_loop: Option<Mutex<EventLoop>>,
    event_loop_handle: Option<JoinHandle<()>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    reconnect_config: ReconnectConfig,
    subscribed_topics: Arc<Mutex<Vec<String>>>,
    forwarder: SharedForwarder,
}

impl MqttClient {
    pub fn new(agent_id: &str, config: MqttSection) -> Result<Self, MqttError> {
        let (client, event_loop) = Self::create_connection(agent_id, &config)?;

        Ok(MqttClient {
            agent_id: agent_id.to_string(),
            config,
            client: Arc::new(Mutex::new(client)),
            event_loop: Some(Mutex::new(event_loop)),
            event_loop_handle: None,
            state_rx: None,
            state_tx: None,
            shutdown_tx: None,
            reconnect_config: ReconnectConfig::default(),
            subscribed_topics: Arc::new(Mutex::new(Vec::new())),
            forwarder: Arc::new(std::sync::Mutex::new(InboundForwarder::new())),
        })
    }

    /// Replace the reconnection policy; must be called before `connect`
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Result<Self, MqttError> {
        HealthMonitor::validate_connection_config(&reconnect_config)
            .map_err(MqttError::ConnectionFailedStr)?;
        self.reconnect_config = reconnect_config;
        Ok(self)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Fresh client and event loop, used for the first connection and every
    /// reconnection attempt
    fn create_connection(
        agent_id: &str,
        config: &MqttSection,
    ) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mqtt_options = configure_mqtt_options(agent_id, config)?;
        Ok(AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY))
    }

    /// Create connection state and shutdown channels
    #[allow(clippy::type_complexity)]
    fn setup_connection_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let state_channels = watch::channel(ConnectionState::Connecting);
        let shutdown_channels = watch::channel(false);
        (state_channels, shutdown_channels)
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailedStr(
                        "State channel closed".to_string(),
                    ));
                }
                match *state_rx.borrow() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(ref reason) => {
                        return Err(MqttError::ConnectionFailedStr(reason.clone()));
                    }
                    ConnectionState::PermanentlyDisconnected(ref reason) => {
                        return Err(MqttError::ConnectionFailedStr(format!(
                            "Permanently disconnected: {reason}"
                        )));
                    }
                    ConnectionState::Connecting | ConnectionState::Reconnecting(_) => continue,
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectionFailedStr(
                "ConnAck timeout - no connection confirmation received".to_string(),
            )),
        }
    }

    /// Connect to the broker and start the reconnection supervisor
    ///
    /// Returns only once the broker has acknowledged the connection.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| MqttError::ConnectionFailedStr("Event loop already started".to_string()))?
            .into_inner();

        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) = Self::setup_connection_channels();
        self.state_rx = Some(state_rx.clone());
        self.state_tx = Some(state_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        let supervisor = Supervisor {
            agent_id: self.agent_id.clone(),
            config: self.config.clone(),
            client: Arc::clone(&self.client),
            event_loop,
            state_tx,
            shutdown_rx,
            reconnect_config: self.reconnect_config.clone(),
            subscribed_topics: Arc::clone(&self.subscribed_topics),
            forwarder: Arc::clone(&self.forwarder),
            reconnect_attempts: 0,
            connack_count: 0,
        };
        let span = crate::mqtt_span!(agent_id = %self.agent_id, operation = "event_loop");
        self.event_loop_handle = Some(tokio::spawn(supervisor.run().instrument(span)));

        let connection_timeout = HealthMonitor::calculate_connection_timeout(&self.reconnect_config);
        Self::wait_for_connection_confirmation(state_rx, connection_timeout).await
    }

    /// Stop the supervisor and disconnect from the broker
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
            debug!("Sent shutdown signal to reconnection supervisor");
        }

        {
            let client = self.client.lock().await;
            client
                .disconnect()
                .await
                .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;
        }

        if let Some(state_tx) = &self.state_tx {
            let _ = state_tx.send(ConnectionState::Disconnected(
                "Client disconnected".to_string(),
            ));
        }

        if let Some(handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("Event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!(error = %e, "Event loop task ended with error");
                }
                Err(_) => warn!("Event loop task didn't shut down gracefully, forcing abort"),
                _ => {}
            }
        }

        info!(agent_id = %self.agent_id, "MQTT client disconnected");
        Ok(())
    }

    /// Current connection state; `None` before `connect`
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn is_permanently_disconnected(&self) -> bool {
        matches!(
            self.connection_state(),
            Some(ConnectionState::PermanentlyDisconnected(_))
        )
    }

    /// Filters restored after every reconnection
    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.subscribed_topics.lock().await.clone()
    }

    /// Check connection state before operations
    fn check_connection_state(&self) -> Result<(), MqttError> {
        let state_rx = self.state_rx.as_ref().ok_or_else(|| {
            MqttError::ConnectionFailedStr("Client not connected: state_rx is None".to_string())
        })?;

        let current_state = state_rx.borrow().clone();
        if !HealthMonitor::can_publish(&current_state) {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        Ok(())
    }

    /// Publish with the QoS the topic calls for
    pub async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), MqttError> {
        self.check_connection_state()?;

        let qos = MessageHandler::determine_qos_level(topic, retain);
        let client = self.client.lock().await;
        client
            .publish_with_properties(topic, qos, retain, payload, PublishProperties::default())
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!(topic = %topic, retain, ?qos, "Published message");
        Ok(())
    }

    /// Subscribe to `filter` and remember it for reconnection
    ///
    /// Before `connect` the filter is only recorded; the first ConnAck
    /// subscribes it.
    pub async fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        if let Some(state_rx) = &self.state_rx {
            let current_state = state_rx.borrow().clone();
            if !HealthMonitor::can_subscribe(&current_state) {
                return Err(MqttError::NotConnected {
                    state: current_state,
                });
            }

            let client = self.client.lock().await;
            client
                .subscribe(filter, MessageHandler::subscription_qos())
                .await
                .map_err(|e| {
                    MqttError::SubscriptionFailed(
                        format!("Failed to subscribe to {filter}: {e}").into(),
                    )
                })?;
            info!(filter = %filter, "Subscribed");
        }

        let mut topics = self.subscribed_topics.lock().await;
        if !topics.iter().any(|t| t == filter) {
            topics.push(filter.to_string());
        }
        Ok(())
    }

    pub fn set_inbound_sender(&self, sender: mpsc::Sender<InboundEvent>) {
        match self.forwarder.lock() {
            Ok(mut forwarder) => forwarder.set_sender(sender),
            Err(_) => error!("Inbound forwarder lock poisoned; sender not installed"),
        }
    }
}

/// State moved into the background task that drives the event loop
struct Supervisor {
    agent_id: String,
    config: MqttSection,
    client: Arc<Mutex<AsyncClient>>,
    event_loop: EventLoop,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
    reconnect_config: ReconnectConfig,
    subscribed_topics: Arc<Mutex<Vec<String>>>,
    forwarder: SharedForwarder,
    reconnect_attempts: u32,
    connack_count: u64,
}

impl Supervisor {
    async fn run(mut self) {
        info!(agent_id = %self.agent_id, "Starting MQTT event loop with reconnection supervisor");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping reconnection supervisor");
                        break;
                    }
                }
                event_result = self.event_loop.poll() => {
                    let keep_running = match event_result {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            self.process_event_route(route).await
                        }
                        Err(e) => {
                            error!(agent_id = %self.agent_id, error = %e, "MQTT event loop error");
                            self.transition(ConnectionEvent::NetworkError(e.to_string()));
                            self.attempt_reconnection().await
                        }
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }

        info!(agent_id = %self.agent_id, "MQTT event loop stopped");
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.borrow().clone();
        if previous != next {
            HealthMonitor::log_state_transition(&previous, &next);
        }
        let _ = self.state_tx.send(next);
    }

    /// Returns false when the supervisor should stop
    async fn process_event_route(&mut self, route: EventRoute) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged => {
                self.transition(ConnectionEvent::ConnAckReceived);
                self.reconnect_attempts = 0;
                Self::resubscribe_to_topics(
                    Arc::clone(&self.client),
                    Arc::clone(&self.subscribed_topics),
                )
                .await;

                if HealthMonitor::is_reconnection(self.connack_count) {
                    Self::forward(Arc::clone(&self.forwarder), InboundEvent::Reconnected).await;
                }
                self.connack_count += 1;
                true
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                debug!(topic = %topic, retain, "Received MQTT message");
                if MessageHandler::should_forward(&topic, retain) {
                    Self::forward(
                        Arc::clone(&self.forwarder),
                        InboundEvent::Message {
                            topic,
                            payload,
                            retain,
                        },
                    )
                    .await;
                }
                true
            }
            EventRoute::Disconnected => {
                self.transition(ConnectionEvent::DisconnectedByBroker);
                self.attempt_reconnection().await
            }
            EventRoute::SubscriptionConfirmed { packet_id } => {
                debug!(packet_id, "Subscription confirmed");
                true
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(event = %event, "MQTT event");
                true
            }
            EventRoute::OutgoingEvent => true,
        }
    }

    async fn forward(forwarder: SharedForwarder, event: InboundEvent) {
        let forwarder = match forwarder.lock() {
            Ok(forwarder) => forwarder.clone(),
            Err(_) => {
                error!("Inbound forwarder lock poisoned; event dropped");
                return;
            }
        };
        if let Err(e) = forwarder.forward(event).await {
            warn!(error = %e, "Inbound event not delivered");
        }
    }

    async fn resubscribe_to_topics(
        client: Arc<Mutex<AsyncClient>>,
        subscribed_topics: Arc<Mutex<Vec<String>>>,
    ) {
        let topics = subscribed_topics.lock().await.clone();
        let client = client.lock().await;
        for topic in &topics {
            match client.subscribe(topic.as_str(), MessageHandler::subscription_qos()).await {
                Ok(()) => debug!(filter = %topic, "Re-subscribed"),
                Err(e) => error!(filter = %topic, error = %e, "Failed to re-subscribe"),
            }
        }
    }

    /// Returns false when reconnection was abandoned
    async fn attempt_reconnection(&mut self) -> bool {
        let decision = HealthMonitor::should_attempt_reconnection(
            self.reconnect_attempts,
            &self.reconnect_config,
            *self.shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                self.reconnect_attempts = attempt;
                self.transition(ConnectionEvent::ReconnectionStarted(attempt));

                let max_display = self
                    .reconnect_config
                    .max_attempts
                    .map_or("unlimited".to_string(), |max| max.to_string());
                info!(attempt, max = %max_display, delay_ms, "Attempting reconnection");

                if !interruptible_sleep(self.shutdown_rx.clone(), delay_ms).await {
                    return false;
                }
                if *self.shutdown_rx.borrow() {
                    info!("Shutdown signal received, aborting reconnection");
                    return false;
                }

                self.apply_new_connection().await;
                true
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                let reason = format!(
                    "Max reconnection attempts ({}) exceeded",
                    self.reconnect_attempts
                );
                self.transition(ConnectionEvent::PermanentFailure(reason));
                false
            }
        }
    }

    /// Swap in a fresh client and event loop; a failure leaves the old ones
    /// in place for the next attempt
    async fn apply_new_connection(&mut self) {
        match MqttClient::create_connection(&self.agent_id, &self.config) {
            Ok((new_client, new_event_loop)) => {
                self.event_loop = new_event_loop;
                *self.client.lock().await = new_client;
                debug!("Created new connection for reconnection attempt");
            }
            Err(e) => error!(error = %e, "Failed to create new connection"),
        }
    }
}

/// Sleep unless shutdown is requested first; true if the sleep completed
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received during reconnection delay, stopping");
                return false;
            }
            true
        }
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), Self::Error> {
        MqttClient::publish(self, topic, payload, retain).await
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, filter).await
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn set_inbound_sender(&self, sender: mpsc::Sender<InboundEvent>) {
        MqttClient::set_inbound_sender(self, sender)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // No async in Drop; callers should disconnect() for a clean shutdown
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
