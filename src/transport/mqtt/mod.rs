//! MQTT transport for the component contract
//!
//! Pure functions are kept apart from I/O:
//!
//! - [`connection`] - connection state, backoff, broker options
//! - [`message_handler`] - event routing and QoS selection
//! - [`health_monitor`] - reconnection decisions and state transitions
//! - [`client`] - the client and its reconnection supervisor
//!
//! # Usage
//!
//! ```rust,no_run
//! use lucid_component::config::MqttSection;
//! use lucid_component::transport::mqtt::MqttClient;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     username_env: None,
//!     password_env: None,
//!     keep_alive_secs: 60,
//! };
//!
//! let mut client = MqttClient::new("my-agent", config)?;
//! client.subscribe("lucid/agents/my-agent/components/+/cmd/#").await?;
//! client.connect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{
    configure_mqtt_options, generate_client_id, ConnectionState, MqttError, ReconnectConfig,
};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, InboundForwarder, MessageHandler};
