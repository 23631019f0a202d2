//! Lucid component base
//!
//! Lifecycle and messaging foundation for components hosted by a Lucid agent
//! process over MQTT.
//!
//! # Overview
//!
//! This crate provides:
//! - Topic layout, identifier validation, and wire documents ([`protocol`])
//! - The component base: context, lifecycle, retained documents, and the
//!   command router ([`component`])
//! - A pluggable example component ([`components`])
//! - The agent host that routes inbound commands to components ([`agent`])
//! - An MQTT transport with reconnection ([`transport`])
//!
//! # Quick Start
//!
//! ```rust
//! use lucid_component::component::ComponentContext;
//! use lucid_component::components::ExampleComponent;
//! use lucid_component::testing::MockTransport;
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(MockTransport::new());
//! let context = ComponentContext::create(
//!     "agent-1",
//!     "lucid/agents/agent-1",
//!     "example",
//!     transport.clone(),
//!     Map::new(),
//! )?;
//!
//! let mut component = ExampleComponent::component(context)?;
//! component.start().await?;
//!
//! component
//!     .dispatch("ping", br#"{"request_id": "r1"}"#)
//!     .await?;
//!
//! let results = transport
//!     .published_on("lucid/agents/agent-1/components/example/evt/ping/result")
//!     .await;
//! assert_eq!(results[0].json()["ok"], true);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod agent;
pub mod component;
pub mod components;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use agent::{ComponentHost, ManagedComponent};
pub use component::{
    CommandHandler, CommandRouter, Component, ComponentBehavior, ComponentContext,
    ComponentState, DispatchOutcome,
};
pub use config::{AgentConfig, ComponentConfig, ConfigError};
pub use error::{ComponentError, ComponentResult};
pub use protocol::*;
pub use transport::mqtt::MqttClient;
pub use transport::{InboundEvent, Transport};
