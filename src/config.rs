//! Agent configuration loaded from TOML
//!
//! The agent process owns one broker connection and a set of components, each
//! bound to an id under the agent's base topic.

use crate::protocol::{validate_base_topic, validate_identifier};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Main agent configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub mqtt: MqttSection,
    /// Components keyed by component id
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
}

/// Agent identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Agent identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Topic prefix for this agent; defaults to `lucid/agents/{id}`
    pub base_topic: Option<String>,
}

impl AgentSection {
    pub fn base_topic(&self) -> String {
        match &self.base_topic {
            Some(topic) => topic.trim_end_matches('/').to_string(),
            None => format!("lucid/agents/{}", self.id),
        }
    }
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_keep_alive() -> u64 {
    60
}

/// Component configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ComponentConfig {
    /// Simple form: component_id = "kind"
    Simple(String),
    /// Complex form: component_id = { kind = "kind", config = { ... } }
    Complex {
        kind: String,
        #[serde(default)]
        config: Map<String, Value>,
    },
}

impl ComponentConfig {
    /// Implementation kind used to build the component
    pub fn kind(&self) -> &str {
        match self {
            ComponentConfig::Simple(kind) => kind,
            ComponentConfig::Complex { kind, .. } => kind,
        }
    }

    /// Per-component configuration mapping handed to the component context
    pub fn settings(&self) -> Map<String, Value> {
        match self {
            ComponentConfig::Simple(_) => Map::new(),
            ComponentConfig::Complex { config, .. } => config.clone(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("Invalid component ID format: {0}")]
    InvalidComponentId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate identifiers and the base topic
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.agent.id).map_err(|e| {
            ConfigError::InvalidAgentId(format!(
                "Agent ID '{}' must match pattern [a-zA-Z0-9._-]+: {e}",
                self.agent.id
            ))
        })?;

        validate_base_topic(&self.agent.base_topic())
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        for (component_id, component) in &self.components {
            validate_identifier(component_id).map_err(|e| {
                ConfigError::InvalidComponentId(format!(
                    "Component ID '{component_id}' must match pattern [a-zA-Z0-9._-]+: {e}"
                ))
            })?;
            if component.kind().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "Component '{component_id}' has an empty kind"
                )));
            }
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Get MQTT username, failing if the configured variable is unset
    pub fn require_mqtt_username(&self) -> Result<Option<String>, ConfigError> {
        match &self.mqtt.username_env {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(name.clone())),
            None => Ok(None),
        }
    }
}
