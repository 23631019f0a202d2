//! Error types for component lifecycle and command handling
//!
//! Lifecycle errors are returned to the caller of `start()`/`stop()`. Command
//! faults never leave the router; they are flattened into a sanitized string
//! and published on the result topic instead.

use crate::component::ComponentStatus;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Main error type for component operations
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Component already running (status: {status})")]
    AlreadyRunning { status: ComponentStatus },

    #[error("Component not running (status: {status})")]
    NotRunning { status: ComponentStatus },

    #[error("Component start failed: {message}")]
    StartFailed { message: String },

    #[error("Component hook failed: {message}")]
    Hook { message: String },

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("Invalid component identity: {message}")]
    InvalidIdentity { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl ComponentError {
    /// Create a domain hook error
    pub fn hook<S: Into<String>>(message: S) -> Self {
        Self::Hook {
            message: message.into(),
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload<S: Into<String>>(message: S) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create an invalid identity error
    pub fn invalid_identity<S: Into<String>>(message: S) -> Self {
        Self::InvalidIdentity {
            message: message.into(),
        }
    }

    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }

    /// Render the error for a result envelope's `error` field
    pub fn to_result_message(&self) -> String {
        let message = match self {
            Self::Hook { message } | Self::InvalidPayload { message } => message.clone(),
            other => other.to_string(),
        };
        sanitize_error_message(&message)
    }
}

fn secret_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex is valid")
    })
}

/// Strip secret-looking fragments and cap the length of a published error string
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = secret_pattern()
        .replace_all(message, "${1}=***")
        .to_string();

    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for component operations
pub type ComponentResult<T> = Result<T, ComponentError>;
