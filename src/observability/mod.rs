//! Structured logging for the agent process and its components

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{command_span, component_span, lifecycle_span, mqtt_span};
