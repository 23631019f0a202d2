//! Topic layout and identifier validation for component namespaces
//!
//! Every component owns `{base_topic}/components/{component_id}/` and publishes
//! or receives beneath it:
//!
//! | suffix                | direction | retained |
//! |-----------------------|-----------|----------|
//! | `metadata`            | out       | yes      |
//! | `status`              | out       | yes      |
//! | `state`               | out       | yes      |
//! | `cfg`                 | out       | yes      |
//! | `logs`                | out       | no       |
//! | `telemetry/<metric>`  | out       | no       |
//! | `cmd/<action>`        | in        | no       |
//! | `evt/<action>/result` | out       | no       |

use thiserror::Error;

const COMPONENTS_SEGMENT: &str = "components";
const CMD_SEGMENT: &str = "cmd";

/// Validate a component or agent identifier (`[a-zA-Z0-9._-]+`)
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }

    for ch in id.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' && ch != '-' {
            return Err(ValidationError::InvalidIdentifierChar(ch));
        }
    }

    Ok(())
}

/// Validate a base topic: non-empty and free of MQTT wildcards
pub fn validate_base_topic(base_topic: &str) -> Result<(), ValidationError> {
    let trimmed = base_topic.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyBaseTopic);
    }
    if let Some(ch) = trimmed.chars().find(|c| matches!(c, '+' | '#')) {
        return Err(ValidationError::WildcardInBaseTopic(ch));
    }
    Ok(())
}

/// Validate a command action (`ping`, `cfg/set`, ...)
pub fn validate_action(action: &str) -> Result<(), ValidationError> {
    if action.is_empty() || action.split('/').any(str::is_empty) {
        return Err(ValidationError::InvalidAction(action.to_string()));
    }
    if action.contains(['+', '#']) {
        return Err(ValidationError::InvalidAction(action.to_string()));
    }
    Ok(())
}

/// Validation errors for identifiers and topics
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Identifier cannot be empty")]
    EmptyIdentifier,
    #[error("Identifier contains invalid character: '{0}'")]
    InvalidIdentifierChar(char),
    #[error("Base topic cannot be empty")]
    EmptyBaseTopic,
    #[error("Base topic contains wildcard: '{0}'")]
    WildcardInBaseTopic(char),
    #[error("Invalid command action: '{0}'")]
    InvalidAction(String),
}

/// Topic builder for one component namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTopics {
    root: String,
}

impl ComponentTopics {
    pub fn new(base_topic: &str, component_id: &str) -> Self {
        Self {
            root: format!(
                "{}/{COMPONENTS_SEGMENT}/{component_id}",
                base_topic.trim_end_matches('/')
            ),
        }
    }

    /// `{base_topic}/components/{component_id}`
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn metadata(&self) -> String {
        format!("{}/metadata", self.root)
    }

    pub fn status(&self) -> String {
        format!("{}/status", self.root)
    }

    pub fn state(&self) -> String {
        format!("{}/state", self.root)
    }

    pub fn cfg(&self) -> String {
        format!("{}/cfg", self.root)
    }

    pub fn logs(&self) -> String {
        format!("{}/logs", self.root)
    }

    pub fn telemetry(&self, metric: &str) -> String {
        format!("{}/telemetry/{metric}", self.root)
    }

    pub fn command(&self, action: &str) -> String {
        format!("{}/{CMD_SEGMENT}/{action}", self.root)
    }

    /// Subscription filter for every command of this component
    pub fn command_filter(&self) -> String {
        format!("{}/{CMD_SEGMENT}/#", self.root)
    }

    pub fn result(&self, action: &str) -> String {
        format!("{}/evt/{action}/result", self.root)
    }

    /// Extract the action from one of this component's command topics
    ///
    /// The action is not validated and may be empty; an unroutable action
    /// still gets a result from the dispatcher.
    pub fn parse_action<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.root.as_str())?
            .strip_prefix('/')?
            .strip_prefix(CMD_SEGMENT)?
            .strip_prefix('/')
    }
}

/// A command topic split into its component id and action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopic<'a> {
    pub component_id: &'a str,
    pub action: &'a str,
}

/// Parse `{base_topic}/components/{component_id}/cmd/{action}` for any component
///
/// Only the component id is validated; see [`ComponentTopics::parse_action`].
pub fn parse_command_topic<'a>(base_topic: &str, topic: &'a str) -> Option<CommandTopic<'a>> {
    let rest = topic
        .strip_prefix(base_topic.trim_end_matches('/'))?
        .strip_prefix('/')?
        .strip_prefix(COMPONENTS_SEGMENT)?
        .strip_prefix('/')?;

    let (component_id, rest) = rest.split_once('/')?;
    let action = rest.strip_prefix(CMD_SEGMENT)?.strip_prefix('/')?;

    validate_identifier(component_id).ok()?;

    Some(CommandTopic {
        component_id,
        action,
    })
}

/// Subscription filter for every component command under a base topic
pub fn all_commands_filter(base_topic: &str) -> String {
    format!(
        "{}/{COMPONENTS_SEGMENT}/+/{CMD_SEGMENT}/#",
        base_topic.trim_end_matches('/')
    )
}
