//! Static action → handler mapping for inbound commands
//!
//! The table is built once when a component is constructed. An action such as
//! `cfg/set` is looked up verbatim; a miss is the not-found path, which still
//! answers the sender with a failed [`crate::protocol::ResultEnvelope`].

use super::behavior::ComponentBehavior;
use super::handlers::{CfgSetHandler, PingHandler};
use super::lifecycle::Component;
use crate::error::{ComponentError, ComponentResult};
use crate::protocol::{validate_action, CommandPayload};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One command action's implementation
///
/// A handler publishes exactly one result for its command (normally through
/// [`Component::publish_result`]) and returns `Ok`, or publishes nothing and
/// returns `Err`, in which case the router publishes the failure.
#[async_trait]
pub trait CommandHandler<B, T>: Send + Sync
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    async fn handle(
        &self,
        component: &mut Component<B, T>,
        payload: &CommandPayload,
    ) -> ComponentResult<()>;
}

/// Typed decision produced for every dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran on a well-formed payload
    Handled,
    /// Payload failed to decode; handler ran on the default-substituted payload
    ParseError { reason: String },
    /// No handler for the action; an `unknown action` result was published
    NotFound,
    /// Handler returned an error; a failed result was published
    HandlerFailed { error: String },
}

impl DispatchOutcome {
    /// True when the command reached a handler that completed
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled | Self::ParseError { .. })
    }
}

/// Action → handler table
pub struct CommandRouter<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    handlers: BTreeMap<String, Arc<dyn CommandHandler<B, T>>>,
}

impl<B, T> CommandRouter<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    /// Empty table
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Table holding the standard `ping` and `cfg/set` handlers
    pub fn with_standard_handlers() -> Self {
        let mut router = Self::new();
        router
            .handlers
            .insert("ping".to_string(), Arc::new(PingHandler));
        router
            .handlers
            .insert("cfg/set".to_string(), Arc::new(CfgSetHandler));
        router
    }

    /// Bind `action` to `handler`, replacing any previous binding
    pub fn register<H>(&mut self, action: &str, handler: H) -> ComponentResult<&mut Self>
    where
        H: CommandHandler<B, T> + 'static,
    {
        validate_action(action).map_err(|e| ComponentError::invalid_payload(e.to_string()))?;

        if self
            .handlers
            .insert(action.to_string(), Arc::new(handler))
            .is_some()
        {
            debug!(action = %action, "Replaced existing command handler");
        }
        Ok(self)
    }

    /// Look up the handler for `action`
    pub fn handler(&self, action: &str) -> Option<Arc<dyn CommandHandler<B, T>>> {
        self.handlers.get(action).cloned()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered actions in sorted order
    pub fn actions(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Conventional handler name for an action: `cfg/set` → `on_cmd_cfg_set`
    pub fn handler_name(action: &str) -> String {
        let mut name = String::from("on_cmd");
        for segment in action.split('/') {
            name.push('_');
            name.push_str(segment);
        }
        name
    }
}

impl<B, T> Default for CommandRouter<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    fn default() -> Self {
        Self::with_standard_handlers()
    }
}
