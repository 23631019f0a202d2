//! Agent host owning every component of one agent process
//!
//! The host is the enclosing process the component contract assumes: it builds
//! each [`ComponentContext`], owns the instances for the process lifetime, and
//! drains the transport's inbound channel one event at a time so that a
//! component's handlers never run concurrently.

use super::managed::ManagedComponent;
use crate::component::{ComponentContext, DispatchOutcome};
use crate::components::build_component;
use crate::config::AgentConfig;
use crate::error::{ComponentError, ComponentResult};
use crate::protocol::{
    all_commands_filter, parse_command_topic, validate_base_topic, validate_identifier,
    ComponentStatus, JsonMap,
};
use crate::transport::{InboundEvent, Transport};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Components of one agent, in registration order
pub struct ComponentHost<T: Transport + 'static> {
    agent_id: String,
    base_topic: String,
    transport: Arc<T>,
    components: Vec<Box<dyn ManagedComponent>>,
}

impl<T: Transport + 'static> ComponentHost<T> {
    /// Create an empty host for `agent_id` publishing under `base_topic`
    pub fn new(
        agent_id: impl Into<String>,
        base_topic: impl Into<String>,
        transport: Arc<T>,
    ) -> ComponentResult<Self> {
        let agent_id = agent_id.into();
        let base_topic = base_topic.into().trim_end_matches('/').to_string();

        validate_identifier(&agent_id)
            .map_err(|e| ComponentError::invalid_identity(format!("agent id: {e}")))?;
        validate_base_topic(&base_topic)
            .map_err(|e| ComponentError::invalid_identity(format!("base topic: {e}")))?;

        Ok(Self {
            agent_id,
            base_topic,
            transport,
            components: Vec::new(),
        })
    }

    /// Build a host and every configured component
    pub fn from_config(config: &AgentConfig, transport: Arc<T>) -> ComponentResult<Self> {
        let mut host = Self::new(&config.agent.id, config.agent.base_topic(), transport)?;

        for (component_id, component) in &config.components {
            let context = host.context_for(component_id, component.settings())?;
            let instance = build_component(component.kind(), context)?;
            host.add(instance)?;
            info!(
                component_id = %component_id,
                kind = %component.kind(),
                "Registered component"
            );
        }

        Ok(host)
    }

    /// Context for a new component of this agent
    pub fn context_for(&self, component_id: &str, config: JsonMap) -> ComponentResult<ComponentContext<T>> {
        ComponentContext::create(
            self.agent_id.as_str(),
            self.base_topic.as_str(),
            component_id,
            Arc::clone(&self.transport),
            config,
        )
    }

    /// Register a component; ids are unique within the host
    pub fn add(&mut self, component: Box<dyn ManagedComponent>) -> ComponentResult<()> {
        if self.component(component.component_id()).is_some() {
            return Err(ComponentError::invalid_identity(format!(
                "component '{}' is already registered",
                component.component_id()
            )));
        }
        self.components.push(component);
        Ok(())
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component_ids(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.component_id()).collect()
    }

    pub fn component(&self, component_id: &str) -> Option<&dyn ManagedComponent> {
        self.components
            .iter()
            .find(|c| c.component_id() == component_id)
            .map(|c| c.as_ref())
    }

    fn component_mut(&mut self, component_id: &str) -> Option<&mut Box<dyn ManagedComponent>> {
        self.components
            .iter_mut()
            .find(|c| c.component_id() == component_id)
    }

    /// Subscription filter covering every component's commands
    pub fn command_filter(&self) -> String {
        all_commands_filter(&self.base_topic)
    }

    /// Start every component in registration order
    ///
    /// A failing component is logged and left in its error state; the rest
    /// still start. Returns the number of components now running.
    pub async fn start_all(&mut self) -> usize {
        let mut running = 0;
        for component in &mut self.components {
            match component.start().await {
                Ok(()) => running += 1,
                Err(e) => error!(
                    component_id = %component.component_id(),
                    error = %e,
                    "Component failed to start"
                ),
            }
        }
        info!(running, total = self.components.len(), "Components started");
        running
    }

    /// Stop every component in reverse registration order
    pub async fn stop_all(&mut self) {
        for component in self.components.iter_mut().rev() {
            if let Err(e) = component.stop().await {
                warn!(
                    component_id = %component.component_id(),
                    error = %e,
                    "Component failed to stop"
                );
            }
        }
        info!("Components stopped");
    }

    /// Process one inbound event
    ///
    /// Returns the dispatch outcome when a message reached a component.
    pub async fn handle_event(&mut self, event: InboundEvent) -> Option<DispatchOutcome> {
        match event {
            InboundEvent::Message {
                topic,
                payload,
                retain,
            } => self.handle_message(&topic, &payload, retain).await,
            InboundEvent::Reconnected => {
                self.republish_running().await;
                None
            }
        }
    }

    async fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Option<DispatchOutcome> {
        if retain {
            debug!(topic = %topic, "Ignoring retained command message");
            return None;
        }

        let Some(command) = parse_command_topic(&self.base_topic, topic) else {
            debug!(topic = %topic, "Ignoring message outside the command namespace");
            return None;
        };

        let Some(component) = self.component_mut(command.component_id) else {
            warn!(
                component_id = %command.component_id,
                action = %command.action,
                "Command for unknown component dropped"
            );
            return None;
        };

        match component.handle_message(topic, payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    component_id = %command.component_id,
                    action = %command.action,
                    error = %e,
                    "Failed to publish command result"
                );
                None
            }
        }
    }

    /// Republish retained documents of every RUNNING component
    pub async fn republish_running(&self) {
        for component in &self.components {
            if component.status() != ComponentStatus::Running {
                continue;
            }
            if let Err(e) = component.republish_retained().await {
                warn!(
                    component_id = %component.component_id(),
                    error = %e,
                    "Failed to republish retained documents"
                );
            }
        }
    }

    /// Drain `receiver` until `shutdown` resolves or the channel closes
    pub async fn run<F>(&mut self, mut receiver: mpsc::Receiver<InboundEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(agent_id = %self.agent_id, "Processing inbound events");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving event loop");
                    break;
                }
                event = receiver.recv() => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => {
                        info!("Inbound channel closed, leaving event loop");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn host() -> ComponentHost<MockTransport> {
        ComponentHost::new("agent", "lucid/agents/agent/", Arc::new(MockTransport::new())).unwrap()
    }

    #[test]
    fn test_new_trims_base_topic() {
        let host = host();
        assert_eq!(host.base_topic(), "lucid/agents/agent");
        assert_eq!(host.command_filter(), "lucid/agents/agent/components/+/cmd/#");
        assert!(host.is_empty());
    }

    #[test]
    fn test_new_rejects_bad_identity() {
        assert!(ComponentHost::new("bad id", "lucid", Arc::new(MockTransport::new())).is_err());
        assert!(ComponentHost::new("agent", "lucid/#", Arc::new(MockTransport::new())).is_err());
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let mut host = host();
        let first = build_component("example", host.context_for("led", JsonMap::new()).unwrap()).unwrap();
        let second = build_component("example", host.context_for("led", JsonMap::new()).unwrap()).unwrap();

        host.add(first).unwrap();
        assert!(matches!(
            host.add(second),
            Err(ComponentError::InvalidIdentity { .. })
        ));
        assert_eq!(host.component_ids(), vec!["led"]);
    }

    #[tokio::test]
    async fn test_unknown_component_dropped() {
        let mut host = host();
        let outcome = host
            .handle_event(InboundEvent::Message {
                topic: "lucid/agents/agent/components/ghost/cmd/ping".to_string(),
                payload: b"{}".to_vec(),
                retain: false,
            })
            .await;
        assert!(outcome.is_none());
        assert!(host.transport().get_published_messages().await.is_empty());
    }
}
