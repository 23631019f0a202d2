//! Immutable identity and transport bundle handed to each component

use crate::error::{ComponentError, ComponentResult};
use crate::protocol::{validate_base_topic, validate_identifier, ComponentTopics, JsonMap};
use crate::transport::Transport;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// Identifiers, topic namespace, transport handle, and configuration for one
/// component instance
///
/// Built once by the agent process and never mutated afterwards. Cloning is
/// cheap and shares the transport.
pub struct ComponentContext<T: Transport> {
    agent_id: String,
    base_topic: String,
    component_id: String,
    topics: ComponentTopics,
    transport: Arc<T>,
    config: JsonMap,
}

impl<T: Transport> Clone for ComponentContext<T> {
    fn clone(&self) -> Self {
        Self {
            agent_id: self.agent_id.clone(),
            base_topic: self.base_topic.clone(),
            component_id: self.component_id.clone(),
            topics: self.topics.clone(),
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport> std::fmt::Debug for ComponentContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("agent_id", &self.agent_id)
            .field("base_topic", &self.base_topic)
            .field("component_id", &self.component_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> ComponentContext<T> {
    /// Validate the identity and build the context
    pub fn create(
        agent_id: impl Into<String>,
        base_topic: impl Into<String>,
        component_id: impl Into<String>,
        transport: Arc<T>,
        config: JsonMap,
    ) -> ComponentResult<Self> {
        let agent_id = agent_id.into();
        let base_topic = base_topic.into().trim_end_matches('/').to_string();
        let component_id = component_id.into();

        validate_identifier(&agent_id)
            .map_err(|e| ComponentError::invalid_identity(format!("agent id: {e}")))?;
        validate_identifier(&component_id)
            .map_err(|e| ComponentError::invalid_identity(format!("component id: {e}")))?;
        validate_base_topic(&base_topic)
            .map_err(|e| ComponentError::invalid_identity(format!("base topic: {e}")))?;

        let topics = ComponentTopics::new(&base_topic, &component_id);

        Ok(Self {
            agent_id,
            base_topic,
            component_id,
            topics,
            transport,
            config,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn topics(&self) -> &ComponentTopics {
        &self.topics
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Per-component configuration supplied by the agent process
    pub fn config(&self) -> &JsonMap {
        &self.config
    }

    /// Tracing span carrying this component's identity
    pub fn span(&self) -> tracing::Span {
        crate::component_span!(
            agent_id = %self.agent_id,
            component_id = %self.component_id
        )
    }

    /// Serialize `document` as JSON and publish it
    pub async fn publish_json<S>(&self, topic: &str, document: &S, retain: bool) -> ComponentResult<()>
    where
        S: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_vec(document)?;
        trace!(topic = %topic, retain, bytes = payload.len(), "Publishing component document");
        self.transport
            .publish(topic, payload, retain)
            .await
            .map_err(ComponentError::transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn context(component_id: &str) -> ComponentResult<ComponentContext<MockTransport>> {
        ComponentContext::create(
            "test-agent",
            "lucid/agents/test-agent",
            component_id,
            Arc::new(MockTransport::new()),
            JsonMap::new(),
        )
    }

    #[test]
    fn test_create_context() {
        let ctx = context("example").unwrap();
        assert_eq!(ctx.agent_id(), "test-agent");
        assert_eq!(ctx.base_topic(), "lucid/agents/test-agent");
        assert_eq!(ctx.component_id(), "example");
        assert_eq!(
            ctx.topics().status(),
            "lucid/agents/test-agent/components/example/status"
        );
    }

    #[test]
    fn test_rejects_invalid_identity() {
        assert!(matches!(
            context(""),
            Err(ComponentError::InvalidIdentity { .. })
        ));
        assert!(matches!(
            context("a/b"),
            Err(ComponentError::InvalidIdentity { .. })
        ));

        let result = ComponentContext::create(
            "agent",
            "lucid/#",
            "example",
            Arc::new(MockTransport::new()),
            JsonMap::new(),
        );
        assert!(matches!(result, Err(ComponentError::InvalidIdentity { .. })));
    }

    #[test]
    fn test_clone_shares_transport() {
        let ctx = context("example").unwrap();
        let cloned = ctx.clone();
        assert!(Arc::ptr_eq(ctx.transport(), cloned.transport()));
    }

    #[tokio::test]
    async fn test_publish_json() {
        let ctx = context("example").unwrap();
        ctx.publish_json("some/topic", &json!({"a": 1}), true)
            .await
            .unwrap();

        let published = ctx.transport().get_published_messages().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "some/topic");
        assert!(published[0].retain);
        assert_eq!(published[0].json(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_publish_failure_maps_to_transport_error() {
        let ctx = ComponentContext::create(
            "agent",
            "lucid/agents/agent",
            "example",
            Arc::new(MockTransport::with_failure()),
            JsonMap::new(),
        )
        .unwrap();

        let result = ctx.publish_json("t", &json!({}), false).await;
        assert!(matches!(result, Err(ComponentError::Transport(_))));
    }
}
