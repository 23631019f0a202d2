//! Object-safe view of a component for the agent host

use crate::component::{Component, ComponentBehavior, DispatchOutcome};
use crate::error::ComponentResult;
use crate::protocol::ComponentStatus;
use crate::transport::Transport;
use async_trait::async_trait;

/// What the host needs from a component, independent of its behavior type
#[async_trait]
pub trait ManagedComponent: Send + Sync {
    fn component_id(&self) -> &str;

    fn status(&self) -> ComponentStatus;

    /// Routed actions in sorted order
    fn actions(&self) -> Vec<String>;

    async fn start(&mut self) -> ComponentResult<()>;

    async fn stop(&mut self) -> ComponentResult<()>;

    /// Refresh retained documents, e.g. after a broker reconnect
    async fn republish_retained(&self) -> ComponentResult<()>;

    /// Route one inbound message; `None` if it is not one of this
    /// component's command topics
    async fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> ComponentResult<Option<DispatchOutcome>>;
}

#[async_trait]
impl<B, T> ManagedComponent for Component<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    fn component_id(&self) -> &str {
        Component::component_id(self)
    }

    fn status(&self) -> ComponentStatus {
        Component::status(self)
    }

    fn actions(&self) -> Vec<String> {
        Component::actions(self)
    }

    async fn start(&mut self) -> ComponentResult<()> {
        Component::start(self).await
    }

    async fn stop(&mut self) -> ComponentResult<()> {
        Component::stop(self).await
    }

    async fn republish_retained(&self) -> ComponentResult<()> {
        Component::republish_retained(self).await
    }

    async fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> ComponentResult<Option<DispatchOutcome>> {
        Component::handle_message(self, topic, payload).await
    }
}
