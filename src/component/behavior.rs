//! Domain extension point implemented by every concrete component

use super::context::ComponentContext;
use super::router::CommandRouter;
use crate::error::ComponentResult;
use crate::protocol::JsonMap;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;

/// Hooks and accessors a concrete component supplies to [`super::Component`]
///
/// The lifecycle, retained publishing, and command dispatch live in
/// `Component`; implementors only describe their domain state and actions.
/// All methods run on the component's own thread of control, one at a time.
#[async_trait]
pub trait ComponentBehavior<T: Transport + 'static>: Send + Sync + Sized + 'static {
    /// Stable identifier; must equal the context's component id
    fn component_id(&self) -> &str;

    /// Advertised command actions (introspection only, never enforced)
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extra metadata fields; `component_id` and `capabilities` always win
    fn metadata(&self) -> JsonMap {
        JsonMap::new()
    }

    /// Live domain state for the retained `state` topic; must be side-effect free
    fn state_payload(&self) -> JsonMap;

    /// Domain configuration merged into the retained `cfg` document
    fn cfg_payload(&self) -> JsonMap {
        JsonMap::new()
    }

    /// Apply one `cfg/set` key; return the effective value, or `None` if the
    /// key is not recognized
    fn apply_cfg(&mut self, _key: &str, _value: &Value) -> Option<Value> {
        None
    }

    /// Configure periodic telemetry; an empty mapping resets it
    async fn set_telemetry_config(
        &mut self,
        _context: &ComponentContext<T>,
        _options: &JsonMap,
    ) -> ComponentResult<()> {
        Ok(())
    }

    /// Acquire hardware and start owned background work
    async fn on_start(&mut self, context: &ComponentContext<T>) -> ComponentResult<()>;

    /// Release hardware; every owned background task must have ended on return
    async fn on_stop(&mut self, context: &ComponentContext<T>) -> ComponentResult<()>;

    /// Register domain command handlers on top of the standard ones
    fn register_commands(_router: &mut CommandRouter<Self, T>) -> ComponentResult<()> {
        Ok(())
    }
}
