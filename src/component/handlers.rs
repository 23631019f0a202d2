//! Handlers every component answers: `ping` and `cfg/set`

use super::behavior::ComponentBehavior;
use super::lifecycle::Component;
use super::router::CommandHandler;
use crate::error::ComponentResult;
use crate::protocol::{coerce_bool, CommandPayload, JsonMap};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Configuration key every component understands
pub const LOGS_ENABLED_KEY: &str = "logs_enabled";

/// `cmd/ping` → `evt/ping/result` with `ok = true`
pub struct PingHandler;

#[async_trait]
impl<B, T> CommandHandler<B, T> for PingHandler
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    async fn handle(
        &self,
        component: &mut Component<B, T>,
        payload: &CommandPayload,
    ) -> ComponentResult<()> {
        component
            .publish_result("ping", payload.request_id(), true, None)
            .await
    }
}

/// `cmd/cfg/set` applies `payload.set` key by key
///
/// `logs_enabled` is handled here; every other key is offered to
/// [`ComponentBehavior::apply_cfg`] and dropped if the behavior does not
/// recognize it. `state` and `cfg` are republished before the result so that
/// observers never see an applied value that is not yet retained.
pub struct CfgSetHandler;

#[async_trait]
impl<B, T> CommandHandler<B, T> for CfgSetHandler
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    async fn handle(
        &self,
        component: &mut Component<B, T>,
        payload: &CommandPayload,
    ) -> ComponentResult<()> {
        let set = match payload.object_field("set") {
            Ok(set) => set,
            Err(message) => {
                return component
                    .publish_cfg_set_result(payload.request_id(), Err(message))
                    .await;
            }
        };

        let mut applied = JsonMap::new();
        for (key, value) in &set {
            if let Some(effective) = apply_key(component, key, value) {
                applied.insert(key.clone(), effective);
            } else {
                debug!(key = %key, "Ignoring unrecognized cfg key");
            }
        }

        component.publish_state().await?;
        component.publish_cfg().await?;
        component
            .publish_cfg_set_result(payload.request_id(), Ok(applied))
            .await
    }
}

fn apply_key<B, T>(component: &mut Component<B, T>, key: &str, value: &Value) -> Option<Value>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    if key == LOGS_ENABLED_KEY {
        let enabled = coerce_bool(value);
        component.set_logs_enabled(enabled);
        return Some(Value::Bool(enabled));
    }
    component.behavior_mut().apply_cfg(key, value)
}
