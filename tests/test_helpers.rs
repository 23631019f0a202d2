//! Test helpers and utilities for integration tests

use async_trait::async_trait;
use lucid_component::component::{
    CommandHandler, CommandRouter, Component, ComponentBehavior, ComponentContext,
};
use lucid_component::error::{ComponentError, ComponentResult};
use lucid_component::protocol::{CommandPayload, JsonMap};
use lucid_component::testing::MockTransport;
use serde_json::{json, Value};
use std::sync::Arc;

#[allow(dead_code)]
pub const AGENT_ID: &str = "test-agent";
#[allow(dead_code)]
pub const BASE_TOPIC: &str = "lucid/agents/test-agent";

/// Topic root of `component_id` under the test agent
#[allow(dead_code)]
pub fn root(component_id: &str) -> String {
    format!("{BASE_TOPIC}/components/{component_id}")
}

/// Dimmable lamp used to exercise the component base
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct Lamp {
    pub id: String,
    pub brightness: f64,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub start_calls: u32,
    pub stop_calls: u32,
    pub telemetry: Vec<JsonMap>,
}

#[allow(dead_code)]
impl Lamp {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ComponentBehavior<MockTransport> for Lamp {
    fn component_id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["ping".to_string(), "cfg/set".to_string(), "flash".to_string()]
    }

    fn metadata(&self) -> JsonMap {
        let mut metadata = JsonMap::new();
        metadata.insert("kind".to_string(), json!("lamp"));
        metadata.insert("component_id".to_string(), json!("spoofed"));
        metadata
    }

    fn state_payload(&self) -> JsonMap {
        let mut state = JsonMap::new();
        state.insert("brightness".to_string(), json!(self.brightness));
        state
    }

    fn cfg_payload(&self) -> JsonMap {
        let mut cfg = JsonMap::new();
        cfg.insert("brightness".to_string(), json!(self.brightness));
        cfg
    }

    fn apply_cfg(&mut self, key: &str, value: &Value) -> Option<Value> {
        match key {
            "brightness" => {
                let requested = value.as_f64()?;
                self.brightness = requested.clamp(0.0, 1.0);
                Some(json!(self.brightness))
            }
            _ => None,
        }
    }

    async fn set_telemetry_config(
        &mut self,
        _context: &ComponentContext<MockTransport>,
        options: &JsonMap,
    ) -> ComponentResult<()> {
        self.telemetry.push(options.clone());
        Ok(())
    }

    async fn on_start(&mut self, _context: &ComponentContext<MockTransport>) -> ComponentResult<()> {
        self.start_calls += 1;
        if self.fail_start {
            return Err(ComponentError::hook("lamp driver not found"));
        }
        Ok(())
    }

    async fn on_stop(&mut self, _context: &ComponentContext<MockTransport>) -> ComponentResult<()> {
        self.stop_calls += 1;
        if self.fail_stop {
            return Err(ComponentError::hook("lamp driver hung"));
        }
        Ok(())
    }

    fn register_commands(router: &mut CommandRouter<Self, MockTransport>) -> ComponentResult<()> {
        router.register("flash", FlashHandler)?;
        router.register("explode", ExplodeHandler)?;
        Ok(())
    }
}

/// Succeeds with `ok = true`
pub struct FlashHandler;

#[async_trait]
impl CommandHandler<Lamp, MockTransport> for FlashHandler {
    async fn handle(
        &self,
        component: &mut Component<Lamp, MockTransport>,
        payload: &CommandPayload,
    ) -> ComponentResult<()> {
        component
            .publish_result("flash", payload.request_id(), true, None)
            .await
    }
}

/// Fails with a message carrying a secret
pub struct ExplodeHandler;

#[async_trait]
impl CommandHandler<Lamp, MockTransport> for ExplodeHandler {
    async fn handle(
        &self,
        _component: &mut Component<Lamp, MockTransport>,
        _payload: &CommandPayload,
    ) -> ComponentResult<()> {
        Err(ComponentError::hook("driver rejected token=abc123"))
    }
}

/// Context for `component_id` under the test agent
#[allow(dead_code)]
pub fn context(
    transport: &Arc<MockTransport>,
    component_id: &str,
    config: JsonMap,
) -> ComponentContext<MockTransport> {
    ComponentContext::create(
        AGENT_ID,
        BASE_TOPIC,
        component_id,
        Arc::clone(transport),
        config,
    )
    .unwrap()
}

/// A fresh lamp component with its transport
#[allow(dead_code)]
pub fn lamp_component(lamp: Lamp) -> (Component<Lamp, MockTransport>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let ctx = context(&transport, &lamp.id.clone(), JsonMap::new());
    (Component::new(ctx, lamp).unwrap(), transport)
}
