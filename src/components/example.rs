//! Template component with a single integer value and optional telemetry
//!
//! New components start from a copy of this one: replace the state keys, add
//! domain `cfg/set` keys in `apply_cfg`, and acquire hardware in `on_start`.

use crate::component::{
    CommandHandler, CommandRouter, Component, ComponentBehavior, ComponentContext,
};
use crate::error::{ComponentError, ComponentResult};
use crate::protocol::{coerce_bool, CommandPayload, JsonMap};
use crate::transport::Transport;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

pub const KIND: &str = "example";

const DEFAULT_TELEMETRY_INTERVAL_MS: u64 = 1000;
const MIN_TELEMETRY_INTERVAL_MS: u64 = 100;
const TELEMETRY_METRIC: &str = "value";

/// Periodic telemetry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryOptions {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: DEFAULT_TELEMETRY_INTERVAL_MS,
        }
    }
}

impl TelemetryOptions {
    /// Parse `{"enabled", "interval_ms"}`; an empty mapping yields the defaults
    pub fn from_map(options: &JsonMap) -> ComponentResult<Self> {
        let enabled = options.get("enabled").map(coerce_bool).unwrap_or(false);

        let interval_ms = match options.get("interval_ms") {
            None | Some(Value::Null) => DEFAULT_TELEMETRY_INTERVAL_MS,
            Some(value) => value.as_u64().ok_or_else(|| {
                ComponentError::invalid_payload(
                    "telemetry 'interval_ms' must be a non-negative integer",
                )
            })?,
        };

        Ok(Self {
            enabled,
            interval_ms: interval_ms.max(MIN_TELEMETRY_INTERVAL_MS),
        })
    }

    pub fn to_map(self) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("enabled".to_string(), Value::Bool(self.enabled));
        map.insert("interval_ms".to_string(), Value::from(self.interval_ms));
        map
    }
}

/// Handle to the background telemetry loop
struct TelemetryTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TelemetryTask {
    fn spawn<T: Transport + 'static>(
        context: ComponentContext<T>,
        value: Arc<AtomicI64>,
        interval_ms: u64,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let topic = context.topics().telemetry(TELEMETRY_METRIC);
        let span = context.span();

        let loop_body = async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.tick().await; // First tick completes immediately, skip it

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let sample = json!({
                            "value": value.load(Ordering::SeqCst),
                            "ts": Utc::now(),
                        });
                        if let Err(e) = context.publish_json(&topic, &sample, false).await {
                            warn!(
                                component_id = %context.component_id(),
                                error = %e,
                                "Telemetry publish failed"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(component_id = %context.component_id(), "Telemetry loop exited");
        };
        let handle = tokio::spawn(loop_body.instrument(span));

        Self { shutdown, handle }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Telemetry task ended abnormally");
        }
    }
}

/// The pluggable template component
pub struct ExampleComponent {
    component_id: String,
    value: Arc<AtomicI64>,
    telemetry: TelemetryOptions,
    telemetry_task: Option<TelemetryTask>,
    running: bool,
}

impl ExampleComponent {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            value: Arc::new(AtomicI64::new(0)),
            telemetry: TelemetryOptions::default(),
            telemetry_task: None,
            running: false,
        }
    }

    /// Wrap a fresh instance bound to `context`
    pub fn component<T: Transport + 'static>(
        context: ComponentContext<T>,
    ) -> ComponentResult<Component<Self, T>> {
        let behavior = Self::new(context.component_id());
        Component::new(context, behavior)
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }

    pub fn telemetry(&self) -> TelemetryOptions {
        self.telemetry
    }

    pub fn telemetry_active(&self) -> bool {
        self.telemetry_task.is_some()
    }

    async fn stop_telemetry(&mut self) {
        if let Some(task) = self.telemetry_task.take() {
            task.stop().await;
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> ComponentBehavior<T> for ExampleComponent {
    fn component_id(&self) -> &str {
        &self.component_id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "reset".to_string(),
            "ping".to_string(),
            "telemetry/set".to_string(),
        ]
    }

    fn metadata(&self) -> JsonMap {
        let mut metadata = JsonMap::new();
        metadata.insert("kind".to_string(), json!(KIND));
        metadata.insert("version".to_string(), json!(env!("CARGO_PKG_VERSION")));
        metadata
    }

    fn state_payload(&self) -> JsonMap {
        let mut state = JsonMap::new();
        state.insert("value".to_string(), Value::from(self.value()));
        state
    }

    fn cfg_payload(&self) -> JsonMap {
        let mut cfg = JsonMap::new();
        cfg.insert(
            "telemetry".to_string(),
            Value::Object(self.telemetry.to_map()),
        );
        cfg
    }

    fn apply_cfg(&mut self, key: &str, value: &Value) -> Option<Value> {
        match key {
            "value" => {
                let value = value.as_i64()?;
                self.value.store(value, Ordering::SeqCst);
                Some(Value::from(value))
            }
            _ => None,
        }
    }

    async fn set_telemetry_config(
        &mut self,
        context: &ComponentContext<T>,
        options: &JsonMap,
    ) -> ComponentResult<()> {
        let telemetry = TelemetryOptions::from_map(options)?;
        self.stop_telemetry().await;
        self.telemetry = telemetry;

        if telemetry.enabled && self.running {
            debug!(interval_ms = telemetry.interval_ms, "Starting telemetry loop");
            self.telemetry_task = Some(TelemetryTask::spawn(
                context.clone(),
                Arc::clone(&self.value),
                telemetry.interval_ms,
            ));
        }
        Ok(())
    }

    async fn on_start(&mut self, context: &ComponentContext<T>) -> ComponentResult<()> {
        self.running = true;
        info!(component_id = %context.component_id(), "Started example component");
        Ok(())
    }

    async fn on_stop(&mut self, context: &ComponentContext<T>) -> ComponentResult<()> {
        self.running = false;
        self.stop_telemetry().await;
        info!(component_id = %context.component_id(), "Stopped example component");
        Ok(())
    }

    fn register_commands(router: &mut CommandRouter<Self, T>) -> ComponentResult<()> {
        router
            .register("reset", ResetHandler)?
            .register("telemetry/set", TelemetrySetHandler)?;
        Ok(())
    }
}

/// `cmd/reset`: value back to zero, republish `state`, reply ok
pub struct ResetHandler;

#[async_trait]
impl<T: Transport + 'static> CommandHandler<ExampleComponent, T> for ResetHandler {
    async fn handle(
        &self,
        component: &mut Component<ExampleComponent, T>,
        payload: &CommandPayload,
    ) -> ComponentResult<()> {
        component.behavior().reset();
        component.publish_state().await?;
        component
            .publish_result("reset", payload.request_id(), true, None)
            .await
    }
}

/// `cmd/telemetry/set`: apply `payload.telemetry` and republish `cfg`
///
/// Rejected unless the component is RUNNING, since `start` resets telemetry.
pub struct TelemetrySetHandler;

#[async_trait]
impl<T: Transport + 'static> CommandHandler<ExampleComponent, T> for TelemetrySetHandler {
    async fn handle(
        &self,
        component: &mut Component<ExampleComponent, T>,
        payload: &CommandPayload,
    ) -> ComponentResult<()> {
        if !component.state().is_running() {
            return Err(ComponentError::NotRunning {
                status: component.status(),
            });
        }

        let options = payload
            .object_field("telemetry")
            .map_err(ComponentError::invalid_payload)?;

        component.set_telemetry_config(&options).await?;
        component.publish_cfg().await?;

        let applied = component.behavior().telemetry().to_map();
        component
            .publish_applied_result("telemetry/set", payload.request_id(), applied)
            .await
    }
}
