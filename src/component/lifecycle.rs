//! Component lifecycle, retained publishing, and command dispatch
//!
//! [`Component`] wraps a [`ComponentBehavior`] and owns everything the
//! behavior should not have to re-implement: the state machine, the four
//! retained documents, the `logs` stream, and the action router.

use super::behavior::ComponentBehavior;
use super::context::ComponentContext;
use super::handlers::LOGS_ENABLED_KEY;
use super::router::{CommandRouter, DispatchOutcome};
use super::state::ComponentState;
use crate::error::{ComponentError, ComponentResult};
use crate::protocol::{
    coerce_bool, CommandPayload, ComponentStatus, JsonMap, LogRecord, ResultEnvelope,
    StatusDocument,
};
use crate::transport::Transport;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// A running unit with its own topic namespace, lifecycle, and command set
pub struct Component<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    context: ComponentContext<T>,
    state: ComponentState,
    logs_enabled: bool,
    behavior: B,
    router: Arc<CommandRouter<B, T>>,
}

impl<B, T> Component<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    /// Bind `behavior` to `context` and build the action table
    ///
    /// `logs_enabled` is seeded from the context configuration.
    pub fn new(context: ComponentContext<T>, behavior: B) -> ComponentResult<Self> {
        if behavior.component_id() != context.component_id() {
            return Err(ComponentError::invalid_identity(format!(
                "behavior id '{}' does not match context id '{}'",
                behavior.component_id(),
                context.component_id()
            )));
        }

        let mut router = CommandRouter::with_standard_handlers();
        B::register_commands(&mut router)?;

        let logs_enabled = context
            .config()
            .get(LOGS_ENABLED_KEY)
            .map(coerce_bool)
            .unwrap_or(false);

        debug!(
            component_id = %context.component_id(),
            actions = ?router.actions(),
            "Built command router"
        );

        Ok(Self {
            context,
            state: ComponentState::new(),
            logs_enabled,
            behavior,
            router: Arc::new(router),
        })
    }

    pub fn component_id(&self) -> &str {
        self.context.component_id()
    }

    pub fn context(&self) -> &ComponentContext<T> {
        &self.context
    }

    pub fn state(&self) -> &ComponentState {
        &self.state
    }

    pub fn status(&self) -> ComponentStatus {
        self.state.status
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    pub fn set_logs_enabled(&mut self, enabled: bool) {
        self.logs_enabled = enabled;
    }

    /// Actions this component routes, in sorted order
    pub fn actions(&self) -> Vec<String> {
        self.router.actions().into_iter().map(str::to_string).collect()
    }

    // ========== LIFECYCLE ==========

    /// STOPPED | ERROR → RUNNING
    ///
    /// Runs the start hook, then publishes every retained document. A hook
    /// failure leaves the component in ERROR and is returned as
    /// [`ComponentError::StartFailed`]. Publish failures are logged only.
    pub async fn start(&mut self) -> ComponentResult<()> {
        let span = crate::lifecycle_span!(
            component_id = %self.context.component_id(),
            transition = "start"
        );
        self.start_inner().instrument(span).await
    }

    async fn start_inner(&mut self) -> ComponentResult<()> {
        self.state.begin_start()?;
        info!("Starting component");

        if let Err(e) = self.behavior.on_start(&self.context).await {
            self.state.fail_start();
            error!(error = %e, "Component start hook failed");
            if let Err(publish_error) = self.publish_status().await {
                warn!(error = %publish_error, "Failed to publish error status");
            }
            return Err(ComponentError::StartFailed {
                message: e.to_string(),
            });
        }

        self.state.complete_start(Utc::now());
        if let Err(e) = self.publish_all_retained().await {
            warn!(error = %e, "Failed to publish retained documents");
        }
        self.publish_log_best_effort("info", "component started").await;

        info!("Component started");
        Ok(())
    }

    /// RUNNING | ERROR → STOPPED; a no-op when already STOPPED
    ///
    /// The status becomes STOPPED before the stop hook runs. Hook failures are
    /// logged and never block the transition.
    pub async fn stop(&mut self) -> ComponentResult<()> {
        let span = crate::lifecycle_span!(
            component_id = %self.context.component_id(),
            transition = "stop"
        );
        self.stop_inner().instrument(span).await
    }

    async fn stop_inner(&mut self) -> ComponentResult<()> {
        if !self.state.begin_stop()? {
            debug!("Component already stopped");
            return Ok(());
        }
        info!("Stopping component");

        self.state.complete_stop(Utc::now());

        if let Err(e) = self.behavior.on_stop(&self.context).await {
            error!(error = %e, "Component stop hook failed");
        }

        if let Err(e) = self.publish_status().await {
            warn!(error = %e, "Failed to publish stopped status");
        }

        info!("Component stopped");
        Ok(())
    }

    // ========== RETAINED DOCUMENTS ==========

    /// metadata → status → state → telemetry reset → cfg
    ///
    /// Every step runs even when an earlier one fails; the first error is
    /// returned.
    pub async fn publish_all_retained(&mut self) -> ComponentResult<()> {
        let results = [
            self.publish_metadata().await,
            self.publish_status().await,
            self.publish_state().await,
            self.set_telemetry_config(&JsonMap::new()).await,
            self.publish_cfg().await,
        ];
        results.into_iter().collect()
    }

    /// Refresh the retained documents without touching telemetry
    pub async fn republish_retained(&self) -> ComponentResult<()> {
        self.publish_metadata().await?;
        self.publish_status().await?;
        self.publish_state().await?;
        self.publish_cfg().await
    }

    /// Behavior metadata with `component_id` and `capabilities` laid on top
    pub fn metadata(&self) -> JsonMap {
        let mut metadata = self.behavior.metadata();
        metadata.insert(
            "component_id".to_string(),
            Value::String(self.component_id().to_string()),
        );
        metadata.insert(
            "capabilities".to_string(),
            Value::from(self.behavior.capabilities()),
        );
        metadata
    }

    pub fn status_document(&self) -> StatusDocument {
        StatusDocument {
            component_id: self.component_id().to_string(),
            status: self.state.status,
            started_at: self.state.started_at,
            stopped_at: self.state.stopped_at,
        }
    }

    /// Behavior configuration plus `logs_enabled`
    pub fn cfg_payload(&self) -> JsonMap {
        let mut cfg = self.behavior.cfg_payload();
        cfg.insert(LOGS_ENABLED_KEY.to_string(), Value::Bool(self.logs_enabled));
        cfg
    }

    pub async fn publish_metadata(&self) -> ComponentResult<()> {
        let topic = self.context.topics().metadata();
        self.context.publish_json(&topic, &self.metadata(), true).await
    }

    pub async fn publish_status(&self) -> ComponentResult<()> {
        let topic = self.context.topics().status();
        self.context
            .publish_json(&topic, &self.status_document(), true)
            .await
    }

    pub async fn publish_state(&self) -> ComponentResult<()> {
        let topic = self.context.topics().state();
        self.context
            .publish_json(&topic, &self.behavior.state_payload(), true)
            .await
    }

    pub async fn publish_cfg(&self) -> ComponentResult<()> {
        let topic = self.context.topics().cfg();
        self.context
            .publish_json(&topic, &self.cfg_payload(), true)
            .await
    }

    /// Hand telemetry options to the behavior; an empty mapping resets them
    pub async fn set_telemetry_config(&mut self, options: &JsonMap) -> ComponentResult<()> {
        self.behavior
            .set_telemetry_config(&self.context, options)
            .await
    }

    // ========== STREAMS ==========

    /// Publish one line on the `logs` stream while `logs_enabled` is set
    pub async fn publish_log(&self, level: &str, message: &str) -> ComponentResult<()> {
        if !self.logs_enabled {
            return Ok(());
        }

        let record = LogRecord {
            ts: Utc::now(),
            level: level.to_string(),
            component_id: self.component_id().to_string(),
            message: message.to_string(),
        };
        let topic = self.context.topics().logs();
        self.context.publish_json(&topic, &record, false).await
    }

    async fn publish_log_best_effort(&self, level: &str, message: &str) {
        if let Err(e) = self.publish_log(level, message).await {
            debug!(error = %e, "Failed to publish component log record");
        }
    }

    /// Publish the single result for a command on `evt/{action}/result`
    pub async fn publish_result(
        &self,
        action: &str,
        request_id: &str,
        ok: bool,
        error: Option<String>,
    ) -> ComponentResult<()> {
        let envelope = match (ok, error) {
            (true, _) => ResultEnvelope::success(request_id),
            (false, error) => ResultEnvelope::failure(
                request_id,
                error.unwrap_or_else(|| "command failed".to_string()),
            ),
        };
        self.publish_envelope(action, &envelope).await
    }

    /// Publish the `cfg/set` result; `Ok` carries the applied mapping
    pub async fn publish_cfg_set_result(
        &self,
        request_id: &str,
        outcome: Result<JsonMap, String>,
    ) -> ComponentResult<()> {
        let envelope = match outcome {
            Ok(applied) => ResultEnvelope::success(request_id).with_applied(applied),
            Err(error) => ResultEnvelope::failure(request_id, error),
        };
        self.publish_envelope("cfg/set", &envelope).await
    }

    /// Publish a successful result carrying an `applied` mapping
    pub async fn publish_applied_result(
        &self,
        action: &str,
        request_id: &str,
        applied: JsonMap,
    ) -> ComponentResult<()> {
        let envelope = ResultEnvelope::success(request_id).with_applied(applied);
        self.publish_envelope(action, &envelope).await
    }

    async fn publish_envelope(&self, action: &str, envelope: &ResultEnvelope) -> ComponentResult<()> {
        let topic = self.context.topics().result(action);
        debug!(
            action = %action,
            request_id = %envelope.request_id,
            ok = envelope.ok,
            "Publishing command result"
        );
        self.context.publish_json(&topic, envelope, false).await
    }

    // ========== COMMANDS ==========

    /// Route a message received on one of this component's topics
    ///
    /// Returns `None` when `topic` is not a command topic of this component
    /// or names no action at all.
    pub async fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> ComponentResult<Option<DispatchOutcome>> {
        match self.context.topics().parse_action(topic) {
            Some("") => {
                warn!(topic = %topic, "Command topic without an action dropped");
                Ok(None)
            }
            Some(action) => self.dispatch(action, payload).await.map(Some),
            None => {
                debug!(topic = %topic, "Ignoring message outside the command namespace");
                Ok(None)
            }
        }
    }

    /// Decode `raw`, run the handler bound to `action`, and make sure exactly
    /// one result is published
    ///
    /// Decode failures degrade to an empty payload and the handler still
    /// runs. Handler errors are sanitized into a failed result. Malformed
    /// actions never match a handler and get an `unknown action` result. Only
    /// an empty action or a failure to publish the result is returned as `Err`.
    pub async fn dispatch(&mut self, action: &str, raw: &[u8]) -> ComponentResult<DispatchOutcome> {
        if action.is_empty() {
            return Err(ComponentError::invalid_payload("command action is empty"));
        }

        let payload = CommandPayload::decode(raw);
        let span = crate::command_span!(
            component_id = %self.context.component_id(),
            action = %action,
            request_id = %payload.request_id()
        );
        self.dispatch_decoded(action, payload).instrument(span).await
    }

    async fn dispatch_decoded(
        &mut self,
        action: &str,
        payload: CommandPayload,
    ) -> ComponentResult<DispatchOutcome> {
        if let Some(reason) = payload.decode_error() {
            warn!(reason = %reason, "Command payload degraded to defaults");
        }

        let Some(handler) = self.router.handler(action) else {
            warn!("Unknown command action");
            self.publish_result(
                action,
                payload.request_id(),
                false,
                Some(format!("unknown action: {action}")),
            )
            .await?;
            return Ok(DispatchOutcome::NotFound);
        };

        if !self.state.is_running() {
            warn!(
                status = %self.state.status,
                "Handling command while component is not running"
            );
        }

        match handler.handle(self, &payload).await {
            Ok(()) => {
                debug!(
                    handler = %CommandRouter::<B, T>::handler_name(action),
                    "Command handled"
                );
                Ok(match payload.decode_error() {
                    Some(reason) => DispatchOutcome::ParseError {
                        reason: reason.to_string(),
                    },
                    None => DispatchOutcome::Handled,
                })
            }
            Err(e) => {
                let message = e.to_result_message();
                error!(error = %message, "Command handler failed");
                self.publish_log_best_effort("error", &format!("{action} failed: {message}"))
                    .await;
                self.publish_result(action, payload.request_id(), false, Some(message.clone()))
                    .await?;
                Ok(DispatchOutcome::HandlerFailed { error: message })
            }
        }
    }
}

impl<B, T> std::fmt::Debug for Component<B, T>
where
    B: ComponentBehavior<T>,
    T: Transport + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("component_id", &self.component_id())
            .field("state", &self.state)
            .field("logs_enabled", &self.logs_enabled)
            .finish_non_exhaustive()
    }
}
