//! Component lifecycle tests
//!
//! Covers the start/stop state machine, the retained documents published on
//! start, hook failures, and the `logs` stream.

mod test_helpers;

use lucid_component::component::ComponentStatus;
use lucid_component::error::ComponentError;
use lucid_component::protocol::JsonMap;
use serde_json::json;
use test_helpers::{lamp_component, root, Lamp};

#[tokio::test]
async fn test_new_component_is_stopped() {
    let (component, transport) = lamp_component(Lamp::new("lamp"));

    assert_eq!(component.status(), ComponentStatus::Stopped);
    assert!(!component.logs_enabled());
    assert!(transport.get_published_messages().await.is_empty());
}

#[tokio::test]
async fn test_start_publishes_retained_documents_in_order() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    component.start().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Running);
    let base = root("lamp");
    assert_eq!(
        transport.published_topics().await,
        vec![
            format!("{base}/metadata"),
            format!("{base}/status"),
            format!("{base}/state"),
            format!("{base}/cfg"),
        ]
    );
    assert!(transport
        .get_published_messages()
        .await
        .iter()
        .all(|m| m.retain));
}

#[tokio::test]
async fn test_start_resets_telemetry_before_cfg() {
    let (mut component, _transport) = lamp_component(Lamp::new("lamp"));

    component.start().await.unwrap();

    assert_eq!(component.behavior().telemetry, vec![JsonMap::new()]);
}

#[tokio::test]
async fn test_retained_document_contents() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();
    let base = root("lamp");

    let metadata = transport.published_on(&format!("{base}/metadata")).await[0].json();
    assert_eq!(metadata["component_id"], "lamp");
    assert_eq!(metadata["kind"], "lamp");
    assert_eq!(metadata["capabilities"], json!(["ping", "cfg/set", "flash"]));

    let status = transport.published_on(&format!("{base}/status")).await[0].json();
    assert_eq!(status["status"], "running");
    assert!(status["started_at"].is_string());
    assert!(status["stopped_at"].is_null());

    let state = transport.published_on(&format!("{base}/state")).await[0].json();
    assert_eq!(state, json!({"brightness": 0.0}));

    let cfg = transport.published_on(&format!("{base}/cfg")).await[0].json();
    assert_eq!(cfg, json!({"brightness": 0.0, "logs_enabled": false}));
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();
    transport.clear_history().await;

    let err = component.start().await.unwrap_err();

    assert!(matches!(
        err,
        ComponentError::AlreadyRunning {
            status: ComponentStatus::Running
        }
    ));
    assert_eq!(component.behavior().start_calls, 1);
    assert!(transport.get_published_messages().await.is_empty());
}

#[tokio::test]
async fn test_start_hook_failure_leaves_error_status() {
    let mut lamp = Lamp::new("lamp");
    lamp.fail_start = true;
    let (mut component, transport) = lamp_component(lamp);

    let err = component.start().await.unwrap_err();

    assert!(matches!(err, ComponentError::StartFailed { .. }));
    assert!(err.to_string().contains("lamp driver not found"));
    assert_eq!(component.status(), ComponentStatus::Error);

    let status = transport.published_on(&format!("{}/status", root("lamp"))).await;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].json()["status"], "error");
    assert!(transport
        .published_on(&format!("{}/metadata", root("lamp")))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_restart_after_start_failure() {
    let mut lamp = Lamp::new("lamp");
    lamp.fail_start = true;
    let (mut component, _transport) = lamp_component(lamp);
    assert!(component.start().await.is_err());

    component.behavior_mut().fail_start = false;
    component.start().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Running);
    assert_eq!(component.behavior().start_calls, 2);
}

#[tokio::test]
async fn test_stop_publishes_stopped_status() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();
    transport.clear_history().await;

    component.stop().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Stopped);
    assert!(component.state().stopped_at.is_some());
    let messages = transport.get_published_messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, format!("{}/status", root("lamp")));
    assert!(messages[0].retain);
    assert_eq!(messages[0].json()["status"], "stopped");
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    component.stop().await.unwrap();
    component.stop().await.unwrap();

    assert_eq!(component.behavior().stop_calls, 0);
    assert!(transport.get_published_messages().await.is_empty());
}

#[tokio::test]
async fn test_stop_hook_failure_still_stops() {
    let mut lamp = Lamp::new("lamp");
    lamp.fail_stop = true;
    let (mut component, _transport) = lamp_component(lamp);
    component.start().await.unwrap();

    component.stop().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Stopped);
    assert_eq!(component.behavior().stop_calls, 1);
}

#[tokio::test]
async fn test_stop_from_error_status() {
    let mut lamp = Lamp::new("lamp");
    lamp.fail_start = true;
    let (mut component, _transport) = lamp_component(lamp);
    let _ = component.start().await;

    component.stop().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Stopped);
}

#[tokio::test]
async fn test_start_succeeds_when_retained_publish_fails() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    transport.set_should_fail(true);

    component.start().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Running);
    assert_eq!(component.behavior().start_calls, 1);
    assert_eq!(component.behavior().telemetry, vec![JsonMap::new()]);
    assert!(transport.get_published_messages().await.is_empty());
}

#[tokio::test]
async fn test_restart_after_retained_publish_failure() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    transport.set_should_fail(true);
    component.start().await.unwrap();
    component.stop().await.unwrap();
    transport.set_should_fail(false);

    component.start().await.unwrap();

    assert_eq!(component.status(), ComponentStatus::Running);
    assert_eq!(transport.get_published_messages().await.len(), 4);
}

#[tokio::test]
async fn test_publish_all_retained_reports_transport_failure() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    transport.set_should_fail(true);

    let err = component.publish_all_retained().await.unwrap_err();

    assert!(matches!(err, ComponentError::Transport(_)));
    assert_eq!(component.behavior().telemetry, vec![JsonMap::new()]);
}

#[tokio::test]
async fn test_logs_stream_follows_logs_enabled() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    let logs_topic = format!("{}/logs", root("lamp"));

    component.publish_log("info", "quiet").await.unwrap();
    assert!(transport.published_on(&logs_topic).await.is_empty());

    component.set_logs_enabled(true);
    component.publish_log("warning", "loud").await.unwrap();

    let logs = transport.published_on(&logs_topic).await;
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].retain);
    let record = logs[0].json();
    assert_eq!(record["level"], "warning");
    assert_eq!(record["message"], "loud");
    assert_eq!(record["component_id"], "lamp");
    assert!(record["ts"].is_string());
}

#[tokio::test]
async fn test_start_logs_when_enabled() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.set_logs_enabled(true);

    component.start().await.unwrap();

    let logs = transport.published_on(&format!("{}/logs", root("lamp"))).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].json()["message"], "component started");
}

#[tokio::test]
async fn test_republish_retained_skips_telemetry_reset() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();
    transport.clear_history().await;

    component.republish_retained().await.unwrap();

    assert_eq!(transport.get_published_messages().await.len(), 4);
    assert_eq!(component.behavior().telemetry.len(), 1);
}

#[tokio::test]
async fn test_publish_state_twice_publishes_identical_payloads() {
    let (component, transport) = lamp_component(Lamp::new("lamp"));

    component.publish_state().await.unwrap();
    component.publish_state().await.unwrap();

    let states = transport.published_on(&format!("{}/state", root("lamp"))).await;
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].payload, states[1].payload);
}
