//! Command dispatch tests
//!
//! Every command gets exactly one result on `evt/<action>/result`, whatever
//! happens to the payload or the handler.

mod test_helpers;

use lucid_component::component::DispatchOutcome;
use lucid_component::testing::{MockTransport, PublishedMessage};
use serde_json::json;
use test_helpers::{lamp_component, root, Lamp};

async fn results(transport: &MockTransport, action: &str) -> Vec<PublishedMessage> {
    transport
        .published_on(&format!("{}/evt/{action}/result", root("lamp")))
        .await
}

#[tokio::test]
async fn test_ping_echoes_request_id() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();

    let outcome = component
        .dispatch("ping", br#"{"request_id": "req-1"}"#)
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Handled);
    let results = results(&transport, "ping").await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].retain);
    let envelope = results[0].json();
    assert_eq!(envelope["request_id"], "req-1");
    assert_eq!(envelope["ok"], true);
    assert!(envelope["error"].is_null());
    assert!(envelope["ts"].is_string());
}

#[tokio::test]
async fn test_missing_request_id_is_empty_string() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    component.dispatch("ping", b"{}").await.unwrap();

    assert_eq!(results(&transport, "ping").await[0].json()["request_id"], "");
}

#[tokio::test]
async fn test_cfg_set_applies_known_keys() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.start().await.unwrap();
    transport.clear_history().await;

    let outcome = component
        .dispatch(
            "cfg/set",
            br#"{"request_id": "c1", "set": {"brightness": 1.7, "logs_enabled": true, "color": "red"}}"#,
        )
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(component.behavior().brightness, 1.0);
    assert!(component.logs_enabled());

    let base = root("lamp");
    assert_eq!(
        transport.published_topics().await,
        vec![
            format!("{base}/state"),
            format!("{base}/cfg"),
            format!("{base}/evt/cfg/set/result"),
        ]
    );

    let envelope = results(&transport, "cfg/set").await[0].json();
    assert_eq!(envelope["ok"], true);
    assert_eq!(
        envelope["applied"],
        json!({"brightness": 1.0, "logs_enabled": true})
    );

    let cfg = transport.published_on(&format!("{base}/cfg")).await[0].json();
    assert_eq!(cfg, json!({"brightness": 1.0, "logs_enabled": true}));
}

#[tokio::test]
async fn test_cfg_set_coerces_logs_enabled() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.set_logs_enabled(true);

    component
        .dispatch("cfg/set", br#"{"set": {"logs_enabled": 0}}"#)
        .await
        .unwrap();

    assert!(!component.logs_enabled());
    let envelope = results(&transport, "cfg/set").await[0].json();
    assert_eq!(envelope["applied"], json!({"logs_enabled": false}));
}

#[tokio::test]
async fn test_cfg_set_rejects_non_object_set() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component
        .dispatch("cfg/set", br#"{"request_id": "c2", "set": [1, 2]}"#)
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Handled);
    let envelope = results(&transport, "cfg/set").await[0].json();
    assert_eq!(envelope["request_id"], "c2");
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"], "payload 'set' must be an object");
    assert!(envelope["applied"].is_null());
    assert!(transport
        .published_on(&format!("{}/state", root("lamp")))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_cfg_set_without_set_applies_nothing() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    component
        .dispatch("cfg/set", br#"{"request_id": "c3"}"#)
        .await
        .unwrap();

    let envelope = results(&transport, "cfg/set").await[0].json();
    assert_eq!(envelope["ok"], true);
    assert!(envelope["applied"].is_null());
}

#[tokio::test]
async fn test_unknown_action_publishes_failure() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component
        .dispatch("dance", br#"{"request_id": "u1"}"#)
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::NotFound);
    let envelope = results(&transport, "dance").await[0].json();
    assert_eq!(envelope["request_id"], "u1");
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"], "unknown action: dance");
}

#[tokio::test]
async fn test_malformed_json_still_runs_handler() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component.dispatch("ping", b"{not json").await.unwrap();

    assert!(matches!(outcome, DispatchOutcome::ParseError { .. }));
    assert!(outcome.is_handled());
    let envelope = results(&transport, "ping").await[0].json();
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["request_id"], "");
}

#[tokio::test]
async fn test_non_object_payload_degrades_to_empty() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component.dispatch("ping", b"[1, 2, 3]").await.unwrap();

    assert!(matches!(outcome, DispatchOutcome::ParseError { .. }));
    assert_eq!(results(&transport, "ping").await.len(), 1);
}

#[tokio::test]
async fn test_domain_command_dispatch() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component
        .dispatch("flash", br#"{"request_id": "f1"}"#)
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(results(&transport, "flash").await[0].json()["ok"], true);
}

#[tokio::test]
async fn test_handler_error_is_sanitized_into_result() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));

    let outcome = component
        .dispatch("explode", br#"{"request_id": "e1"}"#)
        .await
        .unwrap();

    let DispatchOutcome::HandlerFailed { error } = outcome else {
        panic!("expected handler failure, got {outcome:?}");
    };
    assert!(!error.contains("abc123"));

    let results = results(&transport, "explode").await;
    assert_eq!(results.len(), 1);
    let envelope = results[0].json();
    assert_eq!(envelope["request_id"], "e1");
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"], error.as_str());
}

#[tokio::test]
async fn test_handler_error_logged_when_enabled() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    component.set_logs_enabled(true);

    component.dispatch("explode", b"{}").await.unwrap();

    let logs = transport.published_on(&format!("{}/logs", root("lamp"))).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].json()["level"], "error");
}

#[tokio::test]
async fn test_handle_message_routes_by_topic() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    let base = root("lamp");

    let outcome = component
        .handle_message(&format!("{base}/cmd/cfg/set"), br#"{"set": {"brightness": 0.25}}"#)
        .await
        .unwrap();
    assert_eq!(outcome, Some(DispatchOutcome::Handled));
    assert_eq!(component.behavior().brightness, 0.25);

    let ignored = component
        .handle_message(&format!("{}/cmd/ping", root("other")), b"{}")
        .await
        .unwrap();
    assert_eq!(ignored, None);
    assert!(results(&transport, "ping").await.is_empty());
}

#[tokio::test]
async fn test_actions_include_standard_and_domain() {
    let (component, _transport) = lamp_component(Lamp::new("lamp"));

    assert_eq!(
        component.actions(),
        vec!["cfg/set", "explode", "flash", "ping"]
    );
}

#[tokio::test]
async fn test_dispatch_fails_only_when_result_cannot_be_published() {
    let (mut component, transport) = lamp_component(Lamp::new("lamp"));
    transport.set_should_fail(true);

    assert!(component.dispatch("ping", b"{}").await.is_err());
}
