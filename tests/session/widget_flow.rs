use std::sync::Arc;

use callgate::session::{CallSignal, CallState};
use callgate::widget::{CallWidget, WidgetConfig, WidgetPosition};
use callgate::SessionError;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fake_call::{RecordingFactory, emit};

fn config_from_host_page(agent_id: &str) -> WidgetConfig {
    serde_json::from_value(json!({
        "agentId": agent_id,
        "position": "bottom-left",
        "buttonLabel": "Talk to us",
    }))
    .unwrap()
}

#[tokio::test]
async fn widget_fetches_token_from_proxy_and_runs_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create-web-call"))
        .and(body_json(json!({"agent_id": "agent_abc123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok_from_proxy",
            "call_id": "call_42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = Arc::new(RecordingFactory::default());
    let mut widget = CallWidget::with_proxy(
        config_from_host_page("agent_abc123"),
        Some(&server.uri()),
        factory.clone(),
    )
    .unwrap();
    widget.show();

    let view = widget.view();
    assert!(view.expanded);
    assert_eq!(view.position, WidgetPosition::BottomLeft);
    assert_eq!(view.button_label, "Talk to us");

    widget.press_call_button().await.unwrap();
    assert_eq!(widget.view().button_label, "Connecting...");
    assert_eq!(factory.log.events(), vec!["start:tok_from_proxy"]);

    emit(&factory.log, 0, CallSignal::Started);
    emit(&factory.log, 0, CallSignal::AgentStartTalking);
    let view = widget.view();
    assert_eq!(view.state, CallState::Active);
    assert_eq!(view.button_label, "End Call");
    assert!(view.speaking);
    assert!(view.show_timer);

    widget.press_call_button().await.unwrap();
    let view = widget.view();
    assert_eq!(view.state, CallState::Idle);
    assert_eq!(view.button_label, "Talk to us");
    assert!(!view.speaking);
}

#[tokio::test]
async fn proxy_rejection_surfaces_as_widget_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create-web-call"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let factory = Arc::new(RecordingFactory::default());
    let widget = CallWidget::with_proxy(
        config_from_host_page("agent_abc123"),
        Some(&server.uri()),
        factory.clone(),
    )
    .unwrap();

    let err = widget.press_call_button().await.unwrap_err();
    assert!(matches!(err, SessionError::TokenFetchFailed(ref m) if m.contains("Invalid API key")));

    let view = widget.view();
    assert_eq!(view.state, CallState::Idle);
    assert!(view.error.unwrap().contains("Invalid API key"));
    assert_eq!(factory.log.clients_created(), 0);
}

#[tokio::test]
async fn destroying_widget_mid_call_stops_remote_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;

    let factory = Arc::new(RecordingFactory::default());
    let widget = CallWidget::with_proxy(
        WidgetConfig::new("agent_abc123"),
        Some(&server.uri()),
        factory.clone(),
    )
    .unwrap();
    widget.press_call_button().await.unwrap();
    emit(&factory.log, 0, CallSignal::Started);

    widget.destroy();
    assert_eq!(factory.log.count("stop"), 1);
}
