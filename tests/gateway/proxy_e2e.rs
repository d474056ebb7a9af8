use std::net::SocketAddr;

use callgate::config::{Config, Environment};
use callgate::gateway::run_gateway_with_listener;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RunningProxy {
    addr: SocketAddr,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RunningProxy {
    fn url(&self, route: &str) -> String {
        format!("http://{}{route}", self.addr)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn proxy_config(upstream: &MockServer, api_key: Option<&str>) -> Config {
    let mut config = Config::default();
    config.environment = Environment::Production;
    config.cors.allowed_origins = vec!["https://shop.example.com".into()];
    config.upstream.base_url = upstream.uri();
    config.upstream.api_key = api_key.map(str::to_string);
    config.rate_limit.token_max = 3;
    config
}

async fn start_proxy(config: Config) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        run_gateway_with_listener("127.0.0.1", listener, config).await
    });
    RunningProxy { addr, task }
}

async fn request_token(proxy: &RunningProxy, origin: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(proxy.url("/api/create-web-call"))
        .header("Origin", origin)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn browser_flow_returns_token_from_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/create-web-call"))
        .and(header("authorization", "Bearer retell_sk_e2e"))
        .and(body_json(json!({"agent_id": "agent_abc123"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "tok_e2e",
            "call_id": "call_e2e",
            "agent_id": "agent_abc123"
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(proxy_config(&upstream, Some("retell_sk_e2e"))).await;
    let response = request_token(
        &proxy,
        "https://shop.example.com",
        json!({"agentId": "agent_abc123"}),
    )
    .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://shop.example.com"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"access_token": "tok_e2e", "call_id": "call_e2e"}));
}

#[tokio::test]
async fn foreign_origin_never_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"access_token": "x"})))
        .expect(0)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(proxy_config(&upstream, Some("retell_sk_e2e"))).await;
    let response =
        request_token(&proxy, "https://evil.com", json!({"agent_id": "agent_abc123"})).await;

    assert_eq!(response.status(), 403);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn missing_key_is_reported_per_request() {
    let upstream = MockServer::start().await;
    let proxy = start_proxy(proxy_config(&upstream, None)).await;

    let response = request_token(
        &proxy,
        "https://shop.example.com",
        json!({"agent_id": "agent_abc123"}),
    )
    .await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Server configuration error: Missing API key");

    let health: Value = reqwest::get(proxy.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["apiKey"], "missing");
    assert_eq!(health["cors"], "restricted");
}

#[tokio::test]
async fn upstream_rejection_is_mapped() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/create-web-call"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "agent_id is invalid"})),
        )
        .mount(&upstream)
        .await;

    let proxy = start_proxy(proxy_config(&upstream, Some("retell_sk_e2e"))).await;
    let response = request_token(
        &proxy,
        "https://shop.example.com",
        json!({"agent_id": "agent_missing"}),
    )
    .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid agent ID");
    assert!(body["hint"].is_string());
}

#[tokio::test]
async fn token_budget_is_enforced_per_client() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"access_token": "tok"})))
        .mount(&upstream)
        .await;

    let proxy = start_proxy(proxy_config(&upstream, Some("retell_sk_e2e"))).await;
    for _ in 0..3 {
        let ok = request_token(
            &proxy,
            "https://shop.example.com",
            json!({"agent_id": "agent_abc123"}),
        )
        .await;
        assert_eq!(ok.status(), 200);
    }

    let limited = request_token(
        &proxy,
        "https://shop.example.com",
        json!({"agent_id": "agent_abc123"}),
    )
    .await;
    assert_eq!(limited.status(), 429);
    assert!(limited.headers().contains_key("retry-after"));
}
