//! End-to-end tests: HTTP gateway → chat service → OpenAI-compatible
//! endpoint (wiremock), wired from configuration the way `tellerbot serve`
//! wires it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tellerbot_agent::ChatService;
use tellerbot_config::AppConfig;
use tellerbot_gateway::{ApiV1State, build_router};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Harness ──────────────────────────────────────────────────────────────

fn completion(text: &str) -> Value {
    completion_from("gpt-3.5-turbo", text)
}

fn completion_from(model: &str, text: &str) -> Value {
    json!({
        "id": "chatcmpl-e2e",
        "model": model,
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52}
    })
}

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.api_key = Some("sk-e2e".into());
    config.base_url = server.uri();
    config.store.backend = "memory".into();
    config.retry.max_retries = 1;
    config.retry.initial_delay_ms = 10;
    config.retry.max_delay_ms = 10;
    config
}

async fn app(config: &AppConfig) -> axum::Router {
    let chat = ChatService::from_config(config).await.unwrap();
    let state = Arc::new(ApiV1State {
        chat: Arc::new(chat),
        max_message_chars: config.gateway.max_message_chars,
    });
    build_router(state, &config.gateway)
}

async fn post(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn conversation_flow_with_cache_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Around 4.5% APY.")))
        .expect(2)
        .mount(&server)
        .await;

    let app = app(&config_for(&server)).await;

    let (status, first) = post(
        &app,
        json!({"message": "What's my Savings rate?", "conversation_id": "cust-42"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["response"], "Around 4.5% APY.");
    assert_eq!(first["cached"], false);
    assert_eq!(first["degraded"], false);
    assert_eq!(first["usage"]["total_tokens"], 52);

    // normalized repeat is a cache hit: no upstream call
    let (_, repeat) = post(
        &app,
        json!({"message": "whats my savings rate", "conversation_id": "cust-42"}),
    )
    .await;
    assert_eq!(repeat["cached"], true);

    // follow-up carries history
    post(
        &app,
        json!({"message": "And for a CD?", "conversation_id": "cust-42"}),
    )
    .await;

    let requests = server.received_requests().await.unwrap();
    let last: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let messages = last["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "What's my Savings rate?");
    assert_eq!(messages[3]["content"], "And for a CD?");

    let (status, conversation) = get(&app, "/v1/conversations/cust-42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation["turns"].as_array().unwrap().len(), 4);

    let (_, usage) = get(&app, "/v1/usage").await;
    assert_eq!(usage["requests"], 2);
}

#[tokio::test]
async fn upstream_500_retried_once_then_degraded_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let app = app(&config).await;

    let (status, reply) = post(&app, json!({"message": "Can I raise my card limit?"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["degraded"], true);
    assert_eq!(reply["response"], config.retry.fallback_reply);

    let id = reply["conversation_id"].as_str().unwrap().to_string();
    let (_, conversation) = get(&app, &format!("/v1/conversations/{id}")).await;
    assert!(conversation["turns"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upstream_auth_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&config_for(&server)).await;
    let (status, body) = post(&app, json!({"message": "hello"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_rejected");
}

#[tokio::test]
async fn exhausted_budget_switches_to_budget_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_from("gpt-4", "Short answer.")))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.default_model = "gpt-4".into();
    config.budget_model = "gpt-3.5-turbo".into();
    // 40 prompt + 12 completion tokens on gpt-4 costs $0.00192
    config.telemetry.daily_budget_usd = 0.001;
    let app = app(&config).await;

    let (_, first) = post(&app, json!({"message": "Plan a budget for me"})).await;
    assert_eq!(first["degraded"], false);

    let (_, second) = post(&app, json!({"message": "Now plan my savings"})).await;
    assert_eq!(second["degraded"], true);

    let requests = server.received_requests().await.unwrap();
    let shaped: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(shaped["model"], "gpt-3.5-turbo");
    assert_eq!(shaped["max_tokens"], 150);

    let (_, usage) = get(&app, "/v1/usage").await;
    assert_eq!(usage["degraded"], true);
    assert_eq!(usage["alerts_fired"], json!([50, 75, 90, 100]));
}

#[tokio::test]
async fn health_reports_dependencies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let app = app(&config_for(&server)).await;
    let (status, health) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["dependencies"]["completion"], true);
    assert_eq!(health["dependencies"]["store"], true);
}
