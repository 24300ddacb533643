//! API provider contract tests.
//!
//! Verify exact HTTP format compliance for the OpenAI-compatible backend:
//! - availability checks against `/v1/models`
//! - request format for `/v1/chat/completions`
//! - streaming SSE parsing
//! - error classification

use futures_util::StreamExt;
use kotoba::config::LlmConfig;
use kotoba::provider::api::ApiProvider;
use kotoba::provider::{Availability, LanguageProvider, SessionOptions};
use kotoba::ChatError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(uri: &str) -> ApiProvider {
    ApiProvider::new(
        uri.to_owned(),
        "qwen3:4b".to_owned(),
        String::new(),
        LlmConfig::default(),
    )
}

fn options() -> SessionOptions {
    SessionOptions {
        system_prompt: "You are a helpful assistant.".to_owned(),
        monitor: None,
    }
}

// ───────────────────────────── availability ─────────────────────────────

#[tokio::test]
async fn availability_is_available_when_model_is_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "qwen3:4b"}, {"id": "other"}]
        })))
        .mount(&server)
        .await;

    let availability = provider(&server.uri()).availability().await.unwrap();
    assert_eq!(availability, Availability::Available);
}

#[tokio::test]
async fn availability_is_unavailable_when_model_is_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "other-model"}]
        })))
        .mount(&server)
        .await;

    let availability = provider(&server.uri()).availability().await.unwrap();
    assert_eq!(availability, Availability::Unavailable);
}

#[tokio::test]
async fn availability_is_lenient_with_servers_that_cannot_list_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let availability = provider(&server.uri()).availability().await.unwrap();
    assert_eq!(availability, Availability::Available);
}

#[tokio::test]
async fn availability_check_fails_on_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = provider(&server.uri()).availability().await;
    assert!(matches!(result, Err(ChatError::Availability(_))));
}

#[tokio::test]
async fn availability_check_fails_when_unreachable() {
    // Port 1 is never listening.
    let result = provider("http://127.0.0.1:1").availability().await;
    assert!(matches!(result, Err(ChatError::Availability(_))));
}

#[tokio::test]
async fn availability_sends_bearer_token_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ApiProvider::new(
        server.uri(),
        "qwen3:4b".to_owned(),
        "secret-key".to_owned(),
        LlmConfig::default(),
    );
    let availability = provider.availability().await.unwrap();
    assert_eq!(availability, Availability::Available);
}

// ─────────────────────────────── streaming ──────────────────────────────

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": delta}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn streaming_concatenates_sse_deltas_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hel", "lo", " world"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("hi");

    let mut fragments = Vec::new();
    while let Some(item) = stream.next().await {
        fragments.push(item.unwrap());
    }

    assert_eq!(fragments, vec!["Hel", "lo", " world"]);
    assert_eq!(fragments.concat(), "Hello world");
}

#[tokio::test]
async fn streaming_stops_at_finish_reason() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({"choices": [{"delta": {"content": "done"}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("hi");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "done");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn request_includes_model_messages_and_sampling_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen3:4b",
            "stream": true,
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&[]), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("hi");
    while let Some(item) = stream.next().await {
        item.unwrap();
    }
}

#[tokio::test]
async fn second_prompt_carries_conversation_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["first"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("one");
    while let Some(item) = stream.next().await {
        item.unwrap();
    }
    server.reset().await;

    // The second request must replay the first exchange.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": "first"},
                {"role": "user", "content": "two"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&[]), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut stream = session.prompt_streaming("two");
    while let Some(item) = stream.next().await {
        item.unwrap();
    }
}

// ──────────────────────────── error mapping ─────────────────────────────

#[tokio::test]
async fn http_error_surfaces_as_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("hi");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ChatError::Prompt(_)));
    assert!(!err.is_session_invalidated());
}

#[tokio::test]
async fn session_related_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("session expired"))
        .mount(&server)
        .await;

    let session = provider(&server.uri()).create(options()).await.unwrap();
    let mut stream = session.prompt_streaming("hi");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.is_session_invalidated());
}
