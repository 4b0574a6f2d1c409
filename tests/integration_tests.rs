//! Integration tests for the relay
//!
//! These run the real hyper client against a throwaway upstream bound on a local port, so the
//! full path (translation, wire format, streaming, connection failures) is exercised end to end.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_test::TestServer;
use intapi::upstream::Upstream;
use intapi::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const SSE_CHUNKS: [&str; 3] = [
    "data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
];

#[derive(Debug, Clone)]
struct Captured {
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct UpstreamLog(Arc<Mutex<Vec<Captured>>>);

impl UpstreamLog {
    fn all(&self) -> Vec<Captured> {
        self.0.lock().unwrap().clone()
    }
}

/// Answers like a chat-completions API: echoes the question back in the completion, or streams
/// a fixed set of SSE frames when asked to.
async fn fake_completions(
    State(log): State<UpstreamLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    log.0.lock().unwrap().push(Captured {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body: body.clone(),
    });

    if body["stream"] == true {
        let frames = futures_util::stream::iter(
            SSE_CHUNKS
                .iter()
                .map(|chunk| Ok::<_, std::io::Error>(chunk.as_bytes().to_vec())),
        );
        return Response::builder()
            .header("content-type", "text/event-stream")
            .body(Body::from_stream(frames))
            .unwrap();
    }

    let question = body["messages"][0]["content"].as_str().unwrap_or_default();
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": body["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": format!("echo: {question}")},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 4, "completion_tokens": 3, "total_tokens": 7}
    }))
    .into_response()
}

struct FakeUpstream {
    base_url: String,
    log: UpstreamLog,
    join: JoinHandle<()>,
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn spawn_fake_upstream() -> FakeUpstream {
    let log = UpstreamLog::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(fake_completions))
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let join = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        base_url: format!("http://{addr}/v1"),
        log,
        join,
    }
}

fn relay_for(base_url: &str) -> TestServer {
    let upstream = Upstream::builder()
        .base_url(base_url.parse().unwrap())
        .api_key("sk-integration")
        .build()
        .unwrap();
    TestServer::new(build_router(AppState::new(upstream))).unwrap()
}

/// A base URL nothing is listening on.
async fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn test_legacy_question_round_trip() {
    let upstream = spawn_fake_upstream().await;
    let relay = relay_for(&upstream.base_url);

    let response = relay.get("/model/gpt-5-mini/2%2B2%3D%3F").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "echo: 2+2=?");

    let seen = upstream.log.all();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer sk-integration"));
    assert_eq!(
        seen[0].body,
        json!({
            "model": "gpt-5-mini",
            "messages": [{"role": "user", "content": "2+2=?"}],
            "stream": false
        })
    );
}

#[tokio::test]
async fn test_chat_completions_forwards_extra_fields() {
    let upstream = spawn_fake_upstream().await;
    let relay = relay_for(&upstream.base_url);

    let response = relay
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "hello"}],
            "temperature": 0.5,
            "response_format": {"type": "json_object"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "echo: hello");

    let forwarded = &upstream.log.all()[0].body;
    assert_eq!(forwarded["model"], "gpt-4o-mini");
    assert_eq!(forwarded["temperature"], 0.5);
    assert_eq!(forwarded["response_format"]["type"], "json_object");
}

#[tokio::test]
async fn test_responses_envelope_round_trip() {
    let upstream = spawn_fake_upstream().await;
    let relay = relay_for(&upstream.base_url);

    let response = relay
        .post("/v1/responses")
        .json(&json!({"input": "hello", "max_tokens": 16}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "response");
    assert_eq!(body["output"][0]["content"][0]["text"], "echo: hello");
    assert_eq!(body["usage"]["total_tokens"], 7);

    let forwarded = &upstream.log.all()[0].body;
    assert_eq!(forwarded["messages"], json!([{"role": "user", "content": "hello"}]));
    assert_eq!(forwarded["max_tokens"], 16);
    assert!(forwarded.get("input").is_none());
}

#[tokio::test]
async fn test_streaming_is_relayed_byte_for_byte() {
    let upstream = spawn_fake_upstream().await;
    let relay = relay_for(&upstream.base_url);

    for path in ["/v1/chat/completions", "/v1/responses"] {
        let response = relay
            .post(path)
            .json(&json!({
                "messages": [{"role": "user", "content": "2+2"}],
                "stream": true
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.header("content-type"), "text/event-stream");
        assert_eq!(response.header("cache-control"), "no-cache");
        assert_eq!(response.text(), SSE_CHUNKS.concat());
    }

    assert_eq!(upstream.log.all().len(), 2);
}

#[tokio::test]
async fn test_unreachable_upstream() {
    let relay = relay_for(&dead_base_url().await);

    let response = relay.get("/model/hello").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.text().starts_with("upstream unreachable"));

    let response = relay
        .post("/v1/chat/completions")
        .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "upstream_error");
}
