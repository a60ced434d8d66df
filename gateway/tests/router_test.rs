//! Router-level integration tests: a real `axum::Router` (`routes::build_router`)
//! driven with `tower::ServiceExt::oneshot` against a fake upstream bound on
//! localhost, exercising the full C8–C10 translation path end to end.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use clap::Parser;
use http_body_util::BodyExt;
use serde_json::json;
use smg_gateway::app::AppState;
use smg_gateway::config::Config;
use smg_gateway::routes;
use tower::ServiceExt;

async fn spawn_fake_openai_upstream() -> SocketAddr {
    use axum::{routing::post, Json, Router};

    async fn chat_completions() -> Json<serde_json::Value> {
        Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-test",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello from upstream",
                    "tool_calls": null,
                    "tool_call_id": null,
                    "name": null,
                    "reasoning_content": null,
                },
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8},
        }))
    }

    let router = Router::new().route("/v1/chat/completions", post(chat_completions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn test_config(upstream_url: String) -> Config {
    Config::parse_from([
        "smg-gateway",
        "--upstream-url",
        &upstream_url,
        "--upstream-protocol",
        "openai",
    ])
}

#[tokio::test]
async fn messages_non_streaming_translates_openai_response_to_claude() {
    let addr = spawn_fake_openai_upstream().await;
    let app_state = AppState::new(test_config(format!("http://{addr}")));
    let router = routes::build_router(app_state);

    let body = json!({
        "model": "claude-sonnet-4-5-20250929",
        "max_tokens": 100,
        "messages": [{"role": "user", "content": "Hi"}],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["role"], "assistant");
    assert_eq!(parsed["content"][0]["type"], "text");
    assert_eq!(parsed["content"][0]["text"], "Hello from upstream");
    assert_eq!(parsed["stop_reason"], "end_turn");
}

#[tokio::test]
async fn count_tokens_does_not_require_an_upstream() {
    let app_state = AppState::new(test_config("http://127.0.0.1:1".to_string()));
    let router = routes::build_router(app_state);

    let body = json!({
        "model": "claude-sonnet-4-5-20250929",
        "messages": [{"role": "user", "content": "Hi there"}],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/messages/count_tokens")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(parsed["input_tokens"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn messages_surfaces_a_claude_shaped_error_when_upstream_is_unreachable() {
    let app_state = AppState::new(test_config("http://127.0.0.1:1".to_string()));
    let router = routes::build_router(app_state);

    let body = json!({
        "model": "claude-sonnet-4-5-20250929",
        "max_tokens": 100,
        "messages": [{"role": "user", "content": "Hi"}],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_ne!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["type"], "error");
    assert!(parsed["error"]["type"].is_string());
}
