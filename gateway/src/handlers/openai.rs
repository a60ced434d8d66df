//! `POST /v1/chat/completions` (spec §6.1): a client that already speaks
//! OpenAI Chat Completions directly hits the same upstream with no
//! translation needed — dispatch and pipe the response straight through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::upstream;
use crate::worker::LoadTrackingStream;

pub async fn chat_completions(State(app): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let model = body.get("model").and_then(Value::as_str).unwrap_or_default();
    let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let dispatch = match upstream::dispatch(&app, model, "/v1/chat/completions", &headers, &body).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    if !streaming {
        let body = match upstream::read_capped_body(dispatch.response).await {
            Ok(b) => b,
            Err(resp) => return resp,
        };
        return (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response();
    }

    let stream = LoadTrackingStream::new(dispatch.response.bytes_stream(), dispatch.worker);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
