//! Shared worker-selection and outbound-request plumbing used by every
//! protocol handler: pick the least-loaded worker, propagate the
//! allow-listed headers, and send the translated body on.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;

use crate::app::AppState;
use crate::error;
use crate::worker::{should_propagate_header, Worker};

pub struct Dispatch {
    pub worker: Arc<dyn Worker>,
    pub response: reqwest::Response,
}

/// Hard cap on a buffered (non-streaming) upstream body (spec §4.10).
pub const MAX_NON_STREAMING_BODY: usize = 32 * 1024 * 1024;

/// Hard cap on a buffered `/v1/models` passthrough response (spec §5).
pub const MAX_MODELS_BODY: usize = 10 * 1024 * 1024;

/// Read `response` fully, rejecting bodies larger than
/// [`MAX_NON_STREAMING_BODY`] with a structured 502 rather than buffering
/// an unbounded amount of memory.
pub async fn read_capped_body(response: reqwest::Response) -> Result<bytes::Bytes, Response> {
    read_capped_body_with_limit(response, MAX_NON_STREAMING_BODY).await
}

/// Same as [`read_capped_body`] with an explicit `limit`, for callers
/// capping to a different bound than the default (e.g. `/v1/models`).
pub async fn read_capped_body_with_limit(
    response: reqwest::Response,
    limit: usize,
) -> Result<bytes::Bytes, Response> {
    use futures::StreamExt;

    let mut buf = bytes::BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| error::bad_gateway("upstream_stream_error", err.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(error::create_error(
                axum::http::StatusCode::BAD_GATEWAY,
                "upstream_response_too_large",
                format!("upstream body exceeded {} bytes", limit),
            ));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Select a worker for `model_id`, forward `body` to `{worker_url}{path}`
/// with the allow-listed subset of `incoming_headers`, and return the raw
/// `reqwest::Response` alongside the worker (so callers can release its
/// load slot when the response stream finishes).
pub async fn dispatch(
    app: &AppState,
    model_id: &str,
    path: &str,
    incoming_headers: &HeaderMap,
    body: &Value,
) -> Result<Dispatch, Response> {
    let worker = app
        .registry
        .select(model_id)
        .ok_or_else(|| error::model_not_found(model_id))?;
    let url = format!("{}{}", worker.url().trim_end_matches('/'), path);
    let request = app.http_client.post(&url).json(body);
    send(worker, request, incoming_headers).await
}

/// Same as [`dispatch`] for endpoints with no request body (`/v1/models`).
pub async fn dispatch_get(
    app: &AppState,
    path: &str,
    incoming_headers: &HeaderMap,
) -> Result<Dispatch, Response> {
    let worker = app
        .registry
        .select("*")
        .ok_or_else(|| error::model_not_found("*"))?;
    let url = format!("{}{}", worker.url().trim_end_matches('/'), path);
    let request = app.http_client.get(&url);
    send(worker, request, incoming_headers).await
}

async fn send(
    worker: Arc<dyn Worker>,
    mut request: reqwest::RequestBuilder,
    incoming_headers: &HeaderMap,
) -> Result<Dispatch, Response> {
    for (name, value) in incoming_headers.iter() {
        if should_propagate_header(name.as_str()) {
            if let Ok(v) = value.to_str() {
                request = request.header(name.as_str(), v);
            }
        }
    }

    worker.increment_load();
    let result = request.send().await;
    worker.decrement_load();

    match result {
        Ok(response) if response.status().is_success() => Ok(Dispatch { worker, response }),
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            worker.record_outcome(false);
            Err(error::create_error(
                status,
                "upstream_error",
                error::sanitize_error_body(&body),
            ))
        }
        Err(err) if err.is_timeout() => {
            worker.record_outcome(false);
            Err(error::gateway_timeout("upstream_timeout", err.to_string()))
        }
        Err(err) => {
            worker.record_outcome(false);
            Err(error::bad_gateway("upstream_unreachable", err.to_string()))
        }
    }
}
