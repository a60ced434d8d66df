//! `GET /v1/models` (spec §4.12/§6): capped passthrough of the upstream's
//! model list, no translation — both Chat Completions and Responses
//! upstreams already shape this response the way Claude clients expect.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::upstream::{self, MAX_MODELS_BODY};

pub async fn list_models(State(app): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let dispatch = match upstream::dispatch_get(&app, "/v1/models", &headers).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let body = match upstream::read_capped_body_with_limit(dispatch.response, MAX_MODELS_BODY).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
