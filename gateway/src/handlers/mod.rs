//! One handler module per wire protocol this gateway terminates (spec
//! §6.1): `anthropic` is the Claude-native surface the rest of this crate
//! exists to serve; `openai`/`codex` let a client that already speaks the
//! upstream's own wire format skip translation entirely.

pub mod anthropic;
pub mod codex;
pub mod models;
pub mod openai;

use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;

use crate::sse::SseWriter;

pub(crate) const SSE_CHANNEL_CAPACITY: usize = 256;

/// Wraps an mpsc receiver as a chunked `text/event-stream` HTTP response.
pub(crate) fn sse_response(rx: tokio::sync::mpsc::Receiver<Result<Bytes, std::io::Error>>) -> Response {
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::IntoResponse,
    };

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx);
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

/// Spawns an SSE writer/receiver pair for a handler to drive from a
/// background task, returning the writer (to send events) and the
/// already-built HTTP response (whose body streams from the channel).
pub(crate) fn new_sse_channel() -> (Arc<SseWriter>, Response) {
    let (tx, rx) = tokio::sync::mpsc::channel(SSE_CHANNEL_CAPACITY);
    let writer = Arc::new(SseWriter::new(tx));
    let response = sse_response(rx);
    (writer, response)
}
