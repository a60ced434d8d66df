//! `/v1/messages` and `/v1/messages/count_tokens` (spec §6.1): the
//! Claude-native surface this gateway exists to serve. Translates the
//! request into whichever protocol the configured upstream speaks (C8/C9),
//! dispatches it, and translates the response back (C10/C11).

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use openai_protocol::validated::ValidatedJson;
use openai_protocol::{
    ChatCompletionChunk, ChatCompletionResponse, CountMessageTokensRequest,
    CountMessageTokensResponse, CreateMessageRequest, ResponsesObject, ResponsesStreamEvent,
    StreamOptions, Usage,
};
use tracing::warn;

use crate::app::AppState;
use crate::config::UpstreamProtocol;
use crate::error;
use crate::handlers::new_sse_channel;
use crate::pipeline::{self, StreamState};
use crate::rewriter::{self, RewriteContext};
use crate::sse::SseReader;
use crate::token_count;
use crate::translate::codex as translate_codex;
use crate::translate::openai as translate_openai;
use crate::translate::ToolNameMap;
use crate::upstream;
use crate::worker::LoadTrackingStream;

pub async fn messages(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreateMessageRequest>,
) -> Response {
    let streaming = req.is_stream();
    match app.config.upstream_protocol {
        UpstreamProtocol::Openai => via_openai(app, headers, req, streaming).await,
        UpstreamProtocol::Codex => via_codex(app, headers, req, streaming).await,
    }
}

pub async fn count_tokens(Json(req): Json<CountMessageTokensRequest>) -> Response {
    let input_tokens = token_count::estimate_request_tokens(&req);
    Json(CountMessageTokensResponse { input_tokens }).into_response()
}

async fn via_openai(app: Arc<AppState>, headers: HeaderMap, req: CreateMessageRequest, streaming: bool) -> Response {
    let (mut chat_req, name_map) = translate_openai::claude_request_to_openai(&req);
    let rewrite_ctx = if app.config.force_function_calling {
        rewriter::force_function_calling(&mut chat_req)
    } else {
        None
    };
    if streaming {
        chat_req.stream_options = Some(StreamOptions { include_usage: true });
    }

    let body = match serde_json::to_value(&chat_req) {
        Ok(v) => v,
        Err(err) => return error::internal_error("request_serialize_error", err.to_string()),
    };

    let dispatch = match upstream::dispatch(&app, &req.model, "/v1/chat/completions", &headers, &body).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    if !streaming {
        return non_streaming_openai(dispatch, &name_map, rewrite_ctx.as_ref(), app.config.repair_windows_paths).await;
    }
    stream_openai(req.model, rewrite_ctx, name_map, dispatch, app.config.repair_windows_paths)
}

async fn non_streaming_openai(
    dispatch: upstream::Dispatch,
    name_map: &ToolNameMap,
    rewrite_ctx: Option<&RewriteContext>,
    repair_paths: bool,
) -> Response {
    let body = match upstream::read_capped_body(dispatch.response).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let parsed: ChatCompletionResponse = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return error::bad_gateway("upstream_invalid_json", err.to_string()),
    };
    match pipeline::build_message_non_streaming(&parsed, name_map, rewrite_ctx, repair_paths) {
        Ok(message) => Json(message).into_response(),
        Err(err) => error::bad_gateway("upstream_empty_response", err.to_string()),
    }
}

fn stream_openai(
    model: String,
    rewrite_ctx: Option<RewriteContext>,
    name_map: ToolNameMap,
    dispatch: upstream::Dispatch,
    repair_paths: bool,
) -> Response {
    let (writer, response) = new_sse_channel();

    tokio::spawn(async move {
        let mut state = StreamState::new(writer.clone(), model, rewrite_ctx, name_map, repair_paths);
        state.start().await;

        let mut body_stream = LoadTrackingStream::new(dispatch.response.bytes_stream(), dispatch.worker);
        let mut reader = SseReader::new();
        let mut last_usage: Option<Usage> = None;

        'outer: while let Some(chunk) = body_stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(err) => {
                    warn!(error = %err, "upstream stream read failed");
                    writer.send_error("upstream connection error").await;
                    break;
                }
            };
            let events = match reader.feed(&bytes) {
                Ok(events) => events,
                Err(err) => {
                    warn!(error = %err, "SSE buffer overflow reading upstream");
                    writer.send_error("upstream event stream malformed").await;
                    break;
                }
            };
            for event in events {
                if event.data == "[DONE]" {
                    break 'outer;
                }
                match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                    Ok(parsed) => {
                        if let Some(usage) = &parsed.usage {
                            last_usage = Some(Usage {
                                input_tokens: usage.prompt_tokens,
                                output_tokens: usage.completion_tokens,
                                cache_creation_input_tokens: None,
                                cache_read_input_tokens: None,
                                service_tier: None,
                            });
                        }
                        for delta in pipeline::chat_chunk_to_deltas(&parsed) {
                            state.handle(delta).await;
                        }
                    }
                    Err(err) => warn!(error = %err, data = %event.data, "could not parse upstream chat chunk"),
                }
            }
        }

        state.finalize(last_usage).await;
    });

    response
}

async fn via_codex(app: Arc<AppState>, headers: HeaderMap, req: CreateMessageRequest, streaming: bool) -> Response {
    let (responses_req, name_map) = translate_codex::claude_request_to_responses(&req);

    let body = match serde_json::to_value(&responses_req) {
        Ok(v) => v,
        Err(err) => return error::internal_error("request_serialize_error", err.to_string()),
    };

    let dispatch = match upstream::dispatch(&app, &req.model, "/v1/responses", &headers, &body).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    if !streaming {
        return non_streaming_codex(dispatch, &name_map, app.config.repair_windows_paths).await;
    }
    stream_codex(req.model, name_map, dispatch, app.config.repair_windows_paths)
}

async fn non_streaming_codex(dispatch: upstream::Dispatch, name_map: &ToolNameMap, repair_paths: bool) -> Response {
    let body = match upstream::read_capped_body(dispatch.response).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let parsed: ResponsesObject = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return error::bad_gateway("upstream_invalid_json", err.to_string()),
    };
    match translate_codex::responses_to_claude(&parsed, name_map, repair_paths) {
        Ok(message) => Json(message).into_response(),
        Err(err) => error::bad_gateway("upstream_empty_response", err.to_string()),
    }
}

fn stream_codex(model: String, name_map: ToolNameMap, dispatch: upstream::Dispatch, repair_paths: bool) -> Response {
    let (writer, response) = new_sse_channel();

    tokio::spawn(async move {
        // Codex's upstream speaks native tool calling; the force-function-
        // calling recovery path (C9) only applies to the chat-completions
        // leg, so no RewriteContext is ever threaded through here.
        let mut state = StreamState::new(writer.clone(), model, None, name_map, repair_paths);
        state.start().await;

        let mut body_stream = LoadTrackingStream::new(dispatch.response.bytes_stream(), dispatch.worker);
        let mut reader = SseReader::new();
        let mut last_usage: Option<Usage> = None;

        while let Some(chunk) = body_stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(err) => {
                    warn!(error = %err, "upstream stream read failed");
                    writer.send_error("upstream connection error").await;
                    break;
                }
            };
            let events = match reader.feed(&bytes) {
                Ok(events) => events,
                Err(err) => {
                    warn!(error = %err, "SSE buffer overflow reading upstream");
                    writer.send_error("upstream event stream malformed").await;
                    break;
                }
            };
            let mut done = false;
            for event in events {
                match serde_json::from_str::<ResponsesStreamEvent>(&event.data) {
                    Ok(parsed) => {
                        if let ResponsesStreamEvent::Completed { response } = &parsed {
                            if let Some(usage) = &response.usage {
                                last_usage = Some(Usage {
                                    input_tokens: usage.input_tokens,
                                    output_tokens: usage.output_tokens,
                                    cache_creation_input_tokens: None,
                                    cache_read_input_tokens: None,
                                    service_tier: None,
                                });
                            }
                            done = true;
                        }
                        for delta in pipeline::responses_event_to_deltas(&parsed) {
                            state.handle(delta).await;
                        }
                    }
                    Err(err) => warn!(error = %err, data = %event.data, "could not parse upstream response event"),
                }
            }
            if done {
                break;
            }
        }

        state.finalize(last_usage).await;
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_tokens_response_shape_round_trips() {
        let resp = CountMessageTokensResponse { input_tokens: 42 };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["input_tokens"], 42);
    }
}
