//! Response-side orchestration shared by the non-streaming (C10) and
//! streaming (C11) handlers: rebuilding a Claude `Message`/event sequence
//! out of an upstream's chat-completion-shaped reply, including the
//! force-function-calling XML recovery path (C5/C6/C7/C9) that only
//! applies when the gateway itself synthesized the tool-calling contract.

use std::sync::Arc;

use openai_protocol::{
    ChatChoice, ChatCompletionChunk, ChatCompletionResponse, ChatMessageContent, ContentBlock,
    ContentBlockDelta, MessageDelta, MessageDeltaUsage, MessageStreamEvent,
    ResponsesItem, ResponsesStreamEvent, StopReason, Usage,
};
use reasoning_parser::{SplitterConfig, ThinkingEvent, ThinkingSplitter};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::aggregator::TextAggregator;
use crate::rewriter::RewriteContext;
use crate::sanitizer::{self, CleanupMode};
use crate::sse::SseWriter;
use crate::token_count::apply_multiplier;
use crate::translate::paths::repair_if_enabled;
use crate::translate::short_names::ToolNameMap;
use crate::translate::stop_reason::map_finish_reason;

/// Cap on the text accumulated for a possible force-function-calling
/// re-parse at finalize (spec §4.11).
const MAX_ACCUMULATED_CONTENT: usize = 256 * 1024;

/// Runs tool_parser's XML recovery (C5) plus argument normalisation (C7)
/// over `text`, then strips whatever artifacts remain (C6, full mode).
/// Returns the cleaned visible text and any tool_use blocks recovered.
pub fn finalize_forced_tool_calls(text: &str, trigger_signal: &str) -> (String, Vec<ContentBlock>) {
    let calls = tool_parser::parse_function_calls(text, Some(trigger_signal));
    let blocks = calls
        .into_iter()
        .filter_map(|call| {
            let args = crate::normalizer::normalize_arguments(&call.name, call.args)?;
            Some(ContentBlock::ToolUse {
                id: format!("toolu_{}", Uuid::new_v4().simple()),
                name: call.name,
                input: Value::Object(args),
            })
        })
        .collect();
    let cleaned = sanitizer::sanitize(text, CleanupMode::Full);
    (cleaned, blocks)
}

fn flatten_message_text(content: &Option<ChatMessageContent>) -> String {
    match content {
        Some(ChatMessageContent::Text(text)) => text.clone(),
        Some(ChatMessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|p| match p {
                openai_protocol::ChatContentPart::Text { text } => Some(text.clone()),
                openai_protocol::ChatContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    }
}

/// Builds the final Claude `Message` for a non-streaming response (C10).
/// Takes the force-function-calling recovery path when `rewrite_ctx` is
/// `Some`; otherwise delegates straight to the structural C8 translator.
pub fn build_message_non_streaming(
    resp: &ChatCompletionResponse,
    name_map: &ToolNameMap,
    rewrite_ctx: Option<&RewriteContext>,
    repair_paths: bool,
) -> Result<openai_protocol::Message, crate::translate::openai::TranslateError> {
    let Some(ctx) = rewrite_ctx else {
        return crate::translate::openai::openai_response_to_claude(resp, name_map, repair_paths);
    };

    let choice: &ChatChoice = resp
        .choices
        .first()
        .ok_or(crate::translate::openai::TranslateError::EmptyChoices)?;

    let mut content = Vec::new();
    if let Some(reasoning) = &choice.message.reasoning_content {
        if !reasoning.is_empty() {
            let thinking = repair_if_enabled(reasoning, repair_paths);
            content.push(ContentBlock::Thinking { thinking, signature: String::new() });
        }
    }

    let raw_text = flatten_message_text(&choice.message.content);
    let (cleaned_text, tool_blocks) = finalize_forced_tool_calls(&raw_text, &ctx.trigger_signal);
    let cleaned_text = repair_if_enabled(&cleaned_text, repair_paths);
    if !cleaned_text.trim().is_empty() {
        content.push(ContentBlock::Text { text: cleaned_text, citations: None });
    }
    let any_tool_use = !tool_blocks.is_empty();
    content.extend(tool_blocks);

    let stop_reason = if any_tool_use {
        StopReason::ToolUse
    } else {
        map_finish_reason(choice.finish_reason.as_deref(), false)
    };

    let usage = resp
        .usage
        .as_ref()
        .map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: apply_multiplier(u.completion_tokens),
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
            service_tier: None,
        })
        .unwrap_or_default();

    Ok(openai_protocol::Message {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        message_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: resp.model.clone(),
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage,
    })
}

/// One normalised unit of streaming progress, produced by either the
/// OpenAI Chat Completions or the Codex (`response.*`) event adapters
/// below, and consumed uniformly by [`StreamState`].
///
/// `key` identifies a tool call across fragments for as long as it stays
/// open. Chat Completions only repeats `id` on the opening delta of a
/// tool call, so chat's key is the stable `tool_calls[].index` instead;
/// Codex repeats `item_id` on every fragment, so it is used directly.
pub enum DeltaInput {
    Reasoning(String),
    Content(String),
    ToolCallStart { key: String, id: String, name: String },
    ToolCallArgs { key: String, fragment: String },
    Finish(Option<String>),
}

pub fn chat_chunk_to_deltas(chunk: &ChatCompletionChunk) -> Vec<DeltaInput> {
    let mut out = Vec::new();
    let Some(choice) = chunk.choices.first() else { return out };

    if let Some(reasoning) = &choice.delta.reasoning_content {
        if !reasoning.is_empty() {
            out.push(DeltaInput::Reasoning(reasoning.clone()));
        }
    }
    if let Some(text) = &choice.delta.content {
        if !text.is_empty() {
            out.push(DeltaInput::Content(text.clone()));
        }
    }
    if let Some(tool_calls) = &choice.delta.tool_calls {
        for call in tool_calls {
            let key = call.index.to_string();
            if let Some(id) = &call.id {
                let name = call
                    .function
                    .as_ref()
                    .and_then(|f| f.name.clone())
                    .unwrap_or_default();
                out.push(DeltaInput::ToolCallStart { key: key.clone(), id: id.clone(), name });
            }
            if let Some(function) = &call.function {
                if let Some(args) = &function.arguments {
                    out.push(DeltaInput::ToolCallArgs { key: key.clone(), fragment: args.clone() });
                }
            }
        }
    }
    if let Some(reason) = &choice.finish_reason {
        out.push(DeltaInput::Finish(Some(reason.clone())));
    }
    out
}

pub fn responses_event_to_deltas(event: &ResponsesStreamEvent) -> Vec<DeltaInput> {
    match event {
        ResponsesStreamEvent::OutputItemAdded {
            item: ResponsesItem::FunctionCall { id, call_id, name, .. },
            ..
        } => {
            vec![DeltaInput::ToolCallStart { key: id.clone(), id: call_id.clone(), name: name.clone() }]
        }
        ResponsesStreamEvent::OutputTextDelta { delta, .. } => vec![DeltaInput::Content(delta.clone())],
        ResponsesStreamEvent::ReasoningSummaryTextDelta { delta, .. } => {
            vec![DeltaInput::Reasoning(delta.clone())]
        }
        ResponsesStreamEvent::FunctionCallArgumentsDelta { item_id, delta, .. } => {
            vec![DeltaInput::ToolCallArgs { key: item_id.clone(), fragment: delta.clone() }]
        }
        ResponsesStreamEvent::Completed { response } => {
            let status = match response.status {
                openai_protocol::ResponsesStatus::Completed => "completed",
                openai_protocol::ResponsesStatus::Incomplete => "incomplete",
                openai_protocol::ResponsesStatus::Failed => "failed",
            };
            vec![DeltaInput::Finish(Some(status.to_string()))]
        }
        _ => Vec::new(),
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum OpenBlock {
    None,
    Text,
    Thinking,
    ToolUse,
}

struct ActiveTool {
    key: String,
    id: String,
    name: String,
    args: String,
    index: u32,
}

/// Single-owner streaming state machine (C11). One instance per request;
/// drives a [`SseWriter`] for its full duration.
pub struct StreamState {
    writer: Arc<SseWriter>,
    splitter: ThinkingSplitter,
    aggregator: TextAggregator,
    block_index: u32,
    open_block: OpenBlock,
    accumulated_content: String,
    content_overflowed: bool,
    any_tool_use: bool,
    active_tool: Option<ActiveTool>,
    rewrite_ctx: Option<RewriteContext>,
    name_map: ToolNameMap,
    pending_stop_reason: Option<StopReason>,
    message_id: String,
    model: String,
    repair_paths: bool,
}

impl StreamState {
    /// `repair_paths` gates the Windows-drive-letter cleanup (spec §4.8.1):
    /// only a client that expects Unix-style paths from its IDE integration
    /// wants this rewrite, so it is off unless the operator opts in via
    /// `Config::repair_windows_paths`.
    pub fn new(
        writer: Arc<SseWriter>,
        model: String,
        rewrite_ctx: Option<RewriteContext>,
        name_map: ToolNameMap,
        repair_paths: bool,
    ) -> Self {
        Self {
            writer,
            splitter: ThinkingSplitter::new(SplitterConfig::gateway_default()),
            aggregator: TextAggregator::new(),
            block_index: 0,
            open_block: OpenBlock::None,
            accumulated_content: String::new(),
            content_overflowed: false,
            any_tool_use: false,
            active_tool: None,
            rewrite_ctx,
            name_map,
            pending_stop_reason: None,
            message_id: format!("msg_{}", Uuid::new_v4().simple()),
            model,
            repair_paths,
        }
    }

    fn maybe_repair(&self, text: String) -> String {
        repair_if_enabled(&text, self.repair_paths)
    }

    /// `Full` when the gateway itself synthesised the force-function-calling
    /// XML contract (spec §4.6) — otherwise the client's own tool-calling
    /// markup must survive, so only the lighter artifacts-only pass runs.
    fn cleanup_mode(&self) -> CleanupMode {
        if self.rewrite_ctx.is_some() {
            CleanupMode::Full
        } else {
            CleanupMode::ArtifactsOnly
        }
    }

    pub async fn start(&self) {
        let message = openai_protocol::Message {
            id: self.message_id.clone(),
            message_type: "message".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
            model: self.model.clone(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage::default(),
        };
        let event = MessageStreamEvent::MessageStart { message };
        self.send("message_start", &event).await;
    }

    async fn send(&self, event_type: &str, event: &MessageStreamEvent) {
        let data = serde_json::to_value(event).unwrap_or_else(|_| Value::Null);
        self.writer.send_event(event_type, &data).await;
    }

    async fn open_content_block(&mut self, block: ContentBlock) -> u32 {
        let index = self.block_index;
        self.block_index += 1;
        self.send("content_block_start", &MessageStreamEvent::ContentBlockStart { index, content_block: block }).await;
        index
    }

    async fn emit_delta(&self, index: u32, delta: ContentBlockDelta) {
        self.send("content_block_delta", &MessageStreamEvent::ContentBlockDelta { index, delta }).await;
    }

    async fn close_block(&mut self, index: u32) {
        self.send("content_block_stop", &MessageStreamEvent::ContentBlockStop { index }).await;
    }

    async fn ensure_text_open(&mut self) -> u32 {
        if self.open_block != OpenBlock::Text {
            self.close_open_block().await;
            let index = self.open_content_block(ContentBlock::Text { text: String::new(), citations: None }).await;
            self.open_block = OpenBlock::Text;
            return index;
        }
        self.block_index - 1
    }

    async fn ensure_thinking_open(&mut self) -> u32 {
        if self.open_block != OpenBlock::Thinking {
            self.close_open_block().await;
            let index = self.open_content_block(ContentBlock::Thinking { thinking: String::new(), signature: String::new() }).await;
            self.open_block = OpenBlock::Thinking;
            return index;
        }
        self.block_index - 1
    }

    /// Closes whichever block is currently open, finalising tool-call
    /// argument normalisation (C7) if it was a `tool_use` block.
    async fn close_open_block(&mut self) {
        match self.open_block {
            OpenBlock::None => {}
            OpenBlock::Text | OpenBlock::Thinking => {
                let index = self.block_index - 1;
                self.close_block(index).await;
            }
            OpenBlock::ToolUse => {
                if let Some(tool) = self.active_tool.take() {
                    let raw: Value = serde_json::from_str(&tool.args).unwrap_or_else(|_| Value::Object(Default::default()));
                    let args_map = match raw {
                        Value::Object(map) => map,
                        other => {
                            let mut map = serde_json::Map::new();
                            map.insert("value".to_string(), other);
                            map
                        }
                    };
                    let original_name = self.name_map.restore(&tool.name).to_string();
                    if let Some(normalized) = crate::normalizer::normalize_arguments(&original_name, args_map) {
                        let partial_json = Value::Object(normalized).to_string();
                        self.emit_delta(tool.index, ContentBlockDelta::InputJsonDelta { partial_json }).await;
                        self.any_tool_use = true;
                    }
                    self.close_block(tool.index).await;
                }
            }
        }
        self.open_block = OpenBlock::None;
    }

    async fn open_tool_use(&mut self, key: String, id: String, name: String) {
        self.close_open_block().await;
        let index = self.open_content_block(ContentBlock::ToolUse { id: id.clone(), name: name.clone(), input: Value::Object(Default::default()) }).await;
        self.open_block = OpenBlock::ToolUse;
        self.active_tool = Some(ActiveTool { key, id, name, args: String::new(), index });
    }

    async fn flush_aggregator(&mut self) {
        if let Some(text) = self.aggregator.maybe_flush() {
            let index = self.ensure_text_open().await;
            let repaired = self.maybe_repair(text);
            let cleaned = sanitizer::sanitize(&repaired, self.cleanup_mode());
            if !cleaned.is_empty() {
                self.emit_delta(index, ContentBlockDelta::TextDelta { text: cleaned }).await;
            }
        }
    }

    async fn handle_thinking_events(&mut self, events: Vec<ThinkingEvent>) {
        for event in events {
            match event {
                ThinkingEvent::Text(text) => {
                    self.aggregator.add(&text);
                    self.flush_aggregator().await;
                }
                ThinkingEvent::Thinking(text) => {
                    if !text.is_empty() {
                        let index = self.ensure_thinking_open().await;
                        let repaired = self.maybe_repair(text);
                        self.emit_delta(index, ContentBlockDelta::ThinkingDelta { thinking: repaired }).await;
                    }
                }
                ThinkingEvent::End => {}
            }
        }
    }

    pub async fn handle(&mut self, input: DeltaInput) {
        match input {
            DeltaInput::Reasoning(text) => {
                if !text.is_empty() {
                    let index = self.ensure_thinking_open().await;
                    let repaired = self.maybe_repair(text);
                    self.emit_delta(index, ContentBlockDelta::ThinkingDelta { thinking: repaired }).await;
                }
            }
            DeltaInput::Content(text) => {
                if !self.content_overflowed {
                    if self.accumulated_content.len() + text.len() > MAX_ACCUMULATED_CONTENT {
                        self.content_overflowed = true;
                        warn!("accumulated streaming content exceeded 256 KiB, truncating for force-function-call recovery");
                    } else {
                        self.accumulated_content.push_str(&text);
                    }
                }
                let events = self.splitter.push_str(&text);
                self.handle_thinking_events(events).await;
            }
            DeltaInput::ToolCallStart { key, id, name } => {
                self.flush_aggregator().await;
                if let Some(pending) = self.aggregator.flush() {
                    let index = self.ensure_text_open().await;
                    let repaired = self.maybe_repair(pending);
                    let cleaned = sanitizer::sanitize(&repaired, self.cleanup_mode());
                    if !cleaned.is_empty() {
                        self.emit_delta(index, ContentBlockDelta::TextDelta { text: cleaned }).await;
                    }
                }
                let same_tool = self.active_tool.as_ref().is_some_and(|t| t.key == key);
                if !same_tool {
                    self.open_tool_use(key, id, name).await;
                }
            }
            DeltaInput::ToolCallArgs { key, fragment } => {
                match &mut self.active_tool {
                    Some(tool) if tool.key == key => tool.args.push_str(&fragment),
                    _ => {
                        self.open_tool_use(key.clone(), String::new(), String::new()).await;
                        if let Some(tool) = &mut self.active_tool {
                            tool.args.push_str(&fragment);
                        }
                    }
                }
            }
            DeltaInput::Finish(reason) => {
                let downgraded = map_finish_reason(reason.as_deref(), self.any_tool_use_hint());
                self.pending_stop_reason = Some(downgraded);
            }
        }
    }

    fn any_tool_use_hint(&self) -> bool {
        self.any_tool_use || self.active_tool.is_some()
    }

    /// Drains every internal buffer, runs the force-function-calling
    /// re-parse if applicable, and emits the terminal event pair.
    pub async fn finalize(mut self, usage: Option<Usage>) {
        let events = self.splitter.finish();
        self.handle_thinking_events(events).await;
        if let Some(text) = self.aggregator.close() {
            let index = self.ensure_text_open().await;
            let repaired = self.maybe_repair(text);
            let cleaned = sanitizer::sanitize(&repaired, self.cleanup_mode());
            if !cleaned.is_empty() {
                self.emit_delta(index, ContentBlockDelta::TextDelta { text: cleaned }).await;
            }
        }
        self.close_open_block().await;

        let mut stop_reason = self.pending_stop_reason.unwrap_or(StopReason::EndTurn);

        if let Some(ctx) = self.rewrite_ctx.take() {
            let (_, tool_blocks) = finalize_forced_tool_calls(&self.accumulated_content, &ctx.trigger_signal);
            if !tool_blocks.is_empty() {
                for block in tool_blocks {
                    let index = self.open_content_block(block).await;
                    self.close_block(index).await;
                }
                stop_reason = StopReason::ToolUse;
                self.any_tool_use = true;
            }
        }

        let usage = usage.unwrap_or_default();
        let delta_usage = MessageDeltaUsage {
            output_tokens: apply_multiplier(usage.output_tokens),
            input_tokens: Some(usage.input_tokens),
            cache_creation_input_tokens: usage.cache_creation_input_tokens,
            cache_read_input_tokens: usage.cache_read_input_tokens,
        };
        self.send(
            "message_delta",
            &MessageStreamEvent::MessageDelta {
                delta: MessageDelta { stop_reason: Some(stop_reason), stop_sequence: None },
                usage: delta_usage,
            },
        )
        .await;
        self.send("message_stop", &MessageStreamEvent::MessageStop).await;
    }
}
