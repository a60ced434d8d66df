//! Claude Messages ↔ OpenAI Chat Completions structural conversion
//! (spec §4.8). Bidirectional, purely structural, and total: every
//! recognised input yields a well-formed output.

use openai_protocol::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatContentPart, ChatFunctionCall,
    ChatFunctionDef, ChatMessage, ChatMessageContent, ChatNamedFunction, ChatRole, ChatTool,
    ChatToolCall, ChatToolChoice, ChatUsage, ContentBlock, CreateMessageRequest, CustomTool,
    InputContent, InputContentBlock, InputMessage, Message, Role, StopReason, StringOrArray,
    Tool, ToolChoice, ToolResultBlock, ToolResultContent, ToolResultContentBlock, ToolUseBlock,
    Usage,
};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::normalizer;
use crate::token_count::apply_multiplier;
use crate::translate::short_names::ToolNameMap;
use crate::translate::stop_reason::map_finish_reason;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("upstream response had no choices")]
    EmptyChoices,
}

/// Convert a Claude Messages request into an OpenAI Chat Completions
/// request. Returns the translator's tool-name bijection alongside the
/// converted request so the response leg can restore original names.
pub fn claude_request_to_openai(req: &CreateMessageRequest) -> (ChatCompletionRequest, ToolNameMap) {
    let mut name_map = ToolNameMap::new();
    let mut messages = Vec::new();

    if let Some(system) = &req.system {
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: Some(ChatMessageContent::Text(system.as_text())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        });
    }

    for message in &req.messages {
        convert_input_message(message, &mut messages);
    }

    if let Some(ThinkingConfigHint { hint }) = thinking_hint(req) {
        append_to_last_user_message(&mut messages, &hint);
    }

    if !messages.iter().any(|m| matches!(m.role, ChatRole::User | ChatRole::Assistant)) {
        if let Some(system_msg) = messages.iter_mut().find(|m| matches!(m.role, ChatRole::System)) {
            system_msg.role = ChatRole::User;
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| convert_tool(tool, &mut name_map))
            .collect()
    });

    let chat_request = ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        stream: req.is_stream(),
        stream_options: None,
        temperature: req.temperature.map(|t| t as f32),
        top_p: req.top_p.map(|t| t as f32),
        max_tokens: Some(req.max_tokens),
        max_completion_tokens: None,
        n: None,
        stop: req
            .stop_sequences
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| StringOrArray::Array(s.clone())),
        tools,
        tool_choice: req.tool_choice.as_ref().map(convert_tool_choice),
        user: req.metadata.as_ref().and_then(|m| m.user_id.clone()),
        other: Default::default(),
    };

    (chat_request, name_map)
}

struct ThinkingConfigHint {
    hint: String,
}

fn thinking_hint(req: &CreateMessageRequest) -> Option<ThinkingConfigHint> {
    match &req.thinking {
        Some(openai_protocol::ThinkingConfig::Enabled { budget_tokens }) => {
            let mut hint = String::from("<antml\\b:thinking_mode>interleaved</antml>");
            hint.push_str(&format!(
                "<antml\\b:max_thinking_length>{}</antml>",
                budget_tokens
            ));
            Some(ThinkingConfigHint { hint })
        }
        _ => None,
    }
}

fn append_to_last_user_message(messages: &mut [ChatMessage], hint: &str) {
    if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == ChatRole::User) {
        let combined = match last_user.content.take() {
            Some(ChatMessageContent::Text(text)) => format!("{}\n{}", text, hint),
            Some(ChatMessageContent::Parts(mut parts)) => {
                parts.push(ChatContentPart::Text { text: hint.to_string() });
                last_user.content = Some(ChatMessageContent::Parts(parts));
                return;
            }
            None => hint.to_string(),
        };
        last_user.content = Some(ChatMessageContent::Text(combined));
    }
}

fn convert_input_message(message: &InputMessage, out: &mut Vec<ChatMessage>) {
    let role = match message.role {
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    };

    match &message.content {
        InputContent::String(text) => out.push(ChatMessage {
            role,
            content: Some(ChatMessageContent::Text(text.clone())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        }),
        InputContent::Blocks(blocks) => convert_input_blocks(role, blocks, out),
    }
}

fn convert_input_blocks(role: ChatRole, blocks: &[InputContentBlock], out: &mut Vec<ChatMessage>) {
    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in blocks {
        match block {
            InputContentBlock::Text(t) => {
                parts.push(ChatContentPart::Text { text: t.text.clone() });
            }
            InputContentBlock::Image(img) => {
                if let openai_protocol::ImageSource::Url { url } = &img.source {
                    parts.push(ChatContentPart::ImageUrl {
                        image_url: openai_protocol::ChatImageUrl {
                            url: url.clone(),
                            detail: None,
                        },
                    });
                }
            }
            InputContentBlock::Document(_) => {
                // Non-goal: no fidelity for unsupported block types beyond
                // passthrough. Documents are dropped rather than guessed at.
            }
            InputContentBlock::ToolUse(tool_use) => tool_calls.push(to_chat_tool_call(tool_use)),
            InputContentBlock::ToolResult(result) => tool_results.push(result),
            InputContentBlock::Thinking(_) | InputContentBlock::RedactedThinking(_) => {
                // OpenAI chat messages carry no thinking-block equivalent.
            }
        }
    }

    if !parts.is_empty() || !tool_calls.is_empty() {
        let content = if parts.len() == 1 {
            if let ChatContentPart::Text { text } = &parts[0] {
                Some(ChatMessageContent::Text(text.clone()))
            } else {
                Some(ChatMessageContent::Parts(parts))
            }
        } else if !parts.is_empty() {
            Some(ChatMessageContent::Parts(parts))
        } else {
            None
        };

        out.push(ChatMessage {
            role,
            content,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        });
    }

    for result in tool_results {
        out.push(tool_result_to_chat_message(result));
    }
}

fn to_chat_tool_call(tool_use: &ToolUseBlock) -> ChatToolCall {
    ChatToolCall {
        id: tool_use.id.clone(),
        call_type: "function".to_string(),
        function: ChatFunctionCall {
            name: tool_use.name.clone(),
            arguments: tool_use.input.to_string(),
        },
    }
}

fn tool_result_to_chat_message(result: &ToolResultBlock) -> ChatMessage {
    let text = match &result.content {
        Some(ToolResultContent::String(s)) => s.clone(),
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ToolResultContentBlock::Text(t) => Some(t.text.clone()),
                ToolResultContentBlock::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    };

    ChatMessage {
        role: ChatRole::Tool,
        content: Some(ChatMessageContent::Text(text)),
        tool_calls: None,
        tool_call_id: Some(result.tool_use_id.clone()),
        name: None,
        reasoning_content: None,
    }
}

fn convert_tool(tool: &Tool, name_map: &mut ToolNameMap) -> ChatTool {
    let Tool::Custom(custom) = tool;
    ChatTool::Function {
        function: ChatFunctionDef {
            name: name_map.shorten(&custom.name),
            description: custom.description.clone(),
            parameters: Some(custom_tool_schema(custom)),
        },
    }
}

fn custom_tool_schema(custom: &CustomTool) -> Value {
    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), Value::String(custom.input_schema.schema_type.clone()));
    if let Some(properties) = &custom.input_schema.properties {
        schema.insert(
            "properties".to_string(),
            serde_json::to_value(properties).unwrap_or(Value::Null),
        );
    }
    if let Some(required) = &custom.input_schema.required {
        schema.insert("required".to_string(), serde_json::to_value(required).unwrap_or(Value::Null));
    }
    Value::Object(schema)
}

fn convert_tool_choice(choice: &ToolChoice) -> ChatToolChoice {
    match choice {
        ToolChoice::Auto { .. } => ChatToolChoice::Mode("auto".to_string()),
        ToolChoice::Any { .. } => ChatToolChoice::Mode("required".to_string()),
        ToolChoice::None => ChatToolChoice::Mode("none".to_string()),
        ToolChoice::Tool { name, .. } => ChatToolChoice::Named {
            choice_type: "function".to_string(),
            function: ChatNamedFunction { name: name.clone() },
        },
    }
}

/// Convert a non-streaming OpenAI Chat Completions response into a Claude
/// `Message`. Tool call arguments are normalised through C7; a tool call
/// that C7 decides to skip (e.g. an unrepairable `TodoWrite`) is dropped
/// rather than emitted malformed.
pub fn openai_response_to_claude(
    resp: &ChatCompletionResponse,
    name_map: &ToolNameMap,
    repair_paths: bool,
) -> Result<Message, TranslateError> {
    let choice: &ChatChoice = resp.choices.first().ok_or(TranslateError::EmptyChoices)?;

    let mut content = Vec::new();

    if let Some(reasoning) = &choice.message.reasoning_content {
        if !reasoning.is_empty() {
            let thinking = crate::translate::paths::repair_if_enabled(reasoning, repair_paths);
            content.push(ContentBlock::Thinking { thinking, signature: String::new() });
        }
    }

    if let Some(ChatMessageContent::Text(text)) = &choice.message.content {
        if !text.is_empty() {
            let text = crate::translate::paths::repair_if_enabled(text, repair_paths);
            content.push(ContentBlock::Text { text, citations: None });
        }
    }

    let mut any_tool_use = false;
    if let Some(tool_calls) = &choice.message.tool_calls {
        for call in tool_calls {
            if let Some(block) = tool_call_to_content_block(call, name_map) {
                any_tool_use = true;
                content.push(block);
            }
        }
    }

    let stop_reason = map_finish_reason(choice.finish_reason.as_deref(), any_tool_use);

    let usage = resp
        .usage
        .as_ref()
        .map(convert_usage)
        .unwrap_or_default();

    Ok(Message {
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

fn tool_call_to_content_block(call: &ChatToolCall, name_map: &ToolNameMap) -> Option<ContentBlock> {
    let raw_args: Value = serde_json::from_str(&call.function.arguments).unwrap_or_else(|err| {
        warn!(error = %err, "tool call arguments were not valid JSON, treating as empty object");
        Value::Object(Default::default())
    });
    let args_map = match raw_args {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let original_name = name_map.restore(&call.function.name).to_string();
    let normalized = normalizer::normalize_arguments(&original_name, args_map)?;

    Some(ContentBlock::ToolUse {
        id: call.id.clone(),
        name: original_name,
        input: Value::Object(normalized),
    })
}

fn convert_usage(usage: &ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: apply_multiplier(usage.completion_tokens),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: None,
        service_tier: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_protocol::{CustomTool, InputSchema};
    use serde_json::json;

    fn minimal_request() -> CreateMessageRequest {
        CreateMessageRequest {
            model: "claude-3".to_string(),
            messages: vec![InputMessage {
                role: Role::User,
                content: InputContent::String("hello".to_string()),
            }],
            max_tokens: 256,
            metadata: None,
            service_tier: None,
            stop_sequences: None,
            stream: None,
            system: Some(openai_protocol::SystemContent::String("be nice".to_string())),
            temperature: None,
            thinking: None,
            tool_choice: None,
            tools: None,
            top_k: None,
            top_p: None,
        }
    }

    #[test]
    fn system_prompt_becomes_leading_system_message() {
        let (chat, _) = claude_request_to_openai(&minimal_request());
        assert!(matches!(chat.messages[0].role, ChatRole::System));
    }

    #[test]
    fn stop_sequences_map_to_stop_array() {
        let mut req = minimal_request();
        req.stop_sequences = Some(vec!["STOP".to_string()]);
        let (chat, _) = claude_request_to_openai(&req);
        assert!(matches!(chat.stop, Some(StringOrArray::Array(ref v)) if v == &["STOP".to_string()]));
    }

    #[test]
    fn tool_choice_any_becomes_required_mode() {
        let mut req = minimal_request();
        req.tool_choice = Some(ToolChoice::Any { disable_parallel_tool_use: None });
        let (chat, _) = claude_request_to_openai(&req);
        assert!(matches!(chat.tool_choice, Some(ChatToolChoice::Mode(ref m)) if m == "required"));
    }

    #[test]
    fn long_tool_name_is_shortened_in_request() {
        let mut req = minimal_request();
        let long_name = "x".repeat(90);
        req.tools = Some(vec![Tool::Custom(CustomTool {
            name: long_name.clone(),
            tool_type: None,
            description: None,
            input_schema: InputSchema {
                schema_type: "object".to_string(),
                properties: None,
                required: None,
                additional: Default::default(),
            },
            cache_control: None,
        })]);
        let (chat, name_map) = claude_request_to_openai(&req);
        let ChatTool::Function { function } = &chat.tools.unwrap()[0];
        assert!(function.name.len() < long_name.len());
        assert_eq!(name_map.restore(&function.name), long_name);
    }

    #[test]
    fn thinking_enabled_appends_hint_to_last_user_message() {
        let mut req = minimal_request();
        req.thinking = Some(openai_protocol::ThinkingConfig::Enabled { budget_tokens: 2048 });
        let (chat, _) = claude_request_to_openai(&req);
        let last_user = chat
            .messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .unwrap();
        match &last_user.content {
            Some(ChatMessageContent::Text(text)) => {
                assert!(text.contains("thinking_mode"));
                assert!(text.contains("2048"));
            }
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn system_only_request_downgrades_to_user_when_no_conversation_survives() {
        let req = CreateMessageRequest {
            messages: vec![],
            ..minimal_request()
        };
        let (chat, _) = claude_request_to_openai(&req);
        assert!(chat.messages.iter().any(|m| m.role == ChatRole::User));
    }

    #[test]
    fn response_emits_text_and_tool_use_blocks() {
        let resp = ChatCompletionResponse {
            id: "id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(ChatMessageContent::Text("hi there".to_string())),
                    tool_calls: Some(vec![ChatToolCall {
                        id: "call_1".to_string(),
                        call_type: "function".to_string(),
                        function: ChatFunctionCall {
                            name: "list_dir".to_string(),
                            arguments: json!({"path": "/tmp"}).to_string(),
                        },
                    }]),
                    tool_call_id: None,
                    name: None,
                    reasoning_content: None,
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: Some(ChatUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
            system_fingerprint: None,
        };
        let name_map = ToolNameMap::new();
        let message = openai_response_to_claude(&resp, &name_map, false).unwrap();
        assert_eq!(message.stop_reason, Some(StopReason::ToolUse));
        assert!(message.content.iter().any(|b| matches!(b, ContentBlock::Text { .. })));
        assert!(message.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })));
    }

    #[test]
    fn reasoning_content_becomes_leading_thinking_block() {
        let resp = ChatCompletionResponse {
            id: "id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(ChatMessageContent::Text("the answer".to_string())),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                    reasoning_content: Some("let me think".to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
            system_fingerprint: None,
        };
        let name_map = ToolNameMap::new();
        let message = openai_response_to_claude(&resp, &name_map, false).unwrap();
        assert!(matches!(message.content[0], ContentBlock::Thinking { .. }));
        assert!(matches!(message.content[1], ContentBlock::Text { .. }));
    }

    #[test]
    fn phantom_tool_use_is_downgraded_to_end_turn() {
        let resp = ChatCompletionResponse {
            id: "id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(ChatMessageContent::Text("no tools here".to_string())),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                    reasoning_content: None,
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
            system_fingerprint: None,
        };
        let name_map = ToolNameMap::new();
        let message = openai_response_to_claude(&resp, &name_map, false).unwrap();
        assert_eq!(message.stop_reason, Some(StopReason::EndTurn));
    }
}
