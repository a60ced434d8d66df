//! Claude Messages ↔ OpenAI Responses ("Codex") structural conversion
//! (spec §4.8, analogous mappings). Codex trades a flat message array for
//! an `input[]`/`output[]` item list, `reasoning.effort` instead of a
//! thinking budget, and a `response.*`-prefixed SSE vocabulary (handled
//! by the streaming handler, not here).

use openai_protocol::{
    ContentBlock, CreateMessageRequest, InputContent, InputContentBlock, InputMessage, Message,
    ReasoningConfig, ResponsesInput, ResponsesItem, ResponsesObject, ResponsesRequest,
    ResponsesRole, ResponsesContentPart, ResponsesStatus, ResponsesTool, ResponsesToolChoice,
    Role, StopReason, Tool, ToolChoice, ToolResultContent, Usage,
};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::normalizer;
use crate::token_count::apply_multiplier;
use crate::translate::short_names::ToolNameMap;
use crate::translate::stop_reason::map_responses_status;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("upstream response had no usable output items")]
    EmptyOutput,
}

pub fn claude_request_to_responses(req: &CreateMessageRequest) -> (ResponsesRequest, ToolNameMap) {
    let mut name_map = ToolNameMap::new();
    let mut items = Vec::new();

    for message in &req.messages {
        push_responses_items(message, &mut items);
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| convert_tool(tool, &mut name_map))
            .collect()
    });

    let request = ResponsesRequest {
        model: req.model.clone(),
        input: ResponsesInput::Items(items),
        instructions: req.system.as_ref().map(|s| s.as_text()),
        stream: req.is_stream(),
        tools,
        tool_choice: req.tool_choice.as_ref().map(convert_tool_choice),
        reasoning: reasoning_config(req),
        store: Some(false),
        include: reasoning_config(req).map(|_| vec!["reasoning.encrypted_content".to_string()]),
        max_output_tokens: Some(req.max_tokens),
        temperature: req.temperature.map(|t| t as f32),
        top_p: req.top_p.map(|t| t as f32),
    };

    (request, name_map)
}

fn reasoning_config(req: &CreateMessageRequest) -> Option<ReasoningConfig> {
    match &req.thinking {
        Some(openai_protocol::ThinkingConfig::Enabled { budget_tokens }) => Some(ReasoningConfig {
            effort: Some(effort_for_budget(*budget_tokens)),
            summary: Some("auto".to_string()),
        }),
        _ => None,
    }
}

fn effort_for_budget(budget_tokens: u32) -> String {
    if budget_tokens >= 16_000 {
        "high".to_string()
    } else if budget_tokens >= 4_000 {
        "medium".to_string()
    } else {
        "low".to_string()
    }
}

fn push_responses_items(message: &InputMessage, out: &mut Vec<ResponsesItem>) {
    let role = match message.role {
        Role::User => ResponsesRole::User,
        Role::Assistant => ResponsesRole::Assistant,
    };

    match &message.content {
        InputContent::String(text) => out.push(ResponsesItem::Message {
            role,
            content: vec![text_part_for_role(&role, text.clone())],
        }),
        InputContent::Blocks(blocks) => {
            let mut content = Vec::new();
            for block in blocks {
                match block {
                    InputContentBlock::Text(t) => content.push(text_part_for_role(&role, t.text.clone())),
                    InputContentBlock::ToolUse(tool_use) => {
                        out.push(ResponsesItem::FunctionCall {
                            id: format!("fc_{}", tool_use.id),
                            call_id: tool_use.id.clone(),
                            name: tool_use.name.clone(),
                            arguments: tool_use.input.to_string(),
                        });
                    }
                    InputContentBlock::ToolResult(result) => {
                        let output = match &result.content {
                            Some(ToolResultContent::String(s)) => s.clone(),
                            Some(ToolResultContent::Blocks(_)) | None => String::new(),
                        };
                        out.push(ResponsesItem::FunctionCallOutput {
                            call_id: result.tool_use_id.clone(),
                            output,
                        });
                    }
                    InputContentBlock::Image(_)
                    | InputContentBlock::Document(_)
                    | InputContentBlock::Thinking(_)
                    | InputContentBlock::RedactedThinking(_) => {}
                }
            }
            if !content.is_empty() {
                out.push(ResponsesItem::Message { role, content });
            }
        }
    }
}

fn text_part_for_role(role: &ResponsesRole, text: String) -> ResponsesContentPart {
    match role {
        ResponsesRole::Assistant => ResponsesContentPart::OutputText { text },
        ResponsesRole::User | ResponsesRole::System => ResponsesContentPart::InputText { text },
    }
}

fn convert_tool(tool: &Tool, name_map: &mut ToolNameMap) -> ResponsesTool {
    let Tool::Custom(custom) = tool;
    ResponsesTool::Function {
        name: name_map.shorten(&custom.name),
        description: custom.description.clone(),
        parameters: custom.input_schema.properties.as_ref().map(|props| {
            serde_json::json!({
                "type": custom.input_schema.schema_type,
                "properties": props,
                "required": custom.input_schema.required,
            })
        }),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> ResponsesToolChoice {
    match choice {
        ToolChoice::Auto { .. } => ResponsesToolChoice::Mode("auto".to_string()),
        ToolChoice::Any { .. } => ResponsesToolChoice::Mode("required".to_string()),
        ToolChoice::None => ResponsesToolChoice::Mode("none".to_string()),
        ToolChoice::Tool { name, .. } => ResponsesToolChoice::Named {
            choice_type: "function".to_string(),
            name: name.clone(),
        },
    }
}

/// Convert a non-streaming Codex `ResponsesObject` into a Claude `Message`.
pub fn responses_to_claude(
    resp: &ResponsesObject,
    name_map: &ToolNameMap,
    repair_paths: bool,
) -> Result<Message, TranslateError> {
    if resp.output.is_empty() {
        return Err(TranslateError::EmptyOutput);
    }

    let mut content = Vec::new();
    let mut any_tool_use = false;

    for item in &resp.output {
        match item {
            ResponsesItem::Message { content: parts, .. } => {
                for part in parts {
                    if let ResponsesContentPart::OutputText { text } = part {
                        if !text.is_empty() {
                            let text = crate::translate::paths::repair_if_enabled(text, repair_paths);
                            content.push(ContentBlock::Text { text, citations: None });
                        }
                    }
                }
            }
            ResponsesItem::FunctionCall { call_id, name, arguments, .. } => {
                if let Some(block) = function_call_to_block(call_id, name, arguments, name_map) {
                    any_tool_use = true;
                    content.push(block);
                }
            }
            ResponsesItem::Reasoning { summary, .. } => {
                for part in summary {
                    if !part.text.is_empty() {
                        let thinking = crate::translate::paths::repair_if_enabled(&part.text, repair_paths);
                        content.push(ContentBlock::Thinking {
                            thinking,
                            signature: String::new(),
                        });
                    }
                }
            }
            ResponsesItem::FunctionCallOutput { .. } => {}
        }
    }

    let status_str = match resp.status {
        ResponsesStatus::Completed => "completed",
        ResponsesStatus::Incomplete => "incomplete",
        ResponsesStatus::Failed => "failed",
    };
    let stop_reason = map_responses_status(status_str, any_tool_use);

    let usage = resp
        .usage
        .as_ref()
        .map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: apply_multiplier(u.output_tokens),
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
            service_tier: None,
        })
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

fn function_call_to_block(
    call_id: &str,
    name: &str,
    arguments: &str,
    name_map: &ToolNameMap,
) -> Option<ContentBlock> {
    let raw_args: Value = serde_json::from_str(arguments).unwrap_or_else(|err| {
        warn!(error = %err, "Codex function call arguments were not valid JSON");
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

    let original_name = name_map.restore(name).to_string();
    let normalized = normalizer::normalize_arguments(&original_name, args_map)?;

    Some(ContentBlock::ToolUse {
        id: call_id.to_string(),
        name: original_name,
        input: Value::Object(normalized),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_protocol::{SystemContent, ThinkingConfig};

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
            system: Some(SystemContent::String("be nice".to_string())),
            temperature: None,
            thinking: None,
            tool_choice: None,
            tools: None,
            top_k: None,
            top_p: None,
        }
    }

    #[test]
    fn system_prompt_becomes_instructions() {
        let (req, _) = claude_request_to_responses(&minimal_request());
        assert_eq!(req.instructions.as_deref(), Some("be nice"));
    }

    #[test]
    fn store_is_always_false() {
        let (req, _) = claude_request_to_responses(&minimal_request());
        assert_eq!(req.store, Some(false));
    }

    #[test]
    fn thinking_enabled_sets_reasoning_effort() {
        let mut req = minimal_request();
        req.thinking = Some(ThinkingConfig::Enabled { budget_tokens: 20_000 });
        let (converted, _) = claude_request_to_responses(&req);
        assert_eq!(converted.reasoning.unwrap().effort.as_deref(), Some("high"));
    }

    #[test]
    fn incomplete_status_maps_to_max_tokens() {
        let resp = ResponsesObject {
            id: "resp_1".to_string(),
            object: "response".to_string(),
            created_at: 0,
            model: "codex".to_string(),
            status: ResponsesStatus::Incomplete,
            output: vec![ResponsesItem::Message {
                role: ResponsesRole::Assistant,
                content: vec![ResponsesContentPart::OutputText { text: "partial".to_string() }],
            }],
            usage: None,
        };
        let name_map = ToolNameMap::new();
        let message = responses_to_claude(&resp, &name_map, false).unwrap();
        assert_eq!(message.stop_reason, Some(StopReason::MaxTokens));
    }

    #[test]
    fn function_call_output_item_becomes_tool_use_block() {
        let resp = ResponsesObject {
            id: "resp_1".to_string(),
            object: "response".to_string(),
            created_at: 0,
            model: "codex".to_string(),
            status: ResponsesStatus::Completed,
            output: vec![ResponsesItem::FunctionCall {
                id: "fc_1".to_string(),
                call_id: "call_1".to_string(),
                name: "list_dir".to_string(),
                arguments: serde_json::json!({"path": "/tmp"}).to_string(),
            }],
            usage: None,
        };
        let name_map = ToolNameMap::new();
        let message = responses_to_claude(&resp, &name_map, false).unwrap();
        assert!(message.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })));
        assert_eq!(message.stop_reason, Some(StopReason::ToolUse));
    }
}
