//! OpenAI Responses ("Codex") API protocol definitions
//!
//! Rust types for the `/v1/responses` wire format: `input`/`output` item
//! lists rather than Chat Completions' flat message array, plus a
//! `response.*`-prefixed SSE event vocabulary. See:
//! <https://platform.openai.com/docs/api-reference/responses>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validated::Normalizable;

/// Request body for `/v1/responses`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,

    /// Conversation input: a plain string or a list of input items.
    pub input: ResponsesInput,

    /// System-level steering instructions (roughly Claude's `system`).
    pub instructions: Option<String>,

    #[serde(default)]
    pub stream: bool,

    pub tools: Option<Vec<ResponsesTool>>,
    pub tool_choice: Option<ResponsesToolChoice>,

    pub reasoning: Option<ReasoningConfig>,

    /// Whether the upstream should persist this response (gateway always
    /// forwards `false` unless the client explicitly overrides it).
    pub store: Option<bool>,

    /// Extra data to include in the response, e.g.
    /// `"reasoning.encrypted_content"`.
    pub include: Option<Vec<String>>,

    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl Normalizable for ResponsesRequest {}

impl ResponsesRequest {
    pub fn is_stream(&self) -> bool {
        self.stream
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Items(Vec<ResponsesItem>),
}

/// One entry of the `input[]`/`output[]` item list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesItem {
    Message {
        role: ResponsesRole,
        content: Vec<ResponsesContentPart>,
    },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
    Reasoning {
        id: String,
        summary: Vec<ReasoningSummaryPart>,
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponsesRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContentPart {
    InputText { text: String },
    OutputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSummaryPart {
    #[serde(rename = "type")]
    pub part_type: String, // "summary_text"
    pub text: String,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: Option<String>, // "low" | "medium" | "high"
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTool {
    Function {
        name: String,
        description: Option<String>,
        parameters: Option<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    Mode(String),
    Named { #[serde(rename = "type")] choice_type: String, name: String },
}

// ============================================================================
// Response object (non-streaming)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesObject {
    pub id: String,
    pub object: String, // "response"
    pub created_at: u64,
    pub model: String,
    pub status: ResponsesStatus,
    pub output: Vec<ResponsesItem>,
    pub usage: Option<ResponsesUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponsesStatus {
    Completed,
    Incomplete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponsesUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

// ============================================================================
// Streaming event vocabulary (prefix `response.`)
// ============================================================================

/// The `response.*`-prefixed SSE event vocabulary. Each variant's `type`
/// field carries the literal dotted event name, e.g. `response.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponsesObject },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: u32, item: ResponsesItem },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { output_index: u32, item: ResponsesItem },

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        item_id: String,
        output_index: u32,
        content_index: u32,
        part: ResponsesContentPart,
    },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        item_id: String,
        output_index: u32,
        content_index: u32,
        part: ResponsesContentPart,
    },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        output_index: u32,
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        item_id: String,
        output_index: u32,
        content_index: u32,
        text: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        item_id: String,
        output_index: u32,
        arguments: String,
    },

    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        item_id: String,
        output_index: u32,
        summary_index: u32,
        delta: String,
    },
    #[serde(rename = "response.reasoning_summary_text.done")]
    ReasoningSummaryTextDone {
        item_id: String,
        output_index: u32,
        summary_index: u32,
        text: String,
    },

    #[serde(rename = "response.completed")]
    Completed { response: ResponsesObject },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_accepts_plain_string() {
        let req: ResponsesRequest =
            serde_json::from_str(r#"{"model":"m","input":"hi"}"#).unwrap();
        assert!(matches!(req.input, ResponsesInput::Text(s) if s == "hi"));
    }

    #[test]
    fn stream_event_tag_round_trips() {
        let ev = ResponsesStreamEvent::OutputTextDelta {
            item_id: "item_1".into(),
            output_index: 0,
            content_index: 0,
            delta: "hi".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "response.output_text.delta");
        let back: ResponsesStreamEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, ResponsesStreamEvent::OutputTextDelta { .. }));
    }

    #[test]
    fn function_call_output_item_round_trips() {
        let item = ResponsesItem::FunctionCall {
            id: "fc_1".into(),
            call_id: "call_1".into(),
            name: "get_weather".into(),
            arguments: "{}".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "function_call");
    }
}
