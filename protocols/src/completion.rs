//! OpenAI Chat Completions API protocol definitions
//!
//! Rust types for the `/v1/chat/completions` wire format this gateway
//! translates to and from. See:
//! <https://platform.openai.com/docs/api-reference/chat>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validated::Normalizable;

/// Request body for `/v1/chat/completions`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// ID of the model to use.
    pub model: String,

    /// A list of messages comprising the conversation so far.
    pub messages: Vec<ChatMessage>,

    /// Whether to stream back partial progress.
    #[serde(default)]
    pub stream: bool,

    /// Options for streaming response (e.g. include_usage).
    pub stream_options: Option<StreamOptions>,

    /// Sampling temperature, between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Upper bound for the number of tokens that can be generated.
    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,

    /// How many chat completion choices to generate.
    pub n: Option<u32>,

    /// Up to 4 sequences where the API will stop generating tokens.
    pub stop: Option<StringOrArray>,

    /// Tool definitions the model may call.
    pub tools: Option<Vec<ChatTool>>,

    /// Controls which (if any) tool is called by the model.
    pub tool_choice: Option<ChatToolChoice>,

    /// A unique identifier representing the end-user.
    pub user: Option<String>,

    /// Additional engine-specific or unrecognized fields, preserved and
    /// forwarded to the upstream untouched.
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

impl Normalizable for ChatCompletionRequest {}

impl ChatCompletionRequest {
    pub fn is_stream(&self) -> bool {
        self.stream
    }
}

/// A string or an array of strings, used for `stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    String(String),
    Array(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

/// A single message in the conversation.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    /// Plain string or an array of content parts (text/image_url).
    pub content: Option<ChatMessageContent>,

    /// Present on assistant messages that call tools.
    pub tool_calls: Option<Vec<ChatToolCall>>,

    /// Present on tool-role messages: which call this is a result for.
    pub tool_call_id: Option<String>,

    /// Optional message author name.
    pub name: Option<String>,

    /// Non-standard reasoning/thinking text some OpenAI-compatible
    /// upstreams return alongside `content` (e.g. DeepSeek-R1 style).
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatImageUrl {
    pub url: String,
    pub detail: Option<String>,
}

/// A tool definition in OpenAI's function-calling shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatTool {
    Function { function: ChatFunctionDef },
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFunctionDef {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
}

/// Tool call emitted by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // "function"
    pub function: ChatFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    pub name: String,
    /// Stringified JSON arguments, exactly as OpenAI's wire format requires.
    pub arguments: String,
}

/// How the model should choose a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatToolChoice {
    Mode(String), // "auto" | "none" | "required"
    Named {
        #[serde(rename = "type")]
        choice_type: String,
        function: ChatNamedFunction,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNamedFunction {
    pub name: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String, // "chat.completion"
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single SSE data payload for `/v1/chat/completions` streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String, // "chat.completion.chunk"
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunkChoice {
    pub index: u32,
    pub delta: ChatChunkDelta,
    pub finish_reason: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatChunkDelta {
    pub role: Option<ChatRole>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ChatToolCallDelta>>,

    /// Non-standard reasoning/thinking delta (see [`ChatMessage::reasoning_content`]).
    pub reasoning_content: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<String>,
    pub function: Option<ChatFunctionCallDelta>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatFunctionCallDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_accepts_plain_string() {
        let m: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert!(matches!(m.content, Some(ChatMessageContent::Text(s)) if s == "hi"));
    }

    #[test]
    fn tool_choice_accepts_mode_string() {
        let tc: ChatToolChoice = serde_json::from_str("\"auto\"").unwrap();
        assert!(matches!(tc, ChatToolChoice::Mode(s) if s == "auto"));
    }

    #[test]
    fn stop_accepts_array_or_string() {
        let a: StringOrArray = serde_json::from_str(r#""foo""#).unwrap();
        assert!(matches!(a, StringOrArray::String(_)));
        let b: StringOrArray = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert!(matches!(b, StringOrArray::Array(v) if v.len() == 2));
    }

    #[test]
    fn request_preserves_unknown_fields() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"m","messages":[],"logit_bias":{"123":1.0}}"#,
        )
        .unwrap();
        assert!(req.other.contains_key("logit_bias"));
    }
}
