//! Request rewriter (C9): injects an XML-based tool-calling contract into
//! the system prompt when the upstream has no native function-calling
//! support, so C5/C6/C7 can recover structured tool calls from free-form
//! text (spec §4.9).

use openai_protocol::{ChatMessage, ChatMessageContent, ChatRole, ChatTool, ChatToolCall};
use rand::Rng;
use serde_json::Value;

/// Per-request state the rewriter hands to the response-side parser: the
/// trigger signal that must precede the XML block, stashed on the request
/// context for the duration of the call.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub trigger_signal: String,
}

const TRIGGER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ERROR_MARKERS: &[&str] = &["error", "Error", "ERROR", "failed", "exception"];

/// Rewrites `req` in place when it carries `tools`: extracts the tool
/// definitions into a synthesized system prompt, deletes the native
/// `tools`/`tool_choice` fields, trims an under-sized `max_tokens`, and
/// preprocesses any existing tool-result turn. Returns `None` (request
/// left untouched) when there were no tools to rewrite.
pub fn force_function_calling(req: &mut openai_protocol::ChatCompletionRequest) -> Option<RewriteContext> {
    let tools = req.tools.take()?;
    if tools.is_empty() {
        return None;
    }
    req.tool_choice = None;

    let trigger_signal = generate_trigger_signal();
    let has_error = preprocess_tool_result_messages(&mut req.messages, &trigger_signal);
    let system_prompt = build_system_prompt(&tools, &trigger_signal, has_error);

    req.messages.insert(
        0,
        ChatMessage {
            role: ChatRole::System,
            content: Some(ChatMessageContent::Text(system_prompt)),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        },
    );

    if let Some(max_tokens) = req.max_tokens {
        if max_tokens < 500 {
            req.max_tokens = None;
        }
    }

    Some(RewriteContext { trigger_signal })
}

fn generate_trigger_signal() -> String {
    let mut rng = rand::rng();
    let token: String = (0..12).map(|_| TRIGGER_ALPHABET[rng.random_range(0..TRIGGER_ALPHABET.len())] as char).collect();
    format!("<Function_{}_Start/>", token)
}

/// Extracts `{name, description, properties, required}` from each tool,
/// sorted deterministically by name, then renders the single permitted
/// XML contract.
fn build_system_prompt(tools: &[ChatTool], trigger_signal: &str, has_error: bool) -> String {
    let mut entries: Vec<ToolEntry> = tools.iter().map(ToolEntry::from).collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    out.push_str("You have access to the following tools. To call one, emit exactly one trigger signal on its own line, followed immediately by a single <invoke> block:\n\n");
    out.push_str(trigger_signal);
    out.push('\n');
    out.push_str("<invoke name=\"ToolName\"><parameter name=\"param\">value</parameter></invoke>\n\n");

    for entry in &entries {
        out.push_str(&format!("## {}\n", entry.name));
        if let Some(description) = &entry.description {
            out.push_str(description);
            out.push('\n');
        }
        if !entry.properties.is_empty() {
            out.push_str("Parameters:\n");
            for name in &entry.properties {
                let required = entry.required.contains(name);
                out.push_str(&format!("- {}{}\n", name, if required { " (required)" } else { "" }));
            }
        }
        out.push('\n');
    }

    out.push_str(
        "Rules: call exactly one tool at a time; emit the trigger signal only once per call; \
         never prefix the invoke block with `<>`; never write `<invokename=` or `<parametername=` \
         (always a space before `name=`); encode arrays and objects as JSON text inside a single \
         parameter value.\n",
    );

    if has_error {
        out.push_str(
            "\nThe previous tool call's result contained an error. Review it and retry with \
             corrected arguments before proceeding.\n",
        );
    }

    out
}

struct ToolEntry {
    name: String,
    description: Option<String>,
    properties: Vec<String>,
    required: Vec<String>,
}

impl From<&ChatTool> for ToolEntry {
    fn from(tool: &ChatTool) -> Self {
        let ChatTool::Function { function } = tool;
        let mut properties = Vec::new();
        let mut required = Vec::new();
        if let Some(Value::Object(schema)) = &function.parameters {
            if let Some(Value::Object(props)) = schema.get("properties") {
                properties = props.keys().cloned().collect();
                properties.sort();
            }
            if let Some(Value::Array(req)) = schema.get("required") {
                required = req.iter().filter_map(|v| v.as_str().map(String::from)).collect();
            }
        }
        Self {
            name: function.name.clone(),
            description: function.description.clone(),
            properties,
            required,
        }
    }
}

/// Preprocesses a continuation turn that already contains tool results:
/// the previous assistant's `tool_calls` become an `<function_calls>` XML
/// echo, and each `tool`-role message becomes a user-role "Tool execution
/// result: …" string. Returns whether any result carried an error marker.
fn preprocess_tool_result_messages(messages: &mut Vec<ChatMessage>, trigger_signal: &str) -> bool {
    let mut has_error = false;
    let mut rewritten = Vec::with_capacity(messages.len());

    for message in messages.drain(..) {
        match message.role {
            ChatRole::Assistant if message.tool_calls.is_some() => {
                let calls = message.tool_calls.as_ref().unwrap();
                let echo = render_function_calls_echo(calls, trigger_signal);
                let mut text = match message.content {
                    Some(ChatMessageContent::Text(t)) => t,
                    _ => String::new(),
                };
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&echo);
                rewritten.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: Some(ChatMessageContent::Text(text)),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                    reasoning_content: None,
                });
            }
            ChatRole::Tool => {
                let result_text = match &message.content {
                    Some(ChatMessageContent::Text(t)) => t.clone(),
                    _ => String::new(),
                };
                if ERROR_MARKERS.iter().any(|m| result_text.contains(m)) {
                    has_error = true;
                }
                let wrapped = format!(
                    "Tool execution result: <tool_result>{}</tool_result>",
                    result_text
                );
                rewritten.push(ChatMessage {
                    role: ChatRole::User,
                    content: Some(ChatMessageContent::Text(wrapped)),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                    reasoning_content: None,
                });
            }
            _ => rewritten.push(message),
        }
    }

    *messages = rewritten;
    has_error
}

fn render_function_calls_echo(calls: &[ChatToolCall], trigger_signal: &str) -> String {
    let mut out = String::new();
    out.push_str(trigger_signal);
    out.push('\n');
    out.push_str("<function_calls>\n");
    for call in calls {
        out.push_str(&format!(
            "<invoke name=\"{}\">{}</invoke>\n",
            call.function.name, call.function.arguments
        ));
    }
    out.push_str("</function_calls>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use openai_protocol::{ChatCompletionRequest, ChatFunctionCall, ChatFunctionDef, StringOrArray};

    fn base_request(tools: Vec<ChatTool>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: Some(ChatMessageContent::Text("hi".to_string())),
                tool_calls: None,
                tool_call_id: None,
                name: None,
                reasoning_content: None,
            }],
            stream: false,
            stream_options: None,
            temperature: None,
            top_p: None,
            max_tokens: Some(100),
            max_completion_tokens: None,
            n: None,
            stop: None::<StringOrArray>,
            tools: Some(tools),
            tool_choice: None,
            user: None,
            other: Default::default(),
        }
    }

    fn sample_tool() -> ChatTool {
        ChatTool::Function {
            function: ChatFunctionDef {
                name: "Bash".to_string(),
                description: Some("Run a shell command".to_string()),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {"command": {"type": "string"}},
                    "required": ["command"],
                })),
            },
        }
    }

    #[test]
    fn no_tools_means_no_rewrite() {
        let mut req = base_request(vec![]);
        assert!(force_function_calling(&mut req).is_none());
    }

    #[test]
    fn rewrite_deletes_native_tools_and_prepends_system_message() {
        let mut req = base_request(vec![sample_tool()]);
        let ctx = force_function_calling(&mut req).unwrap();
        assert!(req.tools.is_none());
        assert!(req.tool_choice.is_none());
        assert!(matches!(req.messages[0].role, ChatRole::System));
        if let Some(ChatMessageContent::Text(text)) = &req.messages[0].content {
            assert!(text.contains(&ctx.trigger_signal));
            assert!(text.contains("Bash"));
        } else {
            panic!("expected text content");
        }
    }

    #[test]
    fn trigger_signal_matches_expected_shape() {
        let mut req = base_request(vec![sample_tool()]);
        let ctx = force_function_calling(&mut req).unwrap();
        assert!(ctx.trigger_signal.starts_with("<Function_"));
        assert!(ctx.trigger_signal.ends_with("_Start/>"));
    }

    #[test]
    fn small_max_tokens_is_removed_to_avoid_xml_truncation() {
        let mut req = base_request(vec![sample_tool()]);
        req.max_tokens = Some(200);
        force_function_calling(&mut req);
        assert_eq!(req.max_tokens, None);
    }

    #[test]
    fn large_max_tokens_is_preserved() {
        let mut req = base_request(vec![sample_tool()]);
        req.max_tokens = Some(4000);
        force_function_calling(&mut req);
        assert_eq!(req.max_tokens, Some(4000));
    }

    #[test]
    fn tool_result_turn_is_rewritten_to_user_text() {
        let mut req = base_request(vec![sample_tool()]);
        req.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: Some(vec![ChatToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: ChatFunctionCall {
                    name: "Bash".to_string(),
                    arguments: "{\"command\":\"ls\"}".to_string(),
                },
            }]),
            tool_call_id: None,
            name: None,
            reasoning_content: None,
        });
        req.messages.push(ChatMessage {
            role: ChatRole::Tool,
            content: Some(ChatMessageContent::Text("Error: command not found".to_string())),
            tool_calls: None,
            tool_call_id: Some("call_1".to_string()),
            name: None,
            reasoning_content: None,
        });
        force_function_calling(&mut req);
        assert!(req.messages.iter().all(|m| !matches!(m.role, ChatRole::Tool)));
        let system_text = match &req.messages[0].content {
            Some(ChatMessageContent::Text(t)) => t,
            _ => panic!("expected system text"),
        };
        assert!(system_text.contains("retry"));
    }
}
