//! Tolerant function-call XML parser (component C5, spec §4.5).
//!
//! Per-dialect `ParseState` + buffer shape, generalised from a pipe-tag
//! single-dialect parser to the several XML dialects a model actually
//! produces when asked to emit `<invoke>` blocks: a small dispatch table
//! of dialects, tried in order, the first non-empty result wins. Argument
//! parsing always runs on the finalised, fully-accumulated text — there
//! is no dialect that needs to see a partial parameter value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::partial_json;
use crate::types::{wrap_scalar, FunctionCall};

const RESERVED_PARAM_TAGS: &[&str] = &["name", "parameters", "invocation", "invoke", "tool", "args"];

static FLAT_INVOKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<invoke\s+name="([^"]*)"\s*>(.*?)</invoke>"#).unwrap());
static PARAMETER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<parameter\s+name="([^"]*)"\s*>(.*?)</parameter>"#).unwrap());
static MALFORMED_INVOKE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<><invokename="([^"]*)">"#).unwrap());
static MALFORMED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<parametername="([^"]*)">([^\n]*)"#).unwrap());
static FUNCTION_CALL_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function_call>(.*?)</function_call>").unwrap());
static INVOCATION_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<(?:invocation|invoke)(?:\s+name="([^"]*)")?\s*>(.*?)</(?:invocation|invoke)>"#)
        .unwrap()
});
static NAME_CHILD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<name>([^<]*)</name>").unwrap());
static PARAMETERS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<parameters>(.*?)</parameters>").unwrap());
static ARGS_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<args>(.*?)</args>").unwrap());
static MCP_TOOL_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<tool_call\s+name="([^"]*)"\s*>(.*?)</tool_call>"#).unwrap());
static GENERIC_OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([a-zA-Z_][\w]*)>").unwrap());
static SINGLE_UNCLOSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*<([a-zA-Z_][\w]*)>(.*)$").unwrap());
static HYBRID_SALVAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{?"([^"]+)"\s*:\s*"([^"]*)</([^>]+)>"#).unwrap());
static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think(?:ing)?>(.*?)</think(?:ing)?>").unwrap());
static BARE_TOOL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function_call>\s*<tool>([^<]*)</tool>(.*?)</function_call>").unwrap());

/// Extract, in priority order, the function calls present in `text`.
/// `trigger` (when present) anchors the scan at its first occurrence;
/// otherwise the scan anchors at the first `<function_calls>`.
pub fn parse_function_calls(text: &str, trigger: Option<&str>) -> Vec<FunctionCall> {
    let cleaned = strip_thinking_preserve_calls(text);
    let anchored = anchor(&cleaned, trigger);

    if let Some((start, end)) = extract_innermost_function_calls(anchored) {
        let inner = &anchored[start..end];
        let calls = parse_flat_invokes(inner);
        if !calls.is_empty() {
            return calls;
        }
        let calls = parse_mcp_tool_calls(inner);
        if !calls.is_empty() {
            return calls;
        }
        let calls = parse_bare_tool_name(inner);
        if !calls.is_empty() {
            return calls;
        }
    }

    let attempts: [fn(&str) -> Vec<FunctionCall>; 5] = [
        parse_flat_invokes,
        parse_malformed_invokes,
        parse_traditional,
        parse_mcp_tool_calls,
        parse_loose_invocation,
    ];
    for attempt in attempts {
        let calls = attempt(anchored);
        if !calls.is_empty() {
            return calls;
        }
    }
    Vec::new()
}

/// Whether `buffer` has seen enough of a function-call opener that the
/// streaming handler should flush its text aggregator before the next
/// delta — used only as a cheap incremental signal; full argument parsing
/// still always runs on the finalised buffer (spec §4.5.2).
pub fn contains_call_start(buffer: &str) -> bool {
    buffer.contains("<function_calls>")
        || buffer.contains("<invoke")
        || buffer.contains("<><invokename")
        || buffer.contains("<tool_call")
        || buffer.contains("<function_call>")
        || buffer.contains("<invocation")
}

/// Step 1: strip `<think>`/`<thinking>` blocks, but when one contains a
/// `<function_calls>…</function_calls>` block, splice that block back in
/// place of the stripped thinking tag so later anchoring still finds it.
fn strip_thinking_preserve_calls(text: &str) -> String {
    THINK_BLOCK
        .replace_all(text, |caps: &regex::Captures| {
            let inner = &caps[1];
            match extract_innermost_function_calls(inner) {
                Some((start, end)) => {
                    format!("<function_calls>{}</function_calls>", &inner[start..end])
                }
                None => String::new(),
            }
        })
        .into_owned()
}

/// Step 2: anchor near the trigger signal (first occurrence) if present,
/// otherwise near the first `<function_calls>`.
fn anchor<'a>(text: &'a str, trigger: Option<&str>) -> &'a str {
    if let Some(t) = trigger {
        if !t.is_empty() {
            if let Some(pos) = text.find(t) {
                return &text[pos + t.len()..];
            }
        }
    }
    if let Some(pos) = text.find("<function_calls>") {
        return &text[pos..];
    }
    text
}

/// Locate the innermost complete `<function_calls>…</function_calls>`
/// block, tolerating doubled/nested wrappers (dialect c): the first close
/// tag encountered closes the most recently opened block.
fn extract_innermost_function_calls(text: &str) -> Option<(usize, usize)> {
    const OPEN: &str = "<function_calls>";
    const CLOSE: &str = "</function_calls>";
    let mut events: Vec<(usize, bool)> = text
        .match_indices(OPEN)
        .map(|(p, _)| (p, true))
        .chain(text.match_indices(CLOSE).map(|(p, _)| (p, false)))
        .collect();
    events.sort_by_key(|&(pos, _)| pos);

    let mut stack = Vec::new();
    for (pos, is_open) in events {
        if is_open {
            stack.push(pos + OPEN.len());
        } else if let Some(start) = stack.pop() {
            return Some((start, pos));
        }
    }
    None
}

/// Dialect (a): `<invoke name="…">…<parameter name="…">v</parameter>…</invoke>`.
fn parse_flat_invokes(text: &str) -> Vec<FunctionCall> {
    FLAT_INVOKE
        .captures_iter(text)
        .map(|caps| FunctionCall::new(caps[1].to_string(), extract_parameters(&caps[2])))
        .collect()
}

/// Dialect (b): `<><invokename="…"><parametername="…">value`, no space
/// before `name=`, usually no closing tags.
fn parse_malformed_invokes(text: &str) -> Vec<FunctionCall> {
    let starts: Vec<_> = MALFORMED_INVOKE_START.captures_iter(text).collect();
    let mut calls = Vec::with_capacity(starts.len());
    for (i, caps) in starts.iter().enumerate() {
        let name = caps[1].to_string();
        let whole = caps.get(0).unwrap();
        let segment_start = whole.end();
        let segment_end = starts
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(text.len());
        let segment = &text[segment_start..segment_end];

        let mut args = Map::new();
        for (j, pcaps) in MALFORMED_PARAM.captures_iter(segment).enumerate() {
            let key = pcaps[1].to_string();
            let raw_value = pcaps[2].trim();
            args.insert(key, value_from_fragment(raw_value));
            let _ = j;
        }
        calls.push(FunctionCall::new(name, args));
    }
    calls
}

/// Dialect (d): `<function_call>` containing `<invocation|invoke name="…">`
/// (name may be a child `<name>` tag), parameters inside `<parameters>`
/// or `<args>`.
fn parse_traditional(text: &str) -> Vec<FunctionCall> {
    let blocks: Vec<&str> = FUNCTION_CALL_BLOCK
        .captures_iter(text)
        .map(|c| c.get(1).unwrap().as_str())
        .collect();
    let scan_targets: Vec<&str> = if blocks.is_empty() { vec![text] } else { blocks };

    let mut calls = Vec::new();
    for block in scan_targets {
        for caps in INVOCATION_TAG.captures_iter(block) {
            let name = match caps.get(1) {
                Some(m) if !m.as_str().is_empty() => m.as_str().to_string(),
                _ => match NAME_CHILD.captures(&caps[2]) {
                    Some(nc) => nc[1].trim().to_string(),
                    None => continue,
                },
            };
            let inner = &caps[2];
            let params_block = PARAMETERS_BLOCK
                .captures(inner)
                .or_else(|| ARGS_BLOCK.captures(inner))
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| inner.to_string());
            calls.push(FunctionCall::new(name, extract_parameters(&params_block)));
        }
    }
    calls
}

/// Dialect (e): `<tool_call name="…">…</tool_call>` directly under
/// `<function_calls>` (or standalone).
fn parse_mcp_tool_calls(text: &str) -> Vec<FunctionCall> {
    MCP_TOOL_CALL
        .captures_iter(text)
        .map(|caps| FunctionCall::new(caps[1].to_string(), extract_parameters(&caps[2])))
        .collect()
}

/// Degenerate `<function_call><tool>X</tool>…</function_call>` shorthand
/// seen when a nested/doubled block (dialect c) has no invocation wrapper
/// at all — the bare `<tool>` child tag names the call directly.
fn parse_bare_tool_name(text: &str) -> Vec<FunctionCall> {
    BARE_TOOL_NAME
        .captures_iter(text)
        .map(|caps| FunctionCall::new(caps[1].to_string(), extract_parameters(&caps[2])))
        .collect()
}

/// Dialect (f): a bare `<invocation>` with no `<function_call>` wrapper.
fn parse_loose_invocation(text: &str) -> Vec<FunctionCall> {
    INVOCATION_TAG
        .captures_iter(text)
        .filter_map(|caps| {
            let name = match caps.get(1) {
                Some(m) if !m.as_str().is_empty() => m.as_str().to_string(),
                _ => NAME_CHILD.captures(&caps[2])?[1].trim().to_string(),
            };
            Some(FunctionCall::new(name, extract_parameters(&caps[2])))
        })
        .collect()
}

/// `extractParameters`: first `<parameter name="k">v</parameter>`; else
/// generic `<k>v</k>` (skipping reserved tags); else a single unclosed
/// `<tag>value`; else a hybrid JSON/XML salvage. A whole block that is
/// itself valid JSON short-circuits everything.
fn extract_parameters(block: &str) -> Map<String, Value> {
    let trimmed = block.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return wrap_scalar(v);
    }

    let tagged: Vec<_> = PARAMETER_TAG.captures_iter(block).collect();
    if !tagged.is_empty() {
        let mut map = Map::new();
        for caps in tagged {
            map.insert(caps[1].to_string(), value_from_fragment(caps[2].trim()));
        }
        return map;
    }

    let generic = extract_generic_children(block);
    if !generic.is_empty() {
        let mut map = Map::new();
        for (tag, content) in generic {
            map.insert(tag, value_from_fragment(content.trim()));
        }
        return map;
    }

    if let Some(caps) = SINGLE_UNCLOSED.captures(block) {
        let mut map = Map::new();
        map.insert(caps[1].to_string(), value_from_fragment(caps[2].trim()));
        return map;
    }

    if let Some(caps) = HYBRID_SALVAGE.captures(block) {
        let mut map = Map::new();
        map.insert(caps[1].to_string(), Value::String(caps[2].to_string()));
        return map;
    }

    Map::new()
}

/// Generic `<k>v</k>` children, skipping the reserved tag list. The
/// `regex` crate has no backreference support, so matching close tags are
/// found by literal string search rather than a `</\1>` pattern.
fn extract_generic_children(block: &str) -> Vec<(String, String)> {
    let mut results = Vec::new();
    let mut pos = 0;
    while let Some(m) = GENERIC_OPEN_TAG.find_at(block, pos) {
        let tag = GENERIC_OPEN_TAG
            .captures(&block[m.start()..m.end()])
            .unwrap()[1]
            .to_string();
        let content_start = m.end();
        let close_tag = format!("</{}>", tag);
        match block[content_start..].find(close_tag.as_str()) {
            Some(rel) => {
                let content_end = content_start + rel;
                if !RESERVED_PARAM_TAGS.contains(&tag.as_str()) {
                    results.push((tag, block[content_start..content_end].to_string()));
                }
                pos = content_end + close_tag.len();
            }
            None => pos = content_start,
        }
    }
    results
}

/// A raw parameter fragment is JSON-parsed if it looks like JSON
/// (bracket-balanced and repaired per §4.5.1 on failure), otherwise kept
/// as a plain string.
fn value_from_fragment(raw: &str) -> Value {
    let trimmed = raw.trim();
    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !looks_like_json {
        return Value::String(trimmed.to_string());
    }
    if let Ok(v) = serde_json::from_str(trimmed) {
        return v;
    }
    match partial_json::repair_and_parse(trimmed) {
        Some(v) => v,
        None => Value::String(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_invoke() {
        let text = r#"text_before <TRIG/> <invoke name="Bash"><parameter name="command">ls -la</parameter></invoke>"#;
        let calls = parse_function_calls(text, Some("<TRIG/>"));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "Bash");
        assert_eq!(calls[0].args["command"], "ls -la");
    }

    #[test]
    fn parses_nested_function_calls_innermost_only() {
        let text = "<function_calls><function_calls><function_call><tool>X</tool></function_call></function_calls></function_calls>";
        let calls = parse_function_calls(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "X");
    }

    #[test]
    fn parses_malformed_invoke_with_json_array_value() {
        let text = r#"<><invokename="TodoWrite"><parametername="todos">[{"content":"a","status":"pending"}]"#;
        let calls = parse_function_calls(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "TodoWrite");
        assert!(calls[0].args["todos"].is_array());
    }

    #[test]
    fn parses_mcp_tool_call() {
        let text = r#"<function_calls><tool_call name="search"><query>rust</query></tool_call></function_calls>"#;
        let calls = parse_function_calls(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].args["query"], "rust");
    }

    #[test]
    fn parses_traditional_function_call_with_name_child() {
        let text = r#"<function_call><invocation><name>Read</name><parameters><file_path>/a.txt</file_path></parameters></invocation></function_call>"#;
        let calls = parse_function_calls(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "Read");
        assert_eq!(calls[0].args["file_path"], "/a.txt");
    }

    #[test]
    fn preserves_function_calls_found_inside_thinking_block() {
        let text = "<thinking>let me call it <function_calls><invoke name=\"Bash\"><parameter name=\"command\">ls</parameter></invoke></function_calls></thinking>";
        let calls = parse_function_calls(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "Bash");
    }

    #[test]
    fn no_call_present_returns_empty() {
        assert!(parse_function_calls("just plain text", None).is_empty());
    }

    #[test]
    fn detects_call_start_for_streaming_flush() {
        assert!(contains_call_start("some text <invoke"));
        assert!(!contains_call_start("some text"));
    }
}
