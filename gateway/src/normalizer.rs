//! Argument normaliser (C7): schema-sensitive repair of tool arguments
//! applied after parsing and before emitting a `tool_use` block (spec
//! §4.7). Returns `None` only when the call should be skipped entirely
//! (a malformed `TodoWrite` with no derivable list) — every other
//! repair coerces rather than rejects.

use serde_json::{Map, Value};

const CONTENT_HEAVY_FIELDS: &[&str] = &["content", "command", "script", "code"];

/// Apply the generic then per-tool-specific repair rules. `tool_name` is
/// matched case-sensitively against the names in spec §4.7; any other
/// tool only receives the generic repair.
pub fn normalize_arguments(tool_name: &str, args: Map<String, Value>) -> Option<Map<String, Value>> {
    let mut args = generic_repair(args);

    match tool_name {
        "TodoWrite" => normalize_todo_write(args),
        "AskUserQuestion" => {
            normalize_ask_user_question(&mut args);
            Some(args)
        }
        "list_dir" => {
            args.entry("recursive").or_insert(Value::Bool(false));
            Some(args)
        }
        "WebSearch" => {
            coerce_to_string_array(&mut args, "allowed_domains");
            coerce_to_string_array(&mut args, "blocked_domains");
            Some(args)
        }
        "Edit" => {
            unescape_newlines(&mut args, "old_string");
            unescape_newlines(&mut args, "new_string");
            Some(args)
        }
        _ => Some(args),
    }
}

/// String arguments that look like JSON are JSON-parsed; double-escaped
/// `\n` in content-heavy fields becomes a real newline.
fn generic_repair(mut args: Map<String, Value>) -> Map<String, Value> {
    let keys: Vec<String> = args.keys().cloned().collect();
    for key in keys {
        if let Some(Value::String(s)) = args.get(&key) {
            if looks_like_json(s) {
                if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                    args.insert(key.clone(), parsed);
                    continue;
                }
            }
        }
        if CONTENT_HEAVY_FIELDS.contains(&key.as_str()) {
            unescape_newlines(&mut args, &key);
        }
    }
    args
}

fn looks_like_json(s: &str) -> bool {
    let t = s.trim();
    (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'))
}

fn unescape_newlines(args: &mut Map<String, Value>, field: &str) {
    if let Some(Value::String(s)) = args.get(field) {
        if s.contains("\\n") {
            let fixed = s.replace("\\n", "\n");
            args.insert(field.to_string(), Value::String(fixed));
        }
    }
}

fn coerce_to_string_array(args: &mut Map<String, Value>, field: &str) {
    let Some(value) = args.get(field).cloned() else {
        return;
    };
    let coerced = match value {
        Value::Array(_) => return,
        Value::String(s) => Value::Array(vec![Value::String(s)]),
        Value::Null => Value::Array(vec![]),
        other => Value::Array(vec![other]),
    };
    args.insert(field.to_string(), coerced);
}

fn normalize_todo_write(mut args: Map<String, Value>) -> Option<Map<String, Value>> {
    let raw_list = extract_todo_list(&mut args)?;
    if raw_list.is_empty() {
        return None;
    }

    let mut todos = Vec::with_capacity(raw_list.len());
    for (i, item) in raw_list.into_iter().enumerate() {
        todos.push(normalize_todo_item(item, i));
    }

    let mut out = Map::new();
    out.insert("todos".to_string(), Value::Array(todos));
    Some(out)
}

/// Find the todo list under `todos`, the `value` alias, or the first
/// array found inside a nested map.
fn extract_todo_list(args: &mut Map<String, Value>) -> Option<Vec<Value>> {
    if let Some(Value::Array(list)) = args.remove("todos") {
        return Some(list);
    }
    if let Some(Value::Array(list)) = args.remove("value") {
        return Some(list);
    }
    for value in args.values() {
        if let Value::Array(list) = value {
            return Some(list.clone());
        }
        if let Value::Object(nested) = value {
            for nested_value in nested.values() {
                if let Value::Array(list) = nested_value {
                    return Some(list.clone());
                }
            }
        }
    }
    None
}

fn normalize_todo_item(item: Value, index: usize) -> Value {
    let mut obj = match item {
        Value::Object(o) => o,
        Value::String(s) => {
            let mut o = Map::new();
            o.insert("content".to_string(), Value::String(s));
            o
        }
        other => {
            let mut o = Map::new();
            o.insert("content".to_string(), other);
            o
        }
    };

    obj.entry("id")
        .or_insert_with(|| Value::String(format!("task-{}", index)));

    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    obj.entry("activeForm")
        .or_insert_with(|| Value::String(content));

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| matches!(*s, "pending" | "in_progress" | "completed"))
        .unwrap_or("pending")
        .to_string();
    obj.insert("status".to_string(), Value::String(status));

    let priority = obj
        .get("priority")
        .and_then(Value::as_str)
        .filter(|s| matches!(*s, "high" | "medium" | "low"))
        .unwrap_or("medium")
        .to_string();
    obj.insert("priority".to_string(), Value::String(priority));

    Value::Object(obj)
}

fn normalize_ask_user_question(args: &mut Map<String, Value>) {
    if let Some(value) = args.get("questions").cloned() {
        if !matches!(value, Value::Array(_)) {
            args.insert("questions".to_string(), Value::Array(vec![value]));
        }
    }

    match args.get("answers").cloned() {
        Some(Value::String(s)) => {
            if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(&s) {
                args.insert("answers".to_string(), parsed);
            }
        }
        Some(Value::Object(_)) | None => {}
        Some(other) => {
            args.insert("answers".to_string(), other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn todo_write_fills_defaults_for_minimal_items() {
        let args = map(json!({"todos": [{"content": "do thing"}]}));
        let out = normalize_arguments("TodoWrite", args).unwrap();
        let todos = out["todos"].as_array().unwrap();
        assert_eq!(todos[0]["status"], "pending");
        assert_eq!(todos[0]["priority"], "medium");
        assert_eq!(todos[0]["id"], "task-0");
        assert_eq!(todos[0]["activeForm"], "do thing");
    }

    #[test]
    fn todo_write_accepts_value_alias() {
        let args = map(json!({"value": ["a", "b"]}));
        let out = normalize_arguments("TodoWrite", args).unwrap();
        assert_eq!(out["todos"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn todo_write_skips_call_when_no_list_derivable() {
        let args = map(json!({"notes": "no list here"}));
        assert!(normalize_arguments("TodoWrite", args).is_none());
    }

    #[test]
    fn todo_write_skips_call_on_empty_list() {
        let args = map(json!({"todos": []}));
        assert!(normalize_arguments("TodoWrite", args).is_none());
    }

    #[test]
    fn web_search_coerces_single_string_domain_to_array() {
        let args = map(json!({"allowed_domains": "example.com"}));
        let out = normalize_arguments("WebSearch", args).unwrap();
        assert_eq!(out["allowed_domains"], json!(["example.com"]));
    }

    #[test]
    fn list_dir_injects_recursive_false_when_missing() {
        let args = map(json!({"path": "/tmp"}));
        let out = normalize_arguments("list_dir", args).unwrap();
        assert_eq!(out["recursive"], json!(false));
    }

    #[test]
    fn edit_unescapes_double_escaped_newlines() {
        let args = map(json!({"old_string": "a\\nb", "new_string": "c\\nd"}));
        let out = normalize_arguments("Edit", args).unwrap();
        assert_eq!(out["old_string"], "a\nb");
        assert_eq!(out["new_string"], "c\nd");
    }

    #[test]
    fn generic_repair_parses_json_looking_string_value() {
        let args = map(json!({"payload": "{\"x\":1}"}));
        let out = normalize_arguments("AnyTool", args).unwrap();
        assert_eq!(out["payload"], json!({"x": 1}));
    }

    #[test]
    fn ask_user_question_coerces_scalar_questions_to_array() {
        let args = map(json!({"questions": "only one?"}));
        let out = normalize_arguments("AskUserQuestion", args).unwrap();
        assert_eq!(out["questions"], json!(["only one?"]));
    }
}
