//! Bracket-balancing and best-effort malformed-JSON repair (spec §4.5.1).
//!
//! A model frequently hands back a parameter value that is *almost*
//! JSON — a truncated field name, a missing comma between adjacent
//! objects, a bareword where a quoted string belongs. None of these are
//! worth a real recursive-descent repair; the pipeline here is a chain of
//! narrowly-targeted textual fixups, run in a fixed order, followed by a
//! single `serde_json::from_str` attempt.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MISSING_OPEN_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#",(\w+)":"#).unwrap());
static MISSING_COMMA_OBJECTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*\{").unwrap());
static MISSING_COMMA_ARRAYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\s*\[").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
static EXTRA_QUOTE_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\\",\s*"#).unwrap());
static BAREWORD_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#":\s*([A-Za-z_][A-Za-z0-9_]*)\s*([,}\]])"#).unwrap()
});

/// Single-pass bracket-balancing scanner honouring string and escape
/// context. Returns the slice of `s` ending at the point its leading
/// bracket first reaches depth zero, or the entire string if it never
/// does (unbalanced).
pub fn balance_brackets(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut started = false;
    let mut end = s.len();

    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                depth += 1;
                started = true;
            }
            '}' | ']' => {
                depth -= 1;
                if started && depth == 0 {
                    end = i + 1;
                    break;
                }
            }
            _ => {}
        }
    }
    &s[..end]
}

/// Run the malformed-JSON repair pipeline and attempt to parse the
/// result. Returns `None` if the input is still not valid JSON after
/// every fixup — callers should then fall back to treating it as a raw
/// string.
pub fn repair_and_parse(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with("[\":") {
        // Declared unrepairable per spec §4.5.1.
        return serde_json::from_str("[]").ok();
    }

    let balanced = balance_brackets(trimmed);
    let mut repaired = balanced.to_string();

    repaired = repaired.replace("\"status\":\"}\"", "\"status\":\"pending\"");
    repaired = EXTRA_QUOTE_COMMA.replace_all(&repaired, ",\"").into_owned();
    repaired = MISSING_OPEN_QUOTE
        .replace_all(&repaired, ",\"$1\":")
        .into_owned();
    // Known truncated field-name fragments, applied after the generic
    // missing-open-quote fix restores the leading `"`.
    repaired = repaired.replace("\"Form\":", "\"activeForm\":");
    repaired = MISSING_COMMA_OBJECTS.replace_all(&repaired, "},{").into_owned();
    repaired = MISSING_COMMA_ARRAYS.replace_all(&repaired, "],[").into_owned();
    repaired = quote_barewords(&repaired);
    repaired = TRAILING_COMMA.replace_all(&repaired, "$1").into_owned();
    repaired = balance_brackets(&repaired).to_string();

    serde_json::from_str(&repaired).ok()
}

/// Quote unquoted bareword values (`:pending,` → `:"pending",`), skipping
/// JSON literals (`true`, `false`, `null`) and anything already numeric.
fn quote_barewords(s: &str) -> String {
    BAREWORD_VALUE
        .replace_all(s, |caps: &regex::Captures| {
            let word = &caps[1];
            let tail = &caps[2];
            if matches!(word, "true" | "false" | "null") || word.parse::<f64>().is_ok() {
                format!(": {}{}", word, tail)
            } else {
                format!(": \"{}\"{}", word, tail)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_simple_object() {
        assert_eq!(balance_brackets(r#"{"a":1}tail"#), r#"{"a":1}"#);
    }

    #[test]
    fn balance_ignores_braces_inside_strings() {
        assert_eq!(
            balance_brackets(r#"{"a":"}{"}trailing"#),
            r#"{"a":"}{"}"#
        );
    }

    #[test]
    fn unbalanced_input_returns_whole_string() {
        assert_eq!(balance_brackets(r#"{"a":1"#), r#"{"a":1"#);
    }

    #[test]
    fn declares_bracketed_colon_prefix_unrepairable() {
        let v = repair_and_parse(r#"[":task1",Form":"working"]"#).unwrap();
        assert_eq!(v, Value::Array(vec![]));
    }

    #[test]
    fn restores_missing_opening_quote() {
        let v = repair_and_parse(r#"{"id":"1",state":"done"}"#).unwrap();
        assert_eq!(v["state"], "done");
    }

    #[test]
    fn fixes_truncated_active_form_field() {
        let v = repair_and_parse(r#"{"id":"1",Form":"working"}"#).unwrap();
        assert_eq!(v["activeForm"], "working");
    }

    #[test]
    fn inserts_comma_between_adjacent_objects() {
        let v = repair_and_parse(r#"[{"a":1}{"b":2}]"#).unwrap();
        assert_eq!(v, serde_json::json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn quotes_bareword_status_value() {
        let v = repair_and_parse(r#"{"status":pending}"#).unwrap();
        assert_eq!(v["status"], "pending");
    }

    #[test]
    fn drops_trailing_comma() {
        let v = repair_and_parse(r#"{"a":1,}"#).unwrap();
        assert_eq!(v["a"], 1);
    }
}
