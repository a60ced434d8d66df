//! Content sanitizer (C6): strips every trace of tool-call machinery from
//! visible text so end-users see natural language only. Idempotent,
//! O(n) with precompiled patterns (spec §4.6).

use once_cell::sync::Lazy;
use regex::Regex;

/// Two cleanup profiles: `ArtifactsOnly` strips trigger signals and
/// obviously malformed fragments (native tool-calling upstream);
/// `Full` strips all tool-call XML (the gateway synthesised the contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    ArtifactsOnly,
    Full,
}

const MAX_ITERATIONS: usize = 10;

static FUNCTION_CALLS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function_calls>.*?</function_calls>").unwrap());
static FUNCTION_CALL_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function_call>.*?</function_call>").unwrap());
static INVOKE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<invoke\s+name="[^"]*">.*?</invoke>"#).unwrap());
static INVOCATION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<invocation[^>]*>.*?</invocation>").unwrap());
static TOOL_CALL_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<tool_call\s+name="[^"]*">.*?</tool_call>"#).unwrap());

static TRIGGER_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Function_[A-Za-z0-9]+_Start/>").unwrap());
static CALL_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<CALL_[A-Za-z0-9]{4,16}>>").unwrap());

static MALFORMED_CHAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<><invokename="[^"]*">(<parametername="[^"]*">[^<]*)*"#).unwrap()
});
static MALFORMED_PARAM_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<><parametername="[^"]*">"#).unwrap());
static STANDALONE_EMPTY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*<>[ \t]*$").unwrap());

static UNCLOSED_INVOKE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<invoke\s+name="[^"]*">"#).unwrap());
static UNCLOSED_PARAMETER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<parameter\s+name="[^"]*">"#).unwrap());

static ORPHANED_JSON_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*(?:[\[{]|"(?:todos|command|file_path|old_string|new_string|content)"\s*:).*$"#)
        .unwrap()
});

static TRAILING_LINE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static MULTIPLE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn strip_unclosed_tags(text: &str) -> String {
    let mut out = text.to_string();
    if INVOKE_BLOCK.find_iter(&out).next().is_none() {
        out = UNCLOSED_INVOKE_OPEN.replace_all(&out, "").into_owned();
    }
    if !out.contains("</parameter>") {
        out = UNCLOSED_PARAMETER_OPEN.replace_all(&out, "").into_owned();
    }
    out
}

fn strip_full_pass(text: &str) -> String {
    let mut out = text.to_string();
    out = FUNCTION_CALLS_BLOCK.replace_all(&out, "").into_owned();
    out = FUNCTION_CALL_BLOCK.replace_all(&out, "").into_owned();
    out = INVOKE_BLOCK.replace_all(&out, "").into_owned();
    out = INVOCATION_BLOCK.replace_all(&out, "").into_owned();
    out = TOOL_CALL_BLOCK.replace_all(&out, "").into_owned();
    out = MALFORMED_CHAIN.replace_all(&out, "").into_owned();
    out = MALFORMED_PARAM_PREFIX.replace_all(&out, "").into_owned();
    out = STANDALONE_EMPTY_TAG.replace_all(&out, "").into_owned();
    out = ORPHANED_JSON_LINE.replace_all(&out, "").into_owned();
    strip_unclosed_tags(&out)
}

fn strip_artifacts_pass(text: &str) -> String {
    let mut out = text.to_string();
    out = TRIGGER_SIGNAL.replace_all(&out, "").into_owned();
    out = CALL_SIGNAL.replace_all(&out, "").into_owned();
    out = MALFORMED_CHAIN.replace_all(&out, "").into_owned();
    out = MALFORMED_PARAM_PREFIX.replace_all(&out, "").into_owned();
    out = STANDALONE_EMPTY_TAG.replace_all(&out, "").into_owned();
    out
}

fn finish(text: &str) -> String {
    let out = TRAILING_LINE_WHITESPACE.replace_all(text, "").into_owned();
    MULTIPLE_BLANK_LINES.replace_all(&out, "\n\n").into_owned()
}

/// Remove every trace of tool-call machinery from visible text. Iterated
/// up to [`MAX_ITERATIONS`] times so chained artifacts on the same line
/// are fully cleaned; stops early once a pass is a no-op, which also
/// makes the overall operation idempotent.
pub fn sanitize(text: &str, mode: CleanupMode) -> String {
    let mut out = text.to_string();
    for _ in 0..MAX_ITERATIONS {
        let next = match mode {
            CleanupMode::Full => strip_full_pass(&out),
            CleanupMode::ArtifactsOnly => strip_artifacts_pass(&out),
        };
        if next == out {
            break;
        }
        out = next;
    }
    finish(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_full_function_calls_block() {
        let input = "Here you go.\n<function_calls><invoke name=\"Bash\"><parameter name=\"command\">ls</parameter></invoke></function_calls>\nDone.";
        let out = sanitize(input, CleanupMode::Full);
        assert!(!out.contains("function_calls"));
        assert!(out.contains("Here you go."));
        assert!(out.contains("Done."));
    }

    #[test]
    fn strips_trigger_signal_in_artifacts_only_mode() {
        let input = "intro <Function_abc123_Start/> more text";
        let out = sanitize(input, CleanupMode::ArtifactsOnly);
        assert!(!out.contains("Function_abc123_Start"));
        assert!(out.contains("intro"));
        assert!(out.contains("more text"));
    }

    #[test]
    fn artifacts_only_mode_leaves_well_formed_invoke_blocks() {
        let input = "native call: <invoke name=\"Bash\"><parameter name=\"command\">ls</parameter></invoke>";
        let out = sanitize(input, CleanupMode::ArtifactsOnly);
        assert!(out.contains("<invoke"));
    }

    #[test]
    fn removes_orphaned_json_line() {
        let input = "Sure thing.\n  \"todos\": [\"a\", \"b\"],\nDone.";
        let out = sanitize(input, CleanupMode::Full);
        assert!(!out.contains("\"todos\""));
    }

    #[test]
    fn idempotent_on_already_clean_text() {
        let input = "Just a normal response with no tool calls at all.";
        assert_eq!(sanitize(input, CleanupMode::Full), input);
    }

    #[test]
    fn sanitize_is_idempotent_under_repeated_application() {
        let input = "<function_calls><invoke name=\"X\"><parameter name=\"a\">1</parameter></invoke></function_calls> trailing   \n\n\n\nmore";
        let once = sanitize(input, CleanupMode::Full);
        let twice = sanitize(&once, CleanupMode::Full);
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_blank_line_runs_and_trims_trailing_whitespace() {
        let input = "line one   \n\n\n\nline two";
        let out = sanitize(input, CleanupMode::Full);
        assert_eq!(out, "line one\n\nline two");
    }

    #[test]
    fn strips_unclosed_invoke_when_no_close_anywhere() {
        let input = "partial: <invoke name=\"Bash\"> and the text stops";
        let out = sanitize(input, CleanupMode::Full);
        assert!(!out.contains("<invoke"));
    }
}
