//! Shared stop-reason mapping (spec §3): `stop→end_turn`,
//! `length→max_tokens`, `tool_calls|function_call→tool_use`,
//! `content_filter→refusal`, anything else→`end_turn` with a warning.
//! Callers must also enforce the invariant that `tool_use` is never
//! reported unless a `tool_use` block was actually emitted.

use openai_protocol::StopReason;
use tracing::warn;

pub fn map_finish_reason(reason: Option<&str>, any_tool_use_emitted: bool) -> StopReason {
    let mapped = match reason {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("content_filter") => StopReason::Refusal,
        Some(other) => {
            warn!(reason = other, "unknown finish_reason, defaulting to end_turn");
            StopReason::EndTurn
        }
        None => StopReason::EndTurn,
    };
    downgrade_phantom_tool_use(mapped, any_tool_use_emitted)
}

/// A Codex `status` analogue of the same mapping.
pub fn map_responses_status(status: &str, any_tool_use_emitted: bool) -> StopReason {
    let mapped = match status {
        "completed" => StopReason::EndTurn,
        "incomplete" => StopReason::MaxTokens,
        other => {
            warn!(status = other, "unknown response status, defaulting to end_turn");
            StopReason::EndTurn
        }
    };
    downgrade_phantom_tool_use(mapped, any_tool_use_emitted)
}

fn downgrade_phantom_tool_use(reason: StopReason, any_tool_use_emitted: bool) -> StopReason {
    if reason == StopReason::ToolUse && !any_tool_use_emitted {
        StopReason::EndTurn
    } else {
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_reasons() {
        assert_eq!(map_finish_reason(Some("stop"), false), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some("length"), false), StopReason::MaxTokens);
        assert_eq!(map_finish_reason(Some("tool_calls"), true), StopReason::ToolUse);
        assert_eq!(map_finish_reason(Some("content_filter"), false), StopReason::Refusal);
    }

    #[test]
    fn unknown_reason_defaults_to_end_turn() {
        assert_eq!(map_finish_reason(Some("whatever"), false), StopReason::EndTurn);
    }

    #[test]
    fn tool_use_is_downgraded_when_nothing_was_emitted() {
        assert_eq!(map_finish_reason(Some("tool_calls"), false), StopReason::EndTurn);
    }

    #[test]
    fn responses_status_maps_incomplete_to_max_tokens() {
        assert_eq!(map_responses_status("incomplete", false), StopReason::MaxTokens);
    }
}
