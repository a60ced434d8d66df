//! Process-level configuration: `clap` (`derive`, `env`) CLI/config struct,
//! plus the memoised `TOKEN_MULTIPLIER` (spec §4.13).

use std::time::Duration;

use clap::Parser;
use once_cell::sync::Lazy;
use tracing::warn;

/// Command-line / environment configuration for the gateway process.
#[derive(Debug, Clone, Parser)]
#[command(name = "smg-gateway", version, about = "LLM protocol translation gateway")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "SMG_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// Base URL of the single configured upstream.
    #[arg(long, env = "SMG_UPSTREAM_URL", default_value = "http://127.0.0.1:11434")]
    pub upstream_url: String,

    /// Per-request upstream timeout, in seconds.
    #[arg(long, env = "SMG_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Whether the upstream is force-function-calling (no native tool support).
    #[arg(long, env = "SMG_FORCE_FUNCTION_CALLING", default_value_t = false)]
    pub force_function_calling: bool,

    /// Wire protocol the configured upstream actually speaks, for requests
    /// that arrive on the Claude-native `/v1/messages` endpoint and need
    /// translating before they can be forwarded.
    #[arg(long, env = "SMG_UPSTREAM_PROTOCOL", default_value = "openai")]
    pub upstream_protocol: UpstreamProtocol,

    /// Whether to rewrite Windows-style drive-letter paths in `reasoning`/
    /// `text` output to forward-slash form (spec §4.8.1). Only a client
    /// known to run a Unix-path-expecting IDE integration wants this, so
    /// it is off unless the operator opts in.
    #[arg(long, env = "SMG_REPAIR_WINDOWS_PATHS", default_value_t = false)]
    pub repair_windows_paths: bool,

    /// Log filter directives, passed to `tracing_subscriber::EnvFilter`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which wire format the single configured upstream expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum UpstreamProtocol {
    /// OpenAI Chat Completions (`/v1/chat/completions`).
    Openai,
    /// OpenAI Responses / Codex (`/v1/responses`).
    Codex,
}

/// `TOKEN_MULTIPLIER` — a positive decimal (`"1.5"`) or percent (`"150%"`)
/// applied to emitted `output_tokens`. Read once per process per the
/// Design Note's "prefer once-at-init" guidance; any parse failure,
/// non-finite, or non-positive value falls back to `1.0` with a single
/// `warn` log, never surfaced to a client.
pub static TOKEN_MULTIPLIER: Lazy<f64> = Lazy::new(|| {
    let raw = match std::env::var("TOKEN_MULTIPLIER") {
        Ok(v) => v,
        Err(_) => return 1.0,
    };
    match parse_multiplier(&raw) {
        Some(m) => m,
        None => {
            warn!(value = %raw, "invalid TOKEN_MULTIPLIER, falling back to 1.0");
            1.0
        }
    }
});

fn parse_multiplier(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let value = if let Some(pct) = trimmed.strip_suffix('%') {
        pct.trim().parse::<f64>().ok()? / 100.0
    } else {
        trimmed.parse::<f64>().ok()?
    };
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_decimal() {
        assert_eq!(parse_multiplier("1.5"), Some(1.5));
    }

    #[test]
    fn parses_percent_suffix() {
        assert_eq!(parse_multiplier("150%"), Some(1.5));
    }

    #[test]
    fn rejects_non_positive() {
        assert_eq!(parse_multiplier("0"), None);
        assert_eq!(parse_multiplier("-1.5"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_multiplier("banana"), None);
        assert_eq!(parse_multiplier("NaN"), None);
    }
}
