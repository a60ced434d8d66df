//! Message/tool translator (C8): bidirectional, purely structural
//! conversion between Claude Messages, OpenAI Chat Completions, and
//! OpenAI Responses ("Codex"), plus the shared short-name bijection,
//! stop-reason mapping, and cross-OS path repair that both legs use.

pub mod codex;
pub mod openai;
pub mod paths;
pub mod short_names;
pub mod stop_reason;

pub use short_names::ToolNameMap;
