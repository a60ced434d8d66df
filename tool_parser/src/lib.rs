//! Tolerant function-call XML extraction for free-form LLM output
//! (component C5) plus the malformed-JSON repair pipeline it leans on
//! (§4.5.1).

pub mod parsers;
pub mod partial_json;
pub mod types;

pub use parsers::xml::{contains_call_start, parse_function_calls};
pub use types::FunctionCall;
