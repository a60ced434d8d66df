//! Wire-format types for the three protocols this gateway translates
//! between: Claude's Messages API, OpenAI's Chat Completions API, and
//! OpenAI's Responses ("Codex") API.
//!
//! This crate holds only data definitions and request validation; the
//! translation logic itself lives in the `gateway` crate's `translate`
//! module.

pub mod codex;
pub mod completion;
pub mod messages;
pub mod model_type;
pub mod validated;

pub use codex::*;
pub use completion::*;
pub use messages::*;
pub use model_type::{Endpoint, ModelType};
