//! The protocol-neutral shape a parsed function call is handed back in.

use serde_json::{Map, Value};

/// One tool invocation extracted from free-form model text.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Wrap a bare JSON scalar/array as `{"value": ...}` so the return shape
/// of a parameter block is always a mapping.
pub fn wrap_scalar(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("value".to_string(), other);
            m
        }
    }
}
