//! Short-name bijection for tool names exceeding 64 characters (spec
//! §4.8.2). Built by the client→upstream leg while converting `tools[]`,
//! carried on the per-request translator instance, and consulted by the
//! upstream→client leg to restore original names before C7/C6 ever see
//! them.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

const MAX_TOOL_NAME_LEN: usize = 64;

/// `{short -> original}` map for one request. Never shared across
/// requests — a fresh instance is created per translator.
#[derive(Debug, Default)]
pub struct ToolNameMap {
    short_to_original: HashMap<String, String>,
}

impl ToolNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `name` unchanged if it already fits; otherwise returns the
    /// shortened form and remembers the mapping back to `name`.
    pub fn shorten(&mut self, name: &str) -> String {
        if name.chars().count() <= MAX_TOOL_NAME_LEN {
            return name.to_string();
        }
        let prefix: String = name.chars().take(60).collect();
        let short = format!("{}_{}", prefix, hash4(name));
        self.short_to_original.insert(short.clone(), name.to_string());
        short
    }

    /// Restore the original name for a previously shortened one; returns
    /// `short` itself if it was never shortened (the common case).
    pub fn restore<'a>(&'a self, short: &'a str) -> &'a str {
        self.short_to_original
            .get(short)
            .map(String::as_str)
            .unwrap_or(short)
    }
}

fn hash4(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let bits = (hasher.finish() & 0xFFFF) as u16;
    format!("{:04x}", bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through_unchanged() {
        let mut map = ToolNameMap::new();
        assert_eq!(map.shorten("Bash"), "Bash");
        assert_eq!(map.restore("Bash"), "Bash");
    }

    #[test]
    fn long_names_are_shortened_and_restorable() {
        let mut map = ToolNameMap::new();
        let long_name = "a".repeat(80);
        let short = map.shorten(&long_name);
        assert!(short.len() < long_name.len());
        assert_eq!(map.restore(&short), long_name);
    }

    #[test]
    fn mcp_prefix_is_preserved_in_shortened_form() {
        let mut map = ToolNameMap::new();
        let long_name = format!("mcp__{}", "x".repeat(80));
        let short = map.shorten(&long_name);
        assert!(short.starts_with("mcp__"));
    }

    #[test]
    fn restoring_an_unshortened_name_is_a_no_op() {
        let map = ToolNameMap::new();
        assert_eq!(map.restore("never_shortened"), "never_shortened");
    }

    #[test]
    fn shortening_the_same_name_twice_is_deterministic() {
        let mut map = ToolNameMap::new();
        let long_name = "b".repeat(90);
        assert_eq!(map.shorten(&long_name), map.shorten(&long_name));
    }
}
