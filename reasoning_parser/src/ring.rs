//! Fixed-capacity rune ring and suffix-match tag scanner (component C1).
//!
//! Fed one rune at a time, the scanner performs an O(tag-length) suffix
//! match against a pre-computed set of tag rune sequences after each
//! append, giving O(1) amortised per-rune streaming tag detection instead
//! of repeated full-buffer scans.

use std::collections::VecDeque;

/// The `\b` in the ANTML tag family below is the literal two characters
/// backslash + `b`, not a backspace control character.
pub const THINK_OPEN_TAGS: &[&str] = &["<thinking>", "<think>", "<antml\\b:thinking>"];
pub const THINK_CLOSE_TAGS: &[&str] = &[
    "</thinking>",
    "</think>",
    "</antml\\b:thinking>",
    "</antml>",
];

/// A ring of the most recently seen runes, matched against a fixed set of
/// candidate tags after every push.
pub struct TagScanner {
    capacity: usize,
    ring: VecDeque<char>,
    tags: Vec<Vec<char>>,
}

impl TagScanner {
    pub fn new(tags: &[&str]) -> Self {
        let capacity = tags.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        Self {
            capacity,
            ring: VecDeque::with_capacity(capacity),
            tags: tags.iter().map(|t| t.chars().collect()).collect(),
        }
    }

    /// Longest tag of interest, in runes — the buffer capacity callers
    /// should hold back when deciding whether a trailing prefix could
    /// still grow into a match.
    pub fn max_tag_len(&self) -> usize {
        self.capacity
    }

    /// Push one rune and return the tag that now matches the ring's tail,
    /// if any.
    pub fn push(&mut self, c: char) -> Option<&str> {
        if self.capacity == 0 {
            return None;
        }
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(c);

        for (i, tag) in self.tags.iter().enumerate() {
            if tag.len() <= self.ring.len() {
                let start = self.ring.len() - tag.len();
                if self.ring.iter().skip(start).eq(tag.iter()) {
                    return Some(tag_str(&self.tags, i));
                }
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

fn tag_str(tags: &[Vec<char>], i: usize) -> &'static str {
    // Tag sets are drawn from the 'static THINK_*_TAGS lists by every
    // caller in this crate, so the index safely maps back to one of
    // those literals for identification purposes.
    let chars = &tags[i];
    match chars.iter().collect::<String>().as_str() {
        "<thinking>" => "<thinking>",
        "<think>" => "<think>",
        "<antml\\b:thinking>" => "<antml\\b:thinking>",
        "</thinking>" => "</thinking>",
        "</think>" => "</think>",
        "</antml\\b:thinking>" => "</antml\\b:thinking>",
        "</antml>" => "</antml>",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_shortest_and_longest_open_tags() {
        let mut scanner = TagScanner::new(THINK_OPEN_TAGS);
        let mut matched = None;
        for c in "<think>".chars() {
            matched = scanner.push(c);
        }
        assert_eq!(matched, Some("<think>"));
    }

    #[test]
    fn matches_antml_thinking_with_literal_backslash_b() {
        let mut scanner = TagScanner::new(THINK_OPEN_TAGS);
        let mut matched = None;
        for c in "<antml\\b:thinking>".chars() {
            matched = scanner.push(c);
        }
        assert_eq!(matched, Some("<antml\\b:thinking>"));
    }

    #[test]
    fn no_match_on_unrelated_text() {
        let mut scanner = TagScanner::new(THINK_CLOSE_TAGS);
        let mut matched = None;
        for c in "hello world".chars() {
            matched = scanner.push(c);
        }
        assert_eq!(matched, None);
    }

    #[test]
    fn max_tag_len_is_longest_candidate() {
        let scanner = TagScanner::new(THINK_CLOSE_TAGS);
        assert_eq!(scanner.max_tag_len(), "</antml\\b:thinking>".chars().count());
    }
}
