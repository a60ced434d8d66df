//! Multi-tag-family thinking/text splitter (component C2).
//!
//! [`ThinkingSplitter`] watches several tag families at once through a
//! single [`TagScanner`] per direction — a client may hit `<thinking>`,
//! `<think>`, or `<antml\b:thinking>` depending on which upstream actually
//! served the request, and the gateway doesn't know which in advance.

use crate::ring::{TagScanner, THINK_CLOSE_TAGS, THINK_OPEN_TAGS};

/// One unit of progress from [`ThinkingSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThinkingEvent {
    /// Visible text, outside any thinking block.
    Text(String),
    /// A complete thinking block's content (tags stripped, trimmed).
    Thinking(String),
    /// Sentinel marking the end of the stream; no further events follow.
    End,
}

/// Static configuration for one splitter instance.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub open_tags: &'static [&'static str],
    pub close_tags: &'static [&'static str],
    /// Whether the splitter should assume it starts inside a thinking
    /// block (no upstream this gateway talks to needs this, since each
    /// announces thinking via an explicit open tag or a dedicated
    /// `reasoning_content`/`reasoning` field instead).
    pub initial_in_thinking: bool,
}

impl SplitterConfig {
    /// The tag set this gateway watches for by default: every family a
    /// client might see, in one pass.
    pub const fn gateway_default() -> Self {
        Self {
            open_tags: THINK_OPEN_TAGS,
            close_tags: THINK_CLOSE_TAGS,
            initial_in_thinking: false,
        }
    }
}

/// State machine splitting an input rune stream into interleaved `text`
/// and `thinking` segments (component C2).
pub struct ThinkingSplitter {
    config: SplitterConfig,
    open_scanner: TagScanner,
    close_scanner: TagScanner,
    in_thinking: bool,
    /// Accumulated, not-yet-emitted content for the current segment (tag
    /// markup already stripped as soon as it is recognised).
    segment: String,
}

impl ThinkingSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        let open_scanner = TagScanner::new(config.open_tags);
        let close_scanner = TagScanner::new(config.close_tags);
        let in_thinking = config.initial_in_thinking;
        Self {
            config,
            open_scanner,
            close_scanner,
            in_thinking,
            segment: String::new(),
        }
    }

    pub fn is_in_thinking(&self) -> bool {
        self.in_thinking
    }

    /// Feed one chunk of model output; returns every event the chunk made
    /// available. A trailing prefix that could still grow into a
    /// recognised tag is always held back internally.
    pub fn push_str(&mut self, text: &str) -> Vec<ThinkingEvent> {
        let mut events = Vec::new();
        for c in text.chars() {
            self.segment.push(c);
            let matched = if self.in_thinking {
                self.close_scanner.push(c).map(str::to_owned)
            } else {
                self.open_scanner.push(c).map(str::to_owned)
            };
            if let Some(tag) = matched {
                self.on_tag_match(&tag, &mut events);
            }
        }
        if let Some(ev) = self.flush_text() {
            events.push(ev);
        }
        events
    }

    fn on_tag_match(&mut self, tag: &str, events: &mut Vec<ThinkingEvent>) {
        let tag_len = tag.chars().count();
        // Drop the just-matched tag itself from the tail of the segment;
        // what remains is the content that preceded it.
        drop_last_chars(&mut self.segment, tag_len);
        let content = std::mem::take(&mut self.segment);
        if self.in_thinking {
            events.push(ThinkingEvent::Thinking(clean_thinking_content(&content)));
            self.in_thinking = false;
        } else {
            if !content.is_empty() {
                events.push(ThinkingEvent::Text(content));
            }
            self.in_thinking = true;
        }
        self.open_scanner.clear();
        self.close_scanner.clear();
    }

    /// Emit as much of the pending `Normal`-state segment as is safe —
    /// i.e. everything except a trailing prefix that could still grow
    /// into a recognised open tag. Idempotent; a no-op while inside a
    /// thinking block (thinking content is only ever emitted whole, at
    /// close).
    fn flush_text(&mut self) -> Option<ThinkingEvent> {
        if self.in_thinking || self.segment.is_empty() {
            return None;
        }
        let hold = potential_prefix_len(&self.segment, self.config.open_tags);
        let emit_to = char_boundary_floor(&self.segment, self.segment.len() - hold);
        if emit_to == 0 {
            return None;
        }
        let text: String = self.segment.drain(..emit_to).collect();
        if text.is_empty() {
            None
        } else {
            Some(ThinkingEvent::Text(text))
        }
    }

    /// Emit any residual buffer plus the `End` sentinel. No further calls
    /// should be made after this.
    pub fn finish(&mut self) -> Vec<ThinkingEvent> {
        let mut events = Vec::new();
        if !self.segment.is_empty() {
            let residual = std::mem::take(&mut self.segment);
            if self.in_thinking {
                events.push(ThinkingEvent::Thinking(clean_thinking_content(&residual)));
            } else {
                events.push(ThinkingEvent::Text(residual));
            }
        }
        events.push(ThinkingEvent::End);
        events
    }
}

/// Strip the tag artifact rules from a just-closed thinking segment: trim
/// surrounding whitespace, and drop a leading `>` left over from a
/// malformed close tag when it is itself followed by whitespace.
fn clean_thinking_content(raw: &str) -> String {
    let mut s = raw;
    if let Some(rest) = s.strip_prefix('>') {
        if rest.chars().next().map_or(true, char::is_whitespace) {
            s = rest;
        }
    }
    s.trim().to_string()
}

/// Truncate `buf` by removing its last `n` characters in place.
fn drop_last_chars(buf: &mut String, n: usize) {
    let total = buf.chars().count();
    let keep = total.saturating_sub(n);
    let split_at = char_index_to_byte(buf, keep);
    buf.truncate(split_at);
}

fn char_index_to_byte(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

fn char_boundary_floor(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Longest suffix of `buf` that is a strict prefix of any `tags` entry —
/// the part that must be held back because the next chunk could still
/// complete a tag.
fn potential_prefix_len(buf: &str, tags: &[&str]) -> usize {
    let mut best = 0usize;
    for tag in tags {
        let tag_chars: Vec<char> = tag.chars().collect();
        let max_len = buf.chars().count().min(tag_chars.len().saturating_sub(1));
        for len in (1..=max_len).rev() {
            let idx = char_boundary_floor(buf, buf.len() - char_suffix_byte_len(buf, len));
            let candidate = &buf[idx..];
            if tag.starts_with(candidate) {
                best = best.max(buf.len() - idx);
                break;
            }
        }
    }
    best
}

fn char_suffix_byte_len(s: &str, n_chars: usize) -> usize {
    let total = s.chars().count();
    let start = total.saturating_sub(n_chars);
    s.len() - char_index_to_byte(s, start)
}
