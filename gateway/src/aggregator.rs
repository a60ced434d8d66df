//! Text aggregator (C4): coalesces tiny deltas into ≥N-ms chunks so the
//! streaming handler doesn't emit one SSE event per token. Must never
//! change the concatenation of emitted text — it only changes chunking.

use std::time::{Duration, Instant};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

pub struct TextAggregator {
    buffer: String,
    last_flush: Instant,
    interval: Duration,
    closed: bool,
}

impl Default for TextAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAggregator {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            buffer: String::new(),
            last_flush: Instant::now(),
            interval,
            closed: false,
        }
    }

    /// Append text to the pending chunk. A no-op once `close`d.
    pub fn add(&mut self, text: &str) {
        if !self.closed {
            self.buffer.push_str(text);
        }
    }

    /// Flush only if `interval` has elapsed since the last flush.
    pub fn maybe_flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() || self.last_flush.elapsed() < self.interval {
            return None;
        }
        self.flush()
    }

    /// Flush unconditionally.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.last_flush = Instant::now();
        Some(std::mem::take(&mut self.buffer))
    }

    /// Flush and lock out further adds.
    pub fn close(&mut self) -> Option<String> {
        self.closed = true;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_flush_holds_back_before_interval_elapses() {
        let mut agg = TextAggregator::with_interval(Duration::from_secs(60));
        agg.add("hello");
        assert_eq!(agg.maybe_flush(), None);
    }

    #[test]
    fn maybe_flush_emits_after_interval_elapses() {
        let mut agg = TextAggregator::with_interval(Duration::from_millis(5));
        agg.add("hello");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(agg.maybe_flush(), Some("hello".to_string()));
    }

    #[test]
    fn flush_is_immediate_regardless_of_interval() {
        let mut agg = TextAggregator::with_interval(Duration::from_secs(60));
        agg.add("a");
        agg.add("b");
        assert_eq!(agg.flush(), Some("ab".to_string()));
    }

    #[test]
    fn close_flushes_and_locks_out_further_adds() {
        let mut agg = TextAggregator::with_interval(Duration::from_secs(60));
        agg.add("a");
        assert_eq!(agg.close(), Some("a".to_string()));
        agg.add("b");
        assert_eq!(agg.flush(), None);
    }

    #[test]
    fn empty_buffer_flushes_to_none() {
        let mut agg = TextAggregator::new();
        assert_eq!(agg.flush(), None);
    }

    #[test]
    fn concatenation_is_preserved_across_multiple_adds_and_flushes() {
        let mut agg = TextAggregator::with_interval(Duration::from_secs(60));
        let mut out = String::new();
        agg.add("foo");
        agg.add("bar");
        out.push_str(&agg.flush().unwrap());
        agg.add("baz");
        out.push_str(&agg.close().unwrap());
        assert_eq!(out, "foobarbaz");
    }
}
