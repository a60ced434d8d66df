//! SSE codec (C3): a line-oriented reader that turns upstream bytes into
//! framed `{event?, data}` pairs, and a writer that serialises Claude-shaped
//! events back out with bounded back-pressure.

use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SseError {
    #[error("SSE buffer exceeded maximum size ({0} bytes)")]
    BufferOverflow(usize),
}

/// Guards against unbounded buffer growth from an upstream that sends data
/// without frame delimiters.
pub const MAX_SSE_BUFFER_SIZE: usize = 1024 * 1024;

/// One parsed SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame reader: feed it chunks as they arrive over the
/// wire, drain complete frames after each feed. Comment lines (starting
/// with `:`) are ignored; `data: [DONE]` surfaces as a frame whose `data`
/// is the literal string `"[DONE]"` so callers can detect the terminator.
#[derive(Default)]
pub struct SseReader {
    buffer: String,
}

impl SseReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of raw bytes, returning any complete frames it produced.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseError> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        if self.buffer.len() > MAX_SSE_BUFFER_SIZE {
            return Err(SseError::BufferOverflow(MAX_SSE_BUFFER_SIZE));
        }

        let mut events = Vec::new();
        while let Some(frame_end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..frame_end + 2).collect();
            if let Some(event) = parse_frame(&frame[..frame.len() - 2]) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush any trailing partial frame at stream end.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let remaining = std::mem::take(&mut self.buffer);
        if remaining.trim().is_empty() {
            None
        } else {
            parse_frame(&remaining)
        }
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event_type: Option<String> = None;
    let mut data_lines = Vec::new();

    for line in frame.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event: event_type,
        data: data_lines.join("\n"),
    })
}

/// Format a Claude-shaped event as `event: <type>\ndata: <json>\n\n`.
pub fn format_sse_event(event_type: &str, data: &Value) -> Bytes {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("event: {}\ndata: {}\n\n", event_type, json))
}

const MAX_IN_FLIGHT: usize = 100;
const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(10);
const WINDOW_RESET: Duration = Duration::from_millis(20);
const CRITICAL_RETRY_BACKOFF: Duration = Duration::from_millis(5);

struct BackpressureState {
    in_flight: usize,
    window_start: Instant,
}

/// Single-producer SSE writer with a bounded in-flight counter. Concurrent
/// senders serialise through the mutex and may block — this is a safety
/// net, not a parallelism primitive (spec §5).
pub struct SseWriter {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    state: Mutex<BackpressureState>,
}

impl SseWriter {
    pub fn new(tx: mpsc::Sender<Result<Bytes, std::io::Error>>) -> Self {
        Self {
            tx,
            state: Mutex::new(BackpressureState {
                in_flight: 0,
                window_start: Instant::now(),
            }),
        }
    }

    async fn apply_backpressure(&self) {
        loop {
            let should_wait = {
                let mut state = self.state.lock();
                if state.window_start.elapsed() >= WINDOW_RESET {
                    state.in_flight = 0;
                    state.window_start = Instant::now();
                }
                state.in_flight >= MAX_IN_FLIGHT
            };
            if !should_wait {
                return;
            }
            tokio::time::sleep(BACKPRESSURE_SLEEP).await;
        }
    }

    /// Send one event. Critical events (`message_start`, `content_block_*`,
    /// `message_delta`, `message_stop`) retry up to 3x with a 5ms backoff;
    /// non-critical deltas retry once. A closed channel is terminal.
    pub async fn send_event(&self, event_type: &str, data: &Value) -> bool {
        let critical = matches!(
            event_type,
            "message_start"
                | "content_block_start"
                | "content_block_stop"
                | "message_delta"
                | "message_stop"
        );
        let max_attempts = if critical { 3 } else { 1 };
        let bytes = format_sse_event(event_type, data);

        for attempt in 0..max_attempts {
            self.apply_backpressure().await;
            match self.tx.try_send(Ok(bytes.clone())) {
                Ok(()) => {
                    self.state.lock().in_flight += 1;
                    return true;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(CRITICAL_RETRY_BACKOFF).await;
                        continue;
                    }
                    debug!(event_type, "SSE writer full after retries, dropping event");
                    return false;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(event_type, "SSE writer channel closed");
                    return false;
                }
            }
        }
        false
    }

    pub async fn send_error(&self, message: &str) -> bool {
        let data = serde_json::json!({
            "type": "error",
            "error": { "type": "api_error", "message": message }
        });
        self.send_event("error", &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_single_frame_with_event_and_data() {
        let mut reader = SseReader::new();
        let events = reader
            .feed(b"event: message_start\ndata: {\"a\":1}\n\n")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message_start"));
        assert_eq!(events[0].data, r#"{"a":1}"#);
    }

    #[test]
    fn joins_multiple_data_lines() {
        let mut reader = SseReader::new();
        let events = reader.feed(b"data: line1\ndata: line2\n\n").unwrap();
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn ignores_comment_lines() {
        let mut reader = SseReader::new();
        let events = reader.feed(b": keep-alive\ndata: hi\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hi");
    }

    #[test]
    fn surfaces_done_sentinel() {
        let mut reader = SseReader::new();
        let events = reader.feed(b"data: [DONE]\n\n").unwrap();
        assert_eq!(events[0].data, "[DONE]");
    }

    #[test]
    fn handles_split_chunks_across_feeds() {
        let mut reader = SseReader::new();
        assert!(reader.feed(b"data: {\"a\":1}").unwrap().is_empty());
        let events = reader.feed(b"}\n\n").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn overflow_guard_trips_past_max_buffer() {
        let mut reader = SseReader::new();
        let huge = vec![b'x'; MAX_SSE_BUFFER_SIZE + 1];
        assert!(matches!(
            reader.feed(&huge),
            Err(SseError::BufferOverflow(_))
        ));
    }

    #[tokio::test]
    async fn writer_delivers_event_to_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let writer = SseWriter::new(tx);
        assert!(
            writer
                .send_event("message_stop", &serde_json::json!({"type": "message_stop"}))
                .await
        );
        let received = rx.recv().await.unwrap().unwrap();
        assert!(String::from_utf8(received.to_vec())
            .unwrap()
            .starts_with("event: message_stop\n"));
    }

    #[tokio::test]
    async fn writer_reports_closed_channel_as_failed_send() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let writer = SseWriter::new(tx);
        assert!(!writer
            .send_event("ping", &serde_json::json!({"type": "ping"}))
            .await);
    }
}
