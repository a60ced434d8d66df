//! Thin `Worker`/`WorkerRegistry` trait seam standing in for the
//! out-of-scope upstream key/worker selection system (spec §1.1). Enough
//! to drive C9–C11 against a single configured upstream base URL and an
//! HTTP client, plus the `LoadTrackingStream` wrapper that releases a
//! worker slot exactly once when a response stream finishes or is dropped.

use std::{
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use tracing::debug;

/// A single upstream target: a base URL plus a load counter and a crude
/// circuit-breaker outcome tally. Out-of-scope health checking / failover
/// is not modelled — a `Worker` is just enough state to pick the
/// least-loaded target and track whether its last few calls succeeded.
pub trait Worker: Send + Sync {
    fn url(&self) -> &str;
    fn load(&self) -> i64;
    fn increment_load(&self);
    fn decrement_load(&self);
    fn record_outcome(&self, success: bool);
    fn supports_model(&self, model_id: &str) -> bool;
}

/// A single-upstream `Worker` implementation. Model support is unrestricted:
/// this gateway proxies to one upstream regardless of the requested model.
pub struct HttpWorker {
    url: String,
    load: AtomicI64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl HttpWorker {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            load: AtomicI64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Worker for HttpWorker {
    fn url(&self) -> &str {
        &self.url
    }

    fn load(&self) -> i64 {
        self.load.load(Ordering::Relaxed)
    }

    fn increment_load(&self) {
        self.load.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_load(&self) {
        self.load.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn supports_model(&self, _model_id: &str) -> bool {
        true
    }
}

/// Registry over the (possibly single) configured set of workers.
pub struct WorkerRegistry {
    workers: Mutex<Vec<Arc<dyn Worker>>>,
}

impl WorkerRegistry {
    pub fn new(workers: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            workers: Mutex::new(workers),
        }
    }

    pub fn single(upstream_url: impl Into<String>) -> Self {
        Self::new(vec![Arc::new(HttpWorker::new(upstream_url))])
    }

    /// Select the least-loaded worker that supports the requested model.
    pub fn select(&self, model_id: &str) -> Option<Arc<dyn Worker>> {
        self.workers
            .lock()
            .iter()
            .filter(|w| w.supports_model(model_id))
            .min_by_key(|w| w.load())
            .cloned()
    }
}

/// Stream wrapper that tracks worker load and circuit breaker outcome.
///
/// Decrements worker load when the stream completes or is dropped, and
/// records circuit breaker outcome based on whether the stream completed
/// successfully — the concrete mechanism behind the cancellation and
/// "closed writer is terminal" rules.
pub struct LoadTrackingStream<S> {
    inner: Pin<Box<S>>,
    /// Wrapped in `Option` so `Drop` can `.take()` it exactly once.
    worker: Option<Arc<dyn Worker>>,
    completed_successfully: bool,
    encountered_error: bool,
}

impl<S> LoadTrackingStream<S> {
    pub fn new(inner: S, worker: Arc<dyn Worker>) -> Self {
        worker.increment_load();
        Self {
            inner: Box::pin(inner),
            worker: Some(worker),
            completed_successfully: false,
            encountered_error: false,
        }
    }
}

impl<S> Stream for LoadTrackingStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => Poll::Ready(Some(Ok(bytes))),
            Poll::Ready(Some(Err(e))) => {
                self.encountered_error = true;
                Poll::Ready(Some(Err(io::Error::other(e.to_string()))))
            }
            Poll::Ready(None) => {
                self.completed_successfully = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for LoadTrackingStream<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.decrement_load();
            let success = self.completed_successfully && !self.encountered_error;
            worker.record_outcome(success);
            debug!(
                completed = %self.completed_successfully,
                error = %self.encountered_error,
                "LoadTrackingStream finished"
            );
        }
    }
}

/// Header propagation allow-list: only authentication/vendor headers cross
/// the proxy boundary, never hop-by-hop or client-identifying headers.
pub fn should_propagate_header(key: &str) -> bool {
    key.eq_ignore_ascii_case("authorization")
        || key.eq_ignore_ascii_case("x-api-key")
        || key.eq_ignore_ascii_case("anthropic-version")
        || key.eq_ignore_ascii_case("anthropic-beta")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn registry_selects_least_loaded_worker() {
        let a = Arc::new(HttpWorker::new("http://a"));
        let b = Arc::new(HttpWorker::new("http://b"));
        a.increment_load();
        let registry = WorkerRegistry::new(vec![a.clone(), b.clone()]);
        let selected = registry.select("any-model").unwrap();
        assert_eq!(selected.url(), "http://b");
    }

    #[tokio::test]
    async fn load_tracking_stream_decrements_and_records_success_on_completion() {
        use futures::StreamExt;
        let worker = Arc::new(HttpWorker::new("http://a"));
        worker.increment_load();
        let inner = stream::iter(vec![Ok::<_, reqwest::Error>(Bytes::from_static(b"x"))]);
        let mut wrapped = LoadTrackingStream::new(inner, worker.clone());
        while wrapped.next().await.is_some() {}
        drop(wrapped);
        assert_eq!(worker.load(), 0);
        assert_eq!(worker.successes(), 1);
        assert_eq!(worker.failures(), 0);
    }

    #[test]
    fn propagates_only_allow_listed_headers() {
        assert!(should_propagate_header("Authorization"));
        assert!(should_propagate_header("x-api-key"));
        assert!(!should_propagate_header("cookie"));
        assert!(!should_propagate_header("host"));
    }
}
