//! In-process request log: a capped ring buffer of recent requests
//! (spec.md §4.7), plus ambient Prometheus counters/histograms emitted
//! through the `metrics` facade the same way every other service in this
//! workspace does (see `runtime::metrics::MetricsServer`), so the
//! gateway's own ring buffer is a supplement to that ambient stack, not
//! a replacement for it.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

/// Maximum number of recent request lines retained (spec.md §4.7: 10,000).
pub const CAPACITY: usize = 10_000;

/// One proxied request's outcome line, formatted as
/// `METHOD:PATH:STATUS:ELAPSED:CLIENT_IP`.
#[derive(Clone)]
pub struct RequestLog {
    lines: Arc<RwLock<VecDeque<String>>>,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLog {
    /// Build an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: Arc::new(RwLock::new(VecDeque::with_capacity(CAPACITY))),
        }
    }

    /// Record one proxied request, evicting the oldest entry once
    /// [`CAPACITY`] is reached. Also emits the ambient `gateway_requests_total`
    /// counter and `gateway_request_duration_seconds` histogram.
    pub async fn record(&self, method: &http::Method, path: &str, status: u16, elapsed: Duration, client_ip: IpAddr) {
        metrics::counter!(
            "gateway_requests_total",
            "method" => method.to_string(),
            "status" => status.to_string(),
        )
        .increment(1);
        metrics::histogram!(
            "gateway_request_duration_seconds",
            "method" => method.to_string(),
        )
        .record(elapsed.as_secs_f64());

        let line = format!("{method}:{path}:{status}:{}:{client_ip}", elapsed.as_millis());

        let mut lines = self.lines.write().await;
        if lines.len() >= CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Snapshot the current log contents, oldest first.
    pub async fn snapshot(&self) -> Vec<String> {
        self.lines.read().await.iter().cloned().collect()
    }

    /// Number of entries currently retained.
    pub async fn len(&self) -> usize {
        self.lines.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.lines.read().await.is_empty()
    }
}
