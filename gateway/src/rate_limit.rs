//! Per-client-IP rate limiting: a sliding time window over a shared
//! in-process map (spec.md §4.7).
//!
//! The teacher's workspace has no rate limiter to ground this on
//! directly, so it follows the same "shared state behind a lock" idiom
//! the rest of this crate uses (see `balancer::Balancer`) rather than
//! reaching for an unrelated framework crate.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Sliding-window rate limiter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<IpAddr, VecDeque<Instant>>>>,
    window: Duration,
    capacity: u32,
}

/// The result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Under the limit; the request may proceed.
    Allowed,
    /// Over the limit; the request should be rejected with 429 and the
    /// given `Retry-After` hint in seconds.
    Rejected {
        /// Seconds until the oldest request in the window falls out of
        /// it, suitable for a `Retry-After` header.
        retry_after_secs: u64,
    },
}

impl RateLimiter {
    /// Build a limiter with `capacity` requests allowed per `window`.
    #[must_use]
    pub fn new(window: Duration, capacity: u32) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            window,
            capacity,
        }
    }

    /// Check and record one request from `client_ip`. Evicts timestamps
    /// older than `window` before counting, matching
    /// `examples/original_source/services/api-gateway/middleware.py`'s
    /// `RateLimiter.is_allowed` semantics.
    pub async fn check(&self, client_ip: IpAddr) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let timestamps = windows.entry(client_ip).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.capacity as usize {
            let retry_after = timestamps
                .front()
                .map_or(self.window, |oldest| self.window.saturating_sub(now.duration_since(*oldest)));
            return RateLimitDecision::Rejected {
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        timestamps.push_back(now);
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Tests can use unwrap/panic for assertions
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_requests_under_capacity() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert_eq!(limiter.check(ip).await, RateLimitDecision::Allowed);
        assert_eq!(limiter.check(ip).await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn rejects_the_request_over_capacity() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert_eq!(limiter.check(ip).await, RateLimitDecision::Allowed);
        match limiter.check(ip).await {
            RateLimitDecision::Rejected { retry_after_secs } => assert!(retry_after_secs > 0),
            RateLimitDecision::Allowed => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn tracks_each_client_ip_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();

        assert_eq!(limiter.check(a).await, RateLimitDecision::Allowed);
        assert_eq!(limiter.check(b).await, RateLimitDecision::Allowed);
    }
}
