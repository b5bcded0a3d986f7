//! Per-upstream circuit breaking.
//!
//! Wraps the teacher's `composable_rust_runtime::circuit_breaker::CircuitBreaker`
//! unmodified, one instance per logical upstream (spec.md §4.7: CLOSED,
//! OPEN, HALF_OPEN with `failure_threshold=5`/`open_timeout=60s`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use composable_rust_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

use crate::config::UPSTREAMS;

/// One [`CircuitBreaker`] per logical upstream, keyed by name
/// (`"user"`/`"event"`/`"booking"`/`"payment"`).
#[derive(Clone)]
pub struct UpstreamBreakers {
    breakers: Arc<HashMap<&'static str, CircuitBreaker>>,
}

impl UpstreamBreakers {
    /// Build a breaker for every upstream in [`UPSTREAMS`], all sharing
    /// the same `failure_threshold`/`timeout`.
    #[must_use]
    pub fn new(failure_threshold: usize, timeout: Duration) -> Self {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(failure_threshold)
            .timeout(timeout)
            .build();

        let breakers = UPSTREAMS
            .iter()
            .map(|name| (*name, CircuitBreaker::new(config.clone())))
            .collect();

        Self {
            breakers: Arc::new(breakers),
        }
    }

    /// Run `operation` through the named upstream's breaker. Returns
    /// [`CircuitBreakerError::Open`] immediately without calling
    /// `operation` while the breaker is OPEN (spec.md §4.7: "responds 503
    /// without contacting upstream").
    ///
    /// # Panics
    ///
    /// Panics if `upstream` is not one of [`UPSTREAMS`] — a programmer
    /// error in routing, not a runtime condition callers should need to
    /// handle.
    #[allow(clippy::panic)]
    pub async fn call<F, Fut, T, E>(&self, upstream: &str, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let breaker = self
            .breakers
            .get(upstream)
            .unwrap_or_else(|| panic!("unknown upstream: {upstream}"));
        breaker.call(operation).await
    }
}
