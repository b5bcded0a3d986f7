//! Domain-level error kinds shared across every ticketwire service.
//!
//! These are transport-agnostic: HTTP handlers translate them to status
//! codes locally (see `composable_rust_web::error::AppError`), bus
//! consumers translate them to ack/nack decisions, and sagas translate them
//! to retry-or-compensate decisions via [`DomainError::non_retryable`].

use thiserror::Error;

/// A domain-level error kind, independent of how it will eventually be
/// surfaced (HTTP status, bus nack, saga step failure).
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// Bad client input. Surfaced as 400, never crosses the bus.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lookup miss. Surfaced as 404.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// The kind of resource that was not found, e.g. `"booking"`.
        resource: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// An invariant would be violated by the requested operation, e.g. a
    /// duplicate seat reservation or a disallowed state transition.
    /// Surfaced as 409; inside sagas, becomes a step failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authentication failed or was missing. Surfaced as 401, never
    /// retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted. Surfaced as 403, never retried.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A downstream broker, HTTP upstream, or database is momentarily
    /// unavailable. Inside the gateway becomes 502/503/504; inside sagas
    /// triggers retry with backoff.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A deadline was exceeded at step or workflow granularity. Triggers
    /// retry or compensation.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A malformed bus payload. Nacked without requeue and routed to the
    /// dead-letter queue.
    #[error("poison message: {0}")]
    PoisonMessage(String),

    /// Unexpected failure, logged with a correlation id. Surfaced as 500
    /// externally.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Whether a saga step failing with this error should be retried.
    ///
    /// Sagas treat a step response with `success=false` as retryable by
    /// default; [`Validation`](Self::Validation), [`Unauthorized`](Self::Unauthorized),
    /// [`Forbidden`](Self::Forbidden) and [`Conflict`](Self::Conflict) are
    /// the exceptions — retrying them would reproduce the same outcome.
    #[must_use]
    pub const fn non_retryable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Unauthorized(_) | Self::Forbidden(_) | Self::Conflict(_)
        )
    }

    /// A short machine-readable code for this error kind, stable across
    /// releases, suitable for client-side error handling or metrics labels.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::PoisonMessage(_) => "POISON_MESSAGE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_conflict_and_auth_errors_are_non_retryable() {
        assert!(DomainError::Validation("bad".into()).non_retryable());
        assert!(DomainError::Conflict("seat taken".into()).non_retryable());
        assert!(DomainError::Unauthorized("no token".into()).non_retryable());
        assert!(DomainError::Forbidden("not admin".into()).non_retryable());
    }

    #[test]
    fn upstream_and_timeout_errors_are_retryable() {
        assert!(!DomainError::UpstreamUnavailable("db down".into()).non_retryable());
        assert!(!DomainError::Timeout("deadline exceeded".into()).non_retryable());
        assert!(!DomainError::Internal("bug".into()).non_retryable());
    }

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(
            DomainError::NotFound {
                resource: "booking",
                id: "abc".into()
            }
            .code(),
            "NOT_FOUND"
        );
    }
}
