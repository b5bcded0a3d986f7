//! Gateway configuration: per-upstream instance lists and the tunables
//! spec.md §4.7 fixes as defaults. The application wires these up at
//! startup and passes the result in — this crate reads no environment
//! variables itself, following the teacher's own stance in
//! `auth::config` ("configuration values should be provided by the
//! application, not hardcoded").

use std::collections::HashMap;
use std::time::Duration;

/// The four logical upstreams the gateway fronts.
pub const UPSTREAMS: &[&str] = &["user", "event", "booking", "payment"];

/// Routes that additionally require `role=admin` once authenticated.
pub const ADMIN_ROUTE_PREFIXES: &[&str] = &["/api/v1/admin"];

/// Static, process-wide gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Port the gateway itself listens on (spec.md §6: 8080).
    pub port: u16,
    /// Ordered instance URLs per logical upstream, e.g. `"booking" ->
    /// ["http://booking-service-1:8080", ...]`.
    pub upstream_instances: HashMap<String, Vec<String>>,
    /// Symmetric HMAC signing key bearer tokens are validated against.
    pub jwt_secret: String,
    /// Rate limiter window (spec.md §4.7: 60s).
    pub rate_limit_window: Duration,
    /// Rate limiter capacity per client IP per window (spec.md §4.7: 100).
    pub rate_limit_capacity: u32,
    /// Circuit breaker consecutive-failure threshold (spec.md §4.7: 5).
    pub circuit_breaker_failure_threshold: usize,
    /// Circuit breaker open-state timeout before probing (spec.md §4.7: 60s).
    pub circuit_breaker_timeout: Duration,
    /// Health sweep interval (spec.md §4.7: 30s).
    pub health_check_interval: Duration,
    /// Health probe timeout (spec.md §4.7: 5s).
    pub health_check_timeout: Duration,
    /// Upstream request timeout (spec.md §4.7: 30s).
    pub upstream_timeout: Duration,
}

impl GatewayConfig {
    /// Build a config with spec.md §4.7's defaults, given only the
    /// per-upstream instance lists (the one thing that varies by
    /// deployment).
    #[must_use]
    pub fn new(port: u16, upstream_instances: HashMap<String, Vec<String>>, jwt_secret: String) -> Self {
        Self {
            port,
            upstream_instances,
            jwt_secret,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_capacity: 100,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            upstream_timeout: Duration::from_secs(30),
        }
    }

    /// Which logical upstream a request path belongs to, by its
    /// `/api/v1/{segment}` prefix. `auth` and `users` both route to the
    /// `user` upstream (spec.md §6: `/api/v1/{auth,users,events,bookings,payments}/*`).
    #[must_use]
    pub fn upstream_for_path(path: &str) -> Option<&'static str> {
        let rest = path.strip_prefix("/api/v1/")?;
        let segment = rest.split('/').next().unwrap_or("");
        match segment {
            "auth" | "users" => Some("user"),
            "events" => Some("event"),
            "bookings" => Some("booking"),
            "payments" => Some("payment"),
            _ => None,
        }
    }
}

/// Whether `method path` may skip bearer token validation: registration
/// (`POST /api/v1/users`), login (anything under `/api/v1/auth`),
/// read-only event queries (`GET /api/v1/events/*`), and the gateway's
/// own health check (spec.md §4.7).
#[must_use]
pub fn is_public_route(method: &http::Method, path: &str) -> bool {
    path == "/health"
        || path.starts_with("/api/v1/auth")
        || (method == http::Method::POST && path == "/api/v1/users")
        || (method == http::Method::GET && path.starts_with("/api/v1/events"))
}

/// Whether `path` additionally requires `role=admin`.
#[must_use]
pub fn is_admin_route(path: &str) -> bool {
    ADMIN_ROUTE_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_path_prefixes_to_logical_upstreams() {
        assert_eq!(GatewayConfig::upstream_for_path("/api/v1/bookings/123"), Some("booking"));
        assert_eq!(GatewayConfig::upstream_for_path("/api/v1/auth/login"), Some("user"));
        assert_eq!(GatewayConfig::upstream_for_path("/api/v1/users/42"), Some("user"));
        assert_eq!(GatewayConfig::upstream_for_path("/api/v1/events/1/seats"), Some("event"));
        assert_eq!(GatewayConfig::upstream_for_path("/api/v1/payments/9"), Some("payment"));
        assert_eq!(GatewayConfig::upstream_for_path("/unrelated"), None);
    }

    #[test]
    fn public_routes_skip_auth() {
        assert!(is_public_route(&http::Method::POST, "/api/v1/auth/login"));
        assert!(is_public_route(&http::Method::GET, "/health"));
        assert!(is_public_route(&http::Method::POST, "/api/v1/users"));
        assert!(is_public_route(&http::Method::GET, "/api/v1/events/1/seats"));
        assert!(!is_public_route(&http::Method::GET, "/api/v1/users/42"));
        assert!(!is_public_route(&http::Method::POST, "/api/v1/bookings"));
    }
}
