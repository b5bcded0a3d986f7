//! The reverse proxy handler: auth, rate limiting, circuit breaking, load
//! balancing, and request forwarding, wired together in the order spec.md
//! §4.7 describes (validate token → check rate limit → select instance
//! through its breaker → forward → record).
//!
//! Grounded on `examples/original_source/services/api-gateway/main.py`'s
//! `ServiceClient.forward_request`: strip hop-by-hop headers, forward
//! method/query/body unchanged, return upstream's status and body as-is.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use composable_rust_runtime::circuit_breaker::CircuitBreakerError;
use composable_rust_web::extractors::ClientIp;
use composable_rust_web::AppError;

use crate::auth::{require_admin, TokenValidator, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::balancer::Balancer;
use crate::config::{is_admin_route, is_public_route, GatewayConfig};
use crate::metrics::RequestLog;
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::upstream::UpstreamBreakers;

/// Request/response headers that must not be forwarded across a proxy hop
/// (RFC 7230 §6.1), plus `host` since the outbound request sets its own.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Shared state for the gateway's proxy handler.
#[derive(Clone)]
pub struct GatewayState {
    /// Static configuration.
    pub config: Arc<GatewayConfig>,
    /// Round-robin balancer over upstream instances.
    pub balancer: Balancer,
    /// Per-upstream circuit breakers.
    pub breakers: UpstreamBreakers,
    /// Per-client-IP rate limiter.
    pub rate_limiter: RateLimiter,
    /// Bearer token validator.
    pub token_validator: TokenValidator,
    /// Capped ring buffer of recent requests.
    pub request_log: RequestLog,
    /// HTTP client used to forward requests upstream.
    pub client: reqwest::Client,
}

impl GatewayState {
    /// Build gateway state from `config`.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let balancer = Balancer::new(config.upstream_instances.clone(), config.health_check_timeout);
        let breakers = UpstreamBreakers::new(config.circuit_breaker_failure_threshold, config.circuit_breaker_timeout);
        let rate_limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_capacity);
        let token_validator = TokenValidator::new(&config.jwt_secret);
        let client = reqwest::Client::new();

        Self {
            config: Arc::new(config),
            balancer,
            breakers,
            rate_limiter,
            token_validator,
            request_log: RequestLog::new(),
            client,
        }
    }
}

/// Catch-all handler: proxies any `/api/v1/*` request to the right
/// upstream. Mounted as the router's fallback.
pub async fn proxy_handler(
    State(state): State<GatewayState>,
    client_ip: ClientIp,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let path = uri.path().to_string();

    let mut response = match handle(&state, &client_ip, &method, &uri, &headers, body).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    };

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    state
        .request_log
        .record(&method, &path, status, elapsed, client_ip.0)
        .await;

    if let Ok(value) = HeaderValue::from_str(&elapsed.as_millis().to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-process-time"), value);
    }
    response
}

async fn handle(
    state: &GatewayState,
    client_ip: &ClientIp,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let path = uri.path();

    if !is_public_route(method, path) {
        let auth_header = headers.get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        let claims = state
            .token_validator
            .validate(auth_header)
            .map_err(|e| AppError::unauthorized(e.to_string()))?;

        if is_admin_route(path) {
            require_admin(&claims).map_err(|e| AppError::forbidden(e.to_string()))?;
        }

        return forward_authenticated(state, client_ip, method, uri, headers, body, Some(claims)).await;
    }

    forward_authenticated(state, client_ip, method, uri, headers, body, None).await
}

async fn forward_authenticated(
    state: &GatewayState,
    client_ip: &ClientIp,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    claims: Option<crate::auth::Claims>,
) -> Result<Response, AppError> {
    match state.rate_limiter.check(client_ip.0).await {
        RateLimitDecision::Allowed => {}
        RateLimitDecision::Rejected { retry_after_secs } => {
            let mut response = AppError::too_many_requests("rate limit exceeded").into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("retry-after"), value);
            }
            return Ok(response);
        }
    }

    let path = uri.path();
    let upstream = GatewayConfig::upstream_for_path(path)
        .ok_or_else(|| AppError::not_found("route", path))?;

    let result = state
        .breakers
        .call(upstream, || forward_once(state, upstream, method, uri, headers, body, claims.as_ref()))
        .await;

    match result {
        Ok(response) => Ok(response),
        Err(CircuitBreakerError::Open) => Err(AppError::unavailable(format!("{upstream} upstream unavailable"))),
        Err(CircuitBreakerError::Inner(error)) => Err(error),
    }
}

async fn forward_once(
    state: &GatewayState,
    upstream: &str,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    claims: Option<&crate::auth::Claims>,
) -> Result<Response, AppError> {
    let instance = state
        .balancer
        .select(upstream)
        .await
        .ok_or_else(|| AppError::unavailable(format!("no instances configured for {upstream}")))?;

    let mut target = format!("{instance}{}", uri.path());
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|e| AppError::internal(e.to_string()))?;
    let mut request = state.client.request(reqwest_method, &target).timeout(state.config.upstream_timeout);

    for (name, value) in headers.iter() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let Ok(value_str) = value.to_str() {
            request = request.header(name.as_str(), value_str);
        }
    }

    if let Some(claims) = claims {
        request = request.header(USER_ID_HEADER, claims.sub.as_str());
        request = request.header(USER_ROLE_HEADER, claims.role.as_str());
    }

    if !body.is_empty() {
        request = request.body(body.to_vec());
    }

    let upstream_response = request.send().await.map_err(|error| {
        if error.is_timeout() {
            AppError::gateway_timeout(format!("{upstream} upstream timed out"))
        } else {
            AppError::bad_gateway(format!("{upstream} upstream unreachable: {error}"))
        }
    })?;

    let status = StatusCode::from_u16(upstream_response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = upstream_response.headers().clone();
    let response_body = upstream_response
        .bytes()
        .await
        .map_err(|error| AppError::bad_gateway(format!("failed reading {upstream} response: {error}")))?;

    let mut response = Response::builder().status(status);
    for (name, value) in response_headers.iter() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        response = response.header(name.clone(), value.clone());
    }

    response
        .body(axum::body::Body::from(response_body))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// Spawn the balancer's background health sweeper at the configured
/// interval. The returned handle is detached.
pub fn spawn_health_sweeper(state: &GatewayState) -> tokio::task::JoinHandle<()> {
    crate::balancer::spawn_health_sweeper(state.balancer.clone(), state.config.health_check_interval)
}
