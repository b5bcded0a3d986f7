//! The API gateway (spec.md §4.7): reverse proxy fronting the
//! user/event/booking/payment services with round-robin load balancing,
//! active health checks, per-client-IP rate limiting, per-upstream
//! circuit breaking, and symmetric-key bearer token validation.
//!
//! This crate owns routing and resilience only — it holds no domain
//! state and talks to no database or message bus, unlike every other
//! service in this workspace.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod balancer;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod rate_limit;
pub mod upstream;

pub use config::GatewayConfig;
pub use proxy::GatewayState;

use axum::{routing::get, Router};

/// Build the gateway's Axum router: `/health` answered locally, everything
/// else proxied upstream through [`proxy::proxy_handler`].
#[must_use]
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .fallback(proxy::proxy_handler)
        .with_state(state)
}
