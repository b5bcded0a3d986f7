//! Gateway process entry point: reads upstream instance lists and the
//! bearer token secret from the environment, builds the reverse-proxy
//! router, and serves it on 8080 (spec.md §6), grounded on
//! `examples/ticketing/src/main.rs`'s tracing/bind/graceful-shutdown shape.

use std::collections::HashMap;

use ticketwire_gateway::config::{GatewayConfig, UPSTREAMS};
use ticketwire_gateway::{build_router, GatewayState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketwire_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());

    let mut upstream_instances: HashMap<String, Vec<String>> = HashMap::new();
    for upstream in UPSTREAMS {
        let env_var = format!("{}_SERVICE_URLS", upstream.to_uppercase());
        let default_port = default_port_for(upstream);
        let urls = std::env::var(&env_var)
            .map(|value| value.split(',').map(str::trim).map(str::to_string).collect())
            .unwrap_or_else(|_| vec![format!("http://{upstream}-service:{default_port}")]);
        upstream_instances.insert((*upstream).to_string(), urls);
    }

    let config = GatewayConfig::new(port, upstream_instances, jwt_secret);
    let state = GatewayState::new(config);
    let _health_sweeper = ticketwire_gateway::proxy::spawn_health_sweeper(&state);

    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Each upstream's own default port, used when `{UPSTREAM}_SERVICE_URLS`
/// isn't set — matches this workspace's service port assignments.
fn default_port_for(upstream: &str) -> u16 {
    match upstream {
        "user" => 8081,
        "event" => 8082,
        "payment" => 8083,
        "booking" => 8084,
        _ => 8080,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
