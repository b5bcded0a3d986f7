//! Round-robin load balancing over healthy instances, with a background
//! health sweeper (spec.md §4.7).
//!
//! Shared state behind `Arc<RwLock<_>>`, the same idiom the teacher uses
//! for `runtime::metrics::MetricsServer`'s handle and
//! `reservation-store::sweeper::spawn_sweeper`'s background-task shape,
//! adapted here to a periodic health probe rather than a periodic
//! expiry sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// One upstream instance's last-known health.
#[derive(Clone, Debug)]
pub struct InstanceHealth {
    /// The instance's base URL.
    pub url: String,
    /// Whether the last probe succeeded.
    pub healthy: bool,
    /// Round-trip time of the last probe, if one has run.
    pub last_rtt_ms: Option<u64>,
    /// When the last probe ran.
    pub last_check_at: Option<Instant>,
}

impl InstanceHealth {
    fn new(url: String) -> Self {
        Self {
            url,
            healthy: true,
            last_rtt_ms: None,
            last_check_at: None,
        }
    }
}

/// Round-robin balancer over each logical upstream's instance list.
#[derive(Clone)]
pub struct Balancer {
    instances: Arc<RwLock<HashMap<String, Vec<InstanceHealth>>>>,
    cursors: Arc<HashMap<String, AtomicUsize>>,
    client: reqwest::Client,
    health_check_timeout: Duration,
}

impl Balancer {
    /// Build a balancer over `upstream_instances` (logical upstream name
    /// to ordered instance URL list).
    #[must_use]
    pub fn new(upstream_instances: HashMap<String, Vec<String>>, health_check_timeout: Duration) -> Self {
        let cursors = upstream_instances
            .keys()
            .map(|name| (name.clone(), AtomicUsize::new(0)))
            .collect();

        let instances = upstream_instances
            .into_iter()
            .map(|(name, urls)| (name, urls.into_iter().map(InstanceHealth::new).collect()))
            .collect();

        Self {
            instances: Arc::new(RwLock::new(instances)),
            cursors: Arc::new(cursors),
            client: reqwest::Client::new(),
            health_check_timeout,
        }
    }

    /// Pick the next instance for `upstream`: round-robin restricted to
    /// healthy instances, or the first instance anyway if none are
    /// healthy (spec.md §4.7's fail-open fallback). Returns `None` only
    /// if the upstream has no configured instances at all.
    pub async fn select(&self, upstream: &str) -> Option<String> {
        let instances = self.instances.read().await;
        let all = instances.get(upstream)?;
        if all.is_empty() {
            return None;
        }

        let healthy: Vec<&InstanceHealth> = all.iter().filter(|i| i.healthy).collect();
        let pool = if healthy.is_empty() {
            tracing::warn!(upstream, "no healthy instances, attempting first anyway");
            std::slice::from_ref(&all[0])
        } else {
            &healthy[..]
        };

        let cursor = self.cursors.get(upstream)?;
        let index = cursor.fetch_add(1, Ordering::Relaxed) % pool.len();
        Some(pool[index].url.clone())
    }

    /// Probe `/health` on every instance of every upstream once, flipping
    /// `healthy` on the first result (no hysteresis, per spec.md §4.7).
    pub async fn probe_all(&self) {
        let targets: Vec<(String, usize, String)> = {
            let instances = self.instances.read().await;
            instances
                .iter()
                .flat_map(|(upstream, list)| {
                    list.iter()
                        .enumerate()
                        .map(|(index, instance)| (upstream.clone(), index, instance.url.clone()))
                })
                .collect()
        };

        for (upstream, index, url) in targets {
            let started = Instant::now();
            let healthy = self.probe_one(&url).await;
            let rtt_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let mut instances = self.instances.write().await;
            if let Some(list) = instances.get_mut(&upstream) {
                if let Some(instance) = list.get_mut(index) {
                    instance.healthy = healthy;
                    instance.last_rtt_ms = Some(rtt_ms);
                    instance.last_check_at = Some(Instant::now());
                }
            }
        }
    }

    async fn probe_one(&self, base_url: &str) -> bool {
        let url = format!("{base_url}/health");
        match self
            .client
            .get(&url)
            .timeout(self.health_check_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(%error, url, "health probe failed");
                false
            }
        }
    }
}

/// Spawn a background task that probes every upstream instance on a
/// fixed interval (spec.md §4.7: every 30s, 5s timeout per probe). The
/// returned handle is detached; callers that want graceful shutdown
/// should abort it themselves.
pub fn spawn_health_sweeper(balancer: Balancer, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            balancer.probe_all().await;
        }
    })
}
