//! Background task that periodically expires lapsed `PENDING` reservations.

use crate::store::ReservationStore;
use std::sync::Arc;
use std::time::Duration;

/// How often [`spawn_sweeper`] calls [`ReservationStore::sweep_expired`].
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a background task that sweeps expired reservations on a fixed
/// interval, per spec.md §4.3.
///
/// The returned handle is detached; callers that want graceful shutdown
/// should abort it themselves.
pub fn spawn_sweeper(store: Arc<ReservationStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match store.sweep_expired().await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "expiry sweep completed");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
            }
        }
    })
}
