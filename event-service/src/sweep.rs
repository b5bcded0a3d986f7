//! Background expiry sweep with booking-aware publishing.
//!
//! `ticketwire_reservation_store::spawn_sweeper` only calls
//! `ReservationStore::sweep_expired` and logs; the store's own publish is
//! skipped here (this service builds its store without an attached bus, see
//! `crate::publish`), so this module runs the same fixed-interval shape
//! itself and publishes `event.seat.released` for every reservation the
//! sweep expires.

use std::sync::Arc;
use std::time::Duration;

use composable_rust_core::event_bus::EventBus;
use ticketwire_domain::events::SeatReleaseReason;
use ticketwire_reservation_store::ReservationStore;

use crate::publish::publish_seat_released;

/// How often the sweep runs, per spec.md §4.3.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a background task that expires lapsed `PENDING` reservations on a
/// fixed interval and publishes `event.seat.released` (reason `Expired`,
/// no booking attribution) for each. The returned handle is detached;
/// callers that want graceful shutdown should abort it themselves.
pub fn spawn_expiry_publisher(
    store: Arc<ReservationStore>,
    event_bus: Arc<dyn EventBus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match store.sweep_expired().await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "expiry sweep completed");
                    for reservation in &expired {
                        if let Err(error) =
                            publish_seat_released(&event_bus, reservation, SeatReleaseReason::Expired, None)
                                .await
                        {
                            tracing::error!(%error, reservation_id = %reservation.reservation_id, "failed to publish expiry release");
                        }
                    }
                }
                Ok(_) => {}
                Err(error) => tracing::error!(error = %error, "expiry sweep failed"),
            }
        }
    })
}
