//! Bus consumption: the notification projection's only event source.
//!
//! Subscribes to the `"booking"` and `"payment"` topics per
//! `messaging::topology::bindings_for("notification-service")` and feeds
//! every decoded envelope into [`NotificationProjection::apply_event`].
//! Unlike `booking-service`/`payment-service`'s consumers, which decode a
//! single known event type off the wire, this one dispatches on the
//! envelope's own routing key via [`TicketingEvent::from_routing_key`]
//! since it reacts to three distinct event shapes across two topics.

use std::sync::Arc;

use composable_rust_core::event_bus::EventBus;
use composable_rust_core::projection::Projection;
use futures::StreamExt;
use ticketwire_domain::events::TicketingEvent;

use crate::projection::{NotificationEvent, NotificationProjection};

/// Subscribe to the booking and payment domain topics and apply every
/// decoded envelope to `projection` as it arrives. The returned handle is
/// detached; callers that want graceful shutdown should abort it
/// themselves.
pub async fn spawn_consumer(
    event_bus: Arc<dyn EventBus>,
    projection: Arc<NotificationProjection>,
) -> Result<tokio::task::JoinHandle<()>, composable_rust_core::event_bus::EventBusError> {
    let mut stream = event_bus.subscribe(&["booking", "payment"]).await?;

    Ok(tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(serialized) => {
                    let raw = match serde_json::from_slice::<serde_json::Value>(&serialized.data) {
                        Ok(raw) => raw,
                        Err(error) => {
                            tracing::warn!(
                                %error,
                                event_type = %serialized.event_type,
                                "failed to parse envelope as JSON"
                            );
                            continue;
                        }
                    };

                    match TicketingEvent::from_routing_key(&serialized.event_type, raw) {
                        Ok(event) => {
                            if let Some(event) = NotificationEvent::from_ticketing_event(event) {
                                if let Err(error) = projection.apply_event(&event).await {
                                    tracing::error!(%error, event_type = %serialized.event_type, "failed to apply event to notification projection");
                                }
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, event_type = %serialized.event_type, "failed to decode envelope");
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "booking/payment topic subscription error");
                }
            }
        }
    }))
}
