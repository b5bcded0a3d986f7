//! Bus consumption: the pull-model entry points for seat and payment
//! lifecycle events a booking reacts to.
//!
//! Subscribes to the `"event"` and `"payment"` topics and, for every
//! `event.seat.reserved`, `event.seat.released`, `payment.completed`,
//! `payment.failed` and `payment.refunded` envelope observed, dispatches
//! the matching [`BookingAction`] into the store. Every dispatched action
//! carries the envelope's own id so `BookingState::already_processed`
//! short-circuits redelivery (spec.md §4.4), grounded on
//! `payment-service/src/consumer.rs`'s subscribe-and-dispatch shape.

use std::sync::Arc;

use composable_rust_core::event_bus::EventBus;
use composable_rust_runtime::Store;
use futures::StreamExt;
use ticketwire_domain::events::{SeatReleaseReason, TicketingEvent};

use crate::reducer::{BookingAction, BookingEnvironment, BookingReducer};
use crate::types::BookingState;

/// Subscribe to the event and payment domains' bus topics and feed the
/// seat/payment lifecycle events booking-service cares about into `store`
/// as they arrive. The returned handle is detached; callers that want
/// graceful shutdown should abort it themselves.
pub async fn spawn_consumer(
    event_bus: Arc<dyn EventBus>,
    store: Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
) -> Result<tokio::task::JoinHandle<()>, composable_rust_core::event_bus::EventBusError> {
    let mut stream = event_bus.subscribe(&["event", "payment"]).await?;

    Ok(tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(serialized) => {
                    let raw: serde_json::Value = match serde_json::from_slice(&serialized.data) {
                        Ok(value) => value,
                        Err(error) => {
                            tracing::warn!(%error, "failed to parse bus envelope as JSON");
                            continue;
                        }
                    };
                    match TicketingEvent::from_routing_key(&serialized.event_type, raw) {
                        Ok(event) => dispatch(&store, event).await,
                        Err(error) => {
                            tracing::warn!(
                                event_type = %serialized.event_type,
                                %error,
                                "failed to decode bus envelope"
                            );
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "event/payment topic subscription error");
                }
            }
        }
    }))
}

async fn dispatch(
    store: &Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
    event: TicketingEvent,
) {
    let action = match event {
        TicketingEvent::SeatReserved(envelope) => Some(BookingAction::SeatReserved {
            source_event_id: envelope.event_id.as_uuid(),
            booking_id: match envelope.data.booking_id {
                Some(id) => id,
                None => {
                    tracing::warn!(
                        reservation_id = %envelope.data.reservation_id,
                        "seat reserved with no booking attribution, dropping"
                    );
                    return;
                }
            },
            reservation_id: envelope.data.reservation_id,
            seat_id: envelope.data.seat_id,
        }),
        TicketingEvent::SeatReleased(envelope) if envelope.data.reason == SeatReleaseReason::Expired => {
            match envelope.data.booking_id {
                Some(booking_id) => Some(BookingAction::SeatReservationFailed {
                    source_event_id: envelope.event_id.as_uuid(),
                    booking_id,
                    reason: "reservation hold expired before confirmation".to_string(),
                }),
                // The TTL sweep releases with no booking context; booking-service's
                // own ExpireBooking timer is the primary mechanism for this case.
                None => None,
            }
        }
        TicketingEvent::SeatReleased(_) => None,
        TicketingEvent::PaymentCompleted(envelope) => Some(BookingAction::PaymentCompleted {
            source_event_id: envelope.event_id.as_uuid(),
            booking_id: envelope.data.booking_id,
            external_reference: envelope.data.external_reference,
        }),
        TicketingEvent::PaymentFailed(envelope) => Some(BookingAction::PaymentFailed {
            source_event_id: envelope.event_id.as_uuid(),
            booking_id: envelope.data.booking_id,
            reason: envelope.data.reason,
        }),
        TicketingEvent::PaymentRefunded(envelope) => Some(BookingAction::PaymentRefunded {
            source_event_id: envelope.event_id.as_uuid(),
            booking_id: envelope.data.booking_id,
        }),
        _ => None,
    };

    if let Some(action) = action {
        let _handle = store.send(action).await;
    }
}
