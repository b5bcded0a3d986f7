//! `event.seat.reserved`/`event.seat.released` publishing with booking
//! attribution.
//!
//! `ticketwire_reservation_store::ReservationStore` publishes its own copy
//! of `event.seat.released` when it is built `with_event_bus`, but it has
//! no notion of a booking and always publishes `booking_id: None` (see
//! `domain::events::SeatReleased`'s doc comment). This service therefore
//! builds its store without an attached bus and publishes every event
//! itself, grounded on `reservation-store::store::publish_seat_released`'s
//! own envelope/topic shape.

use std::sync::Arc;

use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::{EventBus, EventBusError};
use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::{SeatReleaseReason, SeatReleased, SeatReserved};
use ticketwire_domain::ids::{BookingId, CorrelationId};
use ticketwire_reservation_store::Reservation;

/// Name this service publishes `event.*` under.
const SERVICE_NAME: &str = "event-service";

/// Publish `event.seat.reserved` for a freshly created reservation.
///
/// # Errors
///
/// Returns [`EventBusError`] if the bus publish fails.
pub async fn publish_seat_reserved(
    bus: &Arc<dyn EventBus>,
    reservation: &Reservation,
    booking_id: Option<BookingId>,
) -> Result<(), EventBusError> {
    let envelope = EventEnvelope::originate(
        "event.seat.reserved",
        SERVICE_NAME,
        CorrelationId::new(),
        SeatReserved {
            reservation_id: reservation.reservation_id,
            seat_id: reservation.seat_id,
            event_id: reservation.event_id,
            user_id: reservation.user_id,
            booking_id,
        },
    );
    publish(bus, "event.seat.reserved", &envelope).await
}

/// Publish `event.seat.released` for a reservation that was just released.
///
/// # Errors
///
/// Returns [`EventBusError`] if the bus publish fails.
pub async fn publish_seat_released(
    bus: &Arc<dyn EventBus>,
    reservation: &Reservation,
    reason: SeatReleaseReason,
    booking_id: Option<BookingId>,
) -> Result<(), EventBusError> {
    let envelope = EventEnvelope::originate(
        "event.seat.released",
        SERVICE_NAME,
        CorrelationId::new(),
        SeatReleased {
            reservation_id: reservation.reservation_id,
            seat_id: reservation.seat_id,
            event_id: reservation.event_id,
            reason,
            booking_id,
        },
    );
    publish(bus, "event.seat.released", &envelope).await
}

async fn publish<T: serde::Serialize>(
    bus: &Arc<dyn EventBus>,
    event_type: &str,
    envelope: &EventEnvelope<T>,
) -> Result<(), EventBusError> {
    let data = serde_json::to_vec(envelope)
        .map_err(|e| EventBusError::PublishFailed { topic: "event".to_string(), reason: e.to_string() })?;
    let event = SerializedEvent::new(event_type.to_string(), data, None);

    // Plain domain topic, not the dotted routing key: see
    // reservation-store::store::publish_seat_released for why.
    bus.publish("event", &event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use composable_rust_testing::mocks::InMemoryEventBus;
    use futures::StreamExt;
    use ticketwire_domain::ids::{EventId, ReservationId, SeatId, UserId};
    use ticketwire_domain::money::{Currency, Money};
    use ticketwire_reservation_store::ReservationStatus;

    fn reservation() -> Reservation {
        Reservation {
            reservation_id: ReservationId::new(),
            seat_id: SeatId::new(),
            event_id: EventId::new(),
            user_id: UserId::new(),
            status: ReservationStatus::Pending,
            reserved_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(15),
            reserved_price: Money::new(rust_decimal::Decimal::ZERO, Currency::USD),
            booking_reference: None,
        }
    }

    #[tokio::test]
    async fn seat_reserved_carries_booking_attribution() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::default());
        let mut stream = bus.subscribe(&["event"]).await.expect("subscribes");
        let booking_id = BookingId::new();
        let reservation = reservation();

        publish_seat_reserved(&bus, &reservation, Some(booking_id))
            .await
            .expect("publishes");

        let received = stream.next().await.expect("event delivered").expect("not an error");
        let envelope: EventEnvelope<SeatReserved> =
            serde_json::from_slice(&received.data).expect("decodes");
        assert_eq!(envelope.data.booking_id, Some(booking_id));
        assert_eq!(envelope.data.reservation_id, reservation.reservation_id);
    }

    #[tokio::test]
    async fn expiry_release_carries_no_booking_attribution() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::default());
        let mut stream = bus.subscribe(&["event"]).await.expect("subscribes");
        let reservation = reservation();

        publish_seat_released(&bus, &reservation, SeatReleaseReason::Expired, None)
            .await
            .expect("publishes");

        let received = stream.next().await.expect("event delivered").expect("not an error");
        let envelope: EventEnvelope<SeatReleased> =
            serde_json::from_slice(&received.data).expect("decodes");
        assert_eq!(envelope.data.booking_id, None);
        assert_eq!(envelope.data.reason, SeatReleaseReason::Expired);
    }
}
