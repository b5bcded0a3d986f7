//! The booking state machine (spec.md §4.4): commands, domain events, the
//! pure reducer, and the side-effect environment it is executed against.

use std::sync::Arc;

use chrono::{Duration, Utc};
use composable_rust_core::environment::Clock;
use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::EventBus;
use composable_rust_core::event_store::EventStore;
use composable_rust_core::reducer::Reducer;
use composable_rust_core::stream::StreamId;
use composable_rust_core::{append_events, delay, effect::Effect, publish_event};
use composable_rust_macros::Action;
use serde::{Deserialize, Serialize};

use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::{
    BookingCancelReason, BookingCancelled, BookingConfirmed, BookingExpired, BookingInitiated,
    BookingItem,
};
use ticketwire_domain::ids::{BookingId, CorrelationId, EventId, ReservationId, SeatId, UserId};
use ticketwire_domain::money::Money;

use crate::cancellation_policy::CancellationPolicy;
use crate::types::{Booking, BookingState, BookingStatus};

const SERVICE_NAME: &str = "booking-service";

/// How long a `Pending` booking has to confirm before it auto-expires
/// (spec.md §4.4's expiry timer).
const BOOKING_TTL_MINUTES: i64 = 15;

/// One requested line item, as submitted on `CreateBooking`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingItemRequest {
    /// The seat requested.
    pub seat_id: SeatId,
    /// The section the seat belongs to.
    pub section: String,
    /// The price quoted for this seat.
    pub price: Money,
}

/// Commands and events processed by [`BookingReducer`].
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum BookingAction {
    /// Command: create a new booking and kick off seat reservation.
    #[command]
    CreateBooking {
        /// Id to assign the new booking.
        booking_id: BookingId,
        /// The user making the booking.
        user_id: UserId,
        /// The event being booked.
        event_id: EventId,
        /// Requested line items.
        items: Vec<BookingItemRequest>,
        /// Correlation id for request tracing.
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation_id: Option<CorrelationId>,
    },

    /// Command: the user cancels a booking that has not yet been refunded.
    #[command]
    CancelBooking {
        /// The booking to cancel.
        booking_id: BookingId,
    },

    /// Command: the expiry timer scheduled by `CreateBooking` fired.
    #[command]
    ExpireBooking {
        /// The booking whose hold may have lapsed.
        booking_id: BookingId,
    },

    /// Event: a seat for this booking was reserved by the reservation store.
    /// Carries the originating bus event's id so redelivery (at-least-once)
    /// is recognized and ignored (spec.md §4.4).
    #[event]
    SeatReserved {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking the seat belongs to.
        booking_id: BookingId,
        /// The reservation created for the seat.
        reservation_id: ReservationId,
        /// The reserved seat.
        seat_id: SeatId,
    },

    /// Event: seat reservation for this booking could not be completed.
    #[event]
    SeatReservationFailed {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking whose seats could not be held.
        booking_id: BookingId,
        /// Why reservation failed.
        reason: String,
    },

    /// Event: payment for this booking completed.
    #[event]
    PaymentCompleted {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking that was paid for.
        booking_id: BookingId,
        /// The payment provider's reference for the charge.
        external_reference: String,
    },

    /// Event: payment for this booking failed.
    #[event]
    PaymentFailed {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking whose payment failed.
        booking_id: BookingId,
        /// A human-readable failure reason.
        reason: String,
    },

    /// Event: a previously completed payment for this booking was refunded.
    #[event]
    PaymentRefunded {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking whose payment was refunded.
        booking_id: BookingId,
    },

    /// Event: the booking was created (self-originated, persisted+published).
    #[event]
    BookingInitiatedEvent {
        /// The booking that was created.
        booking_id: BookingId,
        /// The user making the booking.
        user_id: UserId,
        /// The event being booked.
        event_id: EventId,
        /// Line items of the booking.
        items: Vec<BookingItemRequest>,
        /// The total amount across all items.
        total_amount: Money,
        /// When the hold on these seats expires if unconfirmed.
        expiry_date: chrono::DateTime<Utc>,
        /// When the booking was created.
        created_at: chrono::DateTime<Utc>,
    },

    /// Event: the booking reached `Confirmed` (self-originated).
    #[event]
    BookingConfirmedEvent {
        /// The booking that was confirmed.
        booking_id: BookingId,
        /// The short human-readable reference shown to the user.
        booking_reference: String,
    },

    /// Event: the booking was cancelled (self-originated).
    #[event]
    BookingCancelledEvent {
        /// The booking that was cancelled.
        booking_id: BookingId,
        /// Why it was cancelled.
        reason: BookingCancelReason,
    },

    /// Event: the booking expired while still `Pending` (self-originated).
    #[event]
    BookingExpiredEvent {
        /// The booking that expired.
        booking_id: BookingId,
    },

    /// Event: a command or transition was rejected.
    #[event]
    ValidationFailed {
        /// The booking the failure pertains to, if known.
        booking_id: Option<BookingId>,
        /// The failure message.
        error: String,
    },
}

/// Side-effect dependencies for [`BookingReducer`].
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for timestamps and expiry calculation.
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence of booking events.
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing booking lifecycle events.
    pub event_bus: Arc<dyn EventBus>,
    /// The single stream every booking's events are appended to.
    pub stream_id: StreamId,
    /// Optional hook deciding whether a `Confirmed` booking may still be
    /// cancelled; `None` means the default rule (always allowed before
    /// refund) applies.
    pub cancellation_policy: Option<Arc<dyn CancellationPolicy>>,
}

impl BookingEnvironment {
    /// Build a new environment over the shared `"booking"` event stream.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new("booking"),
            cancellation_policy: None,
        }
    }

    /// Attach a cancellation policy.
    #[must_use]
    pub fn with_cancellation_policy(mut self, policy: Arc<dyn CancellationPolicy>) -> Self {
        self.cancellation_policy = Some(policy);
        self
    }
}

/// The booking lifecycle reducer.
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist (bincode, to the event store) and publish (JSON, to the bus)
    /// a self-originated booking event.
    fn create_effects(
        event: &BookingAction,
        env: &BookingEnvironment,
        topic: &'static str,
        envelope_json: serde_json::Value,
    ) -> Vec<Effect<BookingAction>> {
        let Ok(data) = bincode::serialize(event) else {
            return vec![Effect::None];
        };
        let store_event = SerializedEvent::new(event.event_type().to_string(), data, None);
        let bus_event = SerializedEvent::new(
            envelope_json
                .get("event_type")
                .and_then(|v| v.as_str())
                .unwrap_or(event.event_type())
                .to_string(),
            serde_json::to_vec(&envelope_json).unwrap_or_default(),
            None,
        );

        vec![
            append_events! {
                store: env.event_store,
                stream: env.stream_id.as_str(),
                expected_version: None,
                events: vec![store_event],
                on_success: |_version| None,
                on_error: |error| Some(BookingAction::ValidationFailed {
                    booking_id: None,
                    error: error.to_string(),
                })
            },
            publish_event! {
                bus: env.event_bus,
                topic: topic,
                event: bus_event,
                on_success: || None,
                on_error: |error| Some(BookingAction::ValidationFailed {
                    booking_id: None,
                    error: error.to_string(),
                })
            },
        ]
    }

    fn validate_create(state: &BookingState, booking_id: &BookingId, items: &[BookingItemRequest]) -> Result<(), String> {
        if state.exists(booking_id) {
            return Err(format!("booking {booking_id} already exists"));
        }
        if items.is_empty() {
            return Err("a booking must contain at least one item".to_string());
        }
        Ok(())
    }

    fn apply_event(state: &mut BookingState, action: &BookingAction) {
        match action {
            BookingAction::BookingInitiatedEvent {
                booking_id,
                user_id,
                event_id,
                items,
                total_amount,
                expiry_date,
                created_at,
            } => {
                let booking = Booking {
                    booking_id: *booking_id,
                    user_id: *user_id,
                    event_id: *event_id,
                    items: items
                        .iter()
                        .map(|i| BookingItem {
                            seat_id: i.seat_id,
                            section: i.section.clone(),
                            price: i.price,
                            quantity: 1,
                        })
                        .collect(),
                    total_amount: *total_amount,
                    status: BookingStatus::Pending,
                    reservation_ids: Vec::new(),
                    booking_reference: None,
                    expiry_date: *expiry_date,
                    created_at: *created_at,
                };
                state.bookings.insert(*booking_id, booking);
                state.last_error = None;
            }
            BookingAction::SeatReserved {
                source_event_id,
                booking_id,
                reservation_id,
                ..
            } => {
                if let Some(b) = state.bookings.get_mut(booking_id) {
                    if matches!(b.status, BookingStatus::Pending)
                        && !b.reservation_ids.contains(reservation_id)
                    {
                        b.reservation_ids.push(*reservation_id);
                    }
                }
                state.processed_event_ids.insert(*source_event_id);
                state.last_error = None;
            }
            BookingAction::BookingConfirmedEvent {
                booking_id,
                booking_reference,
            } => {
                if let Some(b) = state.bookings.get_mut(booking_id) {
                    b.status = BookingStatus::Confirmed;
                    b.booking_reference = Some(booking_reference.clone());
                }
                state.last_error = None;
            }
            BookingAction::BookingCancelledEvent { booking_id, reason } => {
                if let Some(b) = state.bookings.get_mut(booking_id) {
                    b.status = BookingStatus::Cancelled { reason: *reason };
                }
                state.last_error = None;
            }
            BookingAction::BookingExpiredEvent { booking_id } => {
                if let Some(b) = state.bookings.get_mut(booking_id) {
                    b.status = BookingStatus::Expired;
                }
                state.last_error = None;
            }
            BookingAction::PaymentRefunded { source_event_id, booking_id } => {
                if let Some(b) = state.bookings.get_mut(booking_id) {
                    if matches!(b.status, BookingStatus::Cancelled { .. }) {
                        b.status = BookingStatus::Refunded;
                    }
                }
                state.processed_event_ids.insert(*source_event_id);
                state.last_error = None;
            }
            BookingAction::ValidationFailed { error, .. } => {
                state.last_error = Some(error.clone());
            }
            BookingAction::CreateBooking { .. }
            | BookingAction::CancelBooking { .. }
            | BookingAction::ExpireBooking { .. }
            | BookingAction::SeatReservationFailed { .. }
            | BookingAction::PaymentCompleted { .. }
            | BookingAction::PaymentFailed { .. } => {}
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Vec<Effect<Self::Action>> {
        match action {
            // (—, HTTP Create, items valid ∧ total = Σitems) → PENDING
            BookingAction::CreateBooking {
                booking_id,
                user_id,
                event_id,
                items,
                correlation_id,
            } => {
                if let Err(error) = Self::validate_create(state, &booking_id, &items) {
                    let failed = BookingAction::ValidationFailed {
                        booking_id: Some(booking_id),
                        error,
                    };
                    Self::apply_event(state, &failed);
                    return vec![Effect::None];
                }

                let total_amount = items
                    .iter()
                    .fold(Money::new(rust_decimal::Decimal::ZERO, items[0].price.currency()), |acc, i| {
                        acc.checked_add(i.price).unwrap_or(acc)
                    });

                let now = env.clock.now();
                let expiry_date = now + Duration::minutes(BOOKING_TTL_MINUTES);

                let initiated = BookingAction::BookingInitiatedEvent {
                    booking_id,
                    user_id,
                    event_id,
                    items: items.clone(),
                    total_amount,
                    expiry_date,
                    created_at: now,
                };
                Self::apply_event(state, &initiated);

                let cid = correlation_id.unwrap_or_else(CorrelationId::new);
                let envelope = EventEnvelope::originate(
                    "booking.initiated",
                    SERVICE_NAME,
                    cid,
                    BookingInitiated {
                        booking_id,
                        user_id,
                        event_id,
                        items: items
                            .iter()
                            .map(|i| BookingItem {
                                seat_id: i.seat_id,
                                section: i.section.clone(),
                                price: i.price,
                                quantity: 1,
                            })
                            .collect(),
                        total_amount,
                    },
                );
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();

                let mut effects = Self::create_effects(&initiated, env, "booking", envelope_json);

                effects.push(delay! {
                    duration: std::time::Duration::from_secs(u64::try_from(BOOKING_TTL_MINUTES * 60).unwrap_or(900)),
                    action: BookingAction::ExpireBooking { booking_id }
                });

                effects
            }

            // (PENDING, event.seat.reserved all items) → PENDING (partial ok)
            BookingAction::SeatReserved {
                source_event_id,
                booking_id,
                reservation_id,
                seat_id,
            } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                let event = BookingAction::SeatReserved {
                    source_event_id,
                    booking_id,
                    reservation_id,
                    seat_id,
                };
                Self::apply_event(state, &event);
                vec![Effect::None]
            }

            BookingAction::SeatReservationFailed {
                source_event_id,
                booking_id,
                reason,
            } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                state.processed_event_ids.insert(source_event_id);
                if let Some(b) = state.bookings.get(&booking_id) {
                    if matches!(b.status, BookingStatus::Pending) {
                        let user_id = b.user_id;
                        let cancelled = BookingAction::BookingCancelledEvent {
                            booking_id,
                            reason: BookingCancelReason::SeatUnavailable,
                        };
                        Self::apply_event(state, &cancelled);
                        tracing::warn!(%booking_id, %reason, "seat reservation failed, cancelling booking");
                        return Self::publish_cancelled(booking_id, user_id, BookingCancelReason::SeatUnavailable, env);
                    }
                }
                vec![Effect::None]
            }

            // (PENDING, payment.completed, reservations confirmable) → CONFIRMED
            BookingAction::PaymentCompleted {
                source_event_id,
                booking_id,
                external_reference,
            } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                state.processed_event_ids.insert(source_event_id);
                let Some(b) = state.bookings.get(&booking_id) else {
                    return vec![Effect::None];
                };
                if !matches!(b.status, BookingStatus::Pending) || !b.all_seats_reserved() {
                    return vec![Effect::None];
                }
                if env.clock.now() >= b.expiry_date {
                    // The timer wins even if it hasn't been dispatched as an
                    // `ExpireBooking` action yet: a payment that clears after
                    // the wall clock has already passed expiry is a no-op.
                    tracing::info!(%booking_id, %external_reference, "payment completed after expiry, ignoring");
                    let expired = BookingAction::BookingExpiredEvent { booking_id };
                    Self::apply_event(state, &expired);

                    let envelope = EventEnvelope::originate(
                        "booking.expired",
                        SERVICE_NAME,
                        CorrelationId::new(),
                        BookingExpired { booking_id },
                    );
                    let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                    return Self::create_effects(&expired, env, "booking", envelope_json);
                }
                let user_id = b.user_id;

                let booking_reference = short_reference(&booking_id);
                let confirmed = BookingAction::BookingConfirmedEvent {
                    booking_id,
                    booking_reference: booking_reference.clone(),
                };
                Self::apply_event(state, &confirmed);

                let envelope = EventEnvelope::originate(
                    "booking.confirmed",
                    SERVICE_NAME,
                    CorrelationId::new(),
                    BookingConfirmed {
                        booking_id,
                        booking_reference,
                    },
                )
                .with_user(user_id);
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                let mut effects = Self::create_effects(&confirmed, env, "booking", envelope_json);
                tracing::info!(%booking_id, %external_reference, "booking confirmed");
                effects.push(Effect::None);
                effects
            }

            // (PENDING, payment.failed) → CANCELLED, reason=payment_failed
            BookingAction::PaymentFailed {
                source_event_id,
                booking_id,
                reason,
            } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                state.processed_event_ids.insert(source_event_id);
                let Some(b) = state.bookings.get(&booking_id) else {
                    return vec![Effect::None];
                };
                if !matches!(b.status, BookingStatus::Pending) {
                    return vec![Effect::None];
                }
                let user_id = b.user_id;
                tracing::warn!(%booking_id, %reason, "payment failed, cancelling booking");
                let cancelled = BookingAction::BookingCancelledEvent {
                    booking_id,
                    reason: BookingCancelReason::PaymentFailed,
                };
                Self::apply_event(state, &cancelled);
                Self::publish_cancelled(booking_id, user_id, BookingCancelReason::PaymentFailed, env)
            }

            // (PENDING, expiry timer, now > expiry_date) → EXPIRED
            BookingAction::ExpireBooking { booking_id } => {
                let Some(b) = state.bookings.get(&booking_id) else {
                    return vec![Effect::None];
                };
                if !matches!(b.status, BookingStatus::Pending) || env.clock.now() < b.expiry_date {
                    return vec![Effect::None];
                }
                let expired = BookingAction::BookingExpiredEvent { booking_id };
                Self::apply_event(state, &expired);

                let envelope = EventEnvelope::originate(
                    "booking.expired",
                    SERVICE_NAME,
                    CorrelationId::new(),
                    BookingExpired { booking_id },
                );
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                Self::create_effects(&expired, env, "booking", envelope_json)
            }

            // (CONFIRMED, user cancel, policy permits) → CANCELLED
            BookingAction::CancelBooking { booking_id } => {
                let Some(b) = state.bookings.get(&booking_id) else {
                    return vec![Effect::None];
                };
                let user_id = b.user_id;
                if !matches!(b.status, BookingStatus::Confirmed | BookingStatus::Pending) {
                    let failed = BookingAction::ValidationFailed {
                        booking_id: Some(booking_id),
                        error: "booking cannot be cancelled from its current state".to_string(),
                    };
                    Self::apply_event(state, &failed);
                    return vec![Effect::None];
                }
                if let Some(policy) = &env.cancellation_policy {
                    if let Err(error) = policy.allow_cancellation(b, &b.event_id) {
                        let failed = BookingAction::ValidationFailed {
                            booking_id: Some(booking_id),
                            error,
                        };
                        Self::apply_event(state, &failed);
                        return vec![Effect::None];
                    }
                }
                let cancelled = BookingAction::BookingCancelledEvent {
                    booking_id,
                    reason: BookingCancelReason::UserRequested,
                };
                Self::apply_event(state, &cancelled);
                Self::publish_cancelled(booking_id, user_id, BookingCancelReason::UserRequested, env)
            }

            BookingAction::PaymentRefunded { source_event_id, booking_id } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                Self::apply_event(
                    state,
                    &BookingAction::PaymentRefunded { source_event_id, booking_id },
                );
                vec![Effect::None]
            }

            // Other events apply to state but issue no further effects.
            event => {
                Self::apply_event(state, &event);
                vec![Effect::None]
            }
        }
    }
}

fn short_reference(booking_id: &BookingId) -> String {
    let raw = booking_id.as_uuid().simple().to_string();
    format!("BK-{}", raw[..8].to_uppercase())
}

impl BookingReducer {
    fn publish_cancelled(
        booking_id: BookingId,
        user_id: UserId,
        reason: BookingCancelReason,
        env: &BookingEnvironment,
    ) -> Vec<Effect<BookingAction>> {
        let event = BookingAction::BookingCancelledEvent { booking_id, reason };
        let envelope = EventEnvelope::originate(
            "booking.cancelled",
            SERVICE_NAME,
            CorrelationId::new(),
            BookingCancelled { booking_id, reason },
        )
        .with_user(user_id);
        let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
        Self::create_effects(&event, env, "booking", envelope_json)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use composable_rust_testing::mocks::{test_clock, InMemoryEventBus, InMemoryEventStore};
    use ticketwire_domain::ids::{EventId, SeatId, UserId};
    use ticketwire_domain::money::{Currency, Money};

    use super::*;

    fn test_env() -> BookingEnvironment {
        BookingEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(InMemoryEventStore::default()),
            Arc::new(InMemoryEventBus::default()),
        )
    }

    fn item(price: Money) -> BookingItemRequest {
        BookingItemRequest {
            seat_id: SeatId::new(),
            section: "GA".to_string(),
            price,
        }
    }

    fn create_booking(state: &mut BookingState, env: &BookingEnvironment, booking_id: BookingId, items: Vec<BookingItemRequest>) {
        let reducer = BookingReducer::new();
        let _effects = reducer.reduce(
            state,
            BookingAction::CreateBooking {
                booking_id,
                user_id: UserId::new(),
                event_id: EventId::new(),
                items,
                correlation_id: None,
            },
            env,
        );
    }

    #[test]
    fn seat_reserved_redelivery_is_ignored() {
        let env = test_env();
        let reducer = BookingReducer::new();
        let mut state = BookingState::new();
        let booking_id = BookingId::new();
        let price = Money::new(rust_decimal::Decimal::from(50), Currency::USD);
        create_booking(&mut state, &env, booking_id, vec![item(price)]);

        let reservation_id = ReservationId::new();
        let source_event_id = uuid::Uuid::new_v4();
        let seat_reserved = BookingAction::SeatReserved {
            source_event_id,
            booking_id,
            reservation_id,
            seat_id: SeatId::new(),
        };

        reducer.reduce(&mut state, seat_reserved.clone(), &env);
        reducer.reduce(&mut state, seat_reserved, &env);

        let booking = state.get(&booking_id).expect("booking exists");
        assert_eq!(booking.reservation_ids.len(), 1);
    }

    #[test]
    fn payment_completed_twice_confirms_only_once() {
        let env = test_env();
        let reducer = BookingReducer::new();
        let mut state = BookingState::new();
        let booking_id = BookingId::new();
        let price = Money::new(rust_decimal::Decimal::from(50), Currency::USD);
        create_booking(&mut state, &env, booking_id, vec![item(price)]);

        let reservation_id = ReservationId::new();
        reducer.reduce(
            &mut state,
            BookingAction::SeatReserved {
                source_event_id: uuid::Uuid::new_v4(),
                booking_id,
                reservation_id,
                seat_id: SeatId::new(),
            },
            &env,
        );

        let source_event_id = uuid::Uuid::new_v4();
        let payment_completed = BookingAction::PaymentCompleted {
            source_event_id,
            booking_id,
            external_reference: "charge_123".to_string(),
        };

        let first = reducer.reduce(&mut state, payment_completed.clone(), &env);
        assert!(matches!(state.get(&booking_id).unwrap().status, BookingStatus::Confirmed));
        assert!(!first.is_empty());

        let second = reducer.reduce(&mut state, payment_completed, &env);
        assert!(matches!(second.as_slice(), [Effect::None]));
        assert!(matches!(state.get(&booking_id).unwrap().status, BookingStatus::Confirmed));
    }

    #[test]
    fn payment_failed_cancels_a_pending_booking() {
        let env = test_env();
        let reducer = BookingReducer::new();
        let mut state = BookingState::new();
        let booking_id = BookingId::new();
        let price = Money::new(rust_decimal::Decimal::from(50), Currency::USD);
        create_booking(&mut state, &env, booking_id, vec![item(price)]);

        reducer.reduce(
            &mut state,
            BookingAction::PaymentFailed {
                source_event_id: uuid::Uuid::new_v4(),
                booking_id,
                reason: "card declined".to_string(),
            },
            &env,
        );

        assert!(matches!(
            state.get(&booking_id).unwrap().status,
            BookingStatus::Cancelled { reason: BookingCancelReason::PaymentFailed }
        ));
    }

    #[test]
    fn payment_refunded_redelivery_is_ignored() {
        let env = test_env();
        let reducer = BookingReducer::new();
        let mut state = BookingState::new();
        let booking_id = BookingId::new();
        let price = Money::new(rust_decimal::Decimal::from(50), Currency::USD);
        create_booking(&mut state, &env, booking_id, vec![item(price)]);

        reducer.reduce(&mut state, BookingAction::CancelBooking { booking_id }, &env);
        assert!(matches!(
            state.get(&booking_id).unwrap().status,
            BookingStatus::Cancelled { reason: BookingCancelReason::UserRequested }
        ));

        let source_event_id = uuid::Uuid::new_v4();
        let refunded = BookingAction::PaymentRefunded { source_event_id, booking_id };
        reducer.reduce(&mut state, refunded.clone(), &env);
        assert!(matches!(state.get(&booking_id).unwrap().status, BookingStatus::Refunded));

        let second = reducer.reduce(&mut state, refunded, &env);
        assert!(matches!(second.as_slice(), [Effect::None]));
        assert!(matches!(state.get(&booking_id).unwrap().status, BookingStatus::Refunded));
    }
}
