//! The canonical event taxonomy carried on the bus.
//!
//! Each variant's payload shape is fixed and versioned; adding fields is
//! permitted, removing or renaming a field is a breaking change.

use crate::envelope::EventEnvelope;
use crate::ids::{BookingId, EventId, NotificationId, PaymentId, ReservationId, SeatId, UserId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Payload of `user.created`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserCreated {
    /// The id of the newly created user.
    pub user_id: UserId,
    /// The user's email address.
    pub email: String,
}

/// Payload of `event.created`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventCreated {
    /// The id of the newly created event.
    pub event_id: EventId,
    /// Human-readable event name.
    pub name: String,
}

/// Payload of `event.seat.reserved`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeatReserved {
    /// The reservation created for this seat.
    pub reservation_id: ReservationId,
    /// The reserved seat.
    pub seat_id: SeatId,
    /// The event the seat belongs to.
    pub event_id: EventId,
    /// The user the reservation was made for.
    pub user_id: UserId,
    /// The booking this reservation was made on behalf of, when the
    /// reservation was requested with booking context (the saga-driven and
    /// direct-API paths always know it).
    pub booking_id: Option<BookingId>,
}

/// Why a seat reservation was released, carried on `event.seat.released`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatReleaseReason {
    /// Released because the reservation's TTL elapsed before confirmation.
    Expired,
    /// Released because the owning booking was cancelled.
    Cancelled,
    /// Released because the owning payment was refunded.
    Refunded,
}

/// Payload of `event.seat.released`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeatReleased {
    /// The reservation that was released.
    pub reservation_id: ReservationId,
    /// The seat that became available again.
    pub seat_id: SeatId,
    /// The event the seat belongs to.
    pub event_id: EventId,
    /// Why the seat was released.
    pub reason: SeatReleaseReason,
    /// The booking the reservation belonged to, when known. The TTL
    /// sweep releases a reservation with no booking context at all
    /// (`booking_reference` is only recorded at confirmation, which a
    /// still-`Pending` reservation never reached), so this is `None` for
    /// `SeatReleaseReason::Expired` releases originating from the sweep.
    pub booking_id: Option<BookingId>,
}

/// A single line item of a booking, echoed on booking lifecycle events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingItem {
    /// The seat this line item reserves.
    pub seat_id: SeatId,
    /// The section the seat belongs to.
    pub section: String,
    /// The price of this single seat.
    pub price: Money,
    /// Number of seats this line item covers (always 1 for a seated booking,
    /// kept generic for future general-admission support).
    pub quantity: u32,
}

/// Payload of `booking.initiated`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingInitiated {
    /// The booking being created.
    pub booking_id: BookingId,
    /// The user making the booking.
    pub user_id: UserId,
    /// The event being booked.
    pub event_id: EventId,
    /// Line items of the booking.
    pub items: Vec<BookingItem>,
    /// The total amount across all items.
    pub total_amount: Money,
}

/// Payload of `booking.confirmed`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmed {
    /// The booking that was confirmed.
    pub booking_id: BookingId,
    /// The short human-readable reference shown to the user.
    pub booking_reference: String,
}

/// Why a booking was cancelled, carried on `booking.cancelled`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingCancelReason {
    /// The user explicitly cancelled the booking.
    UserRequested,
    /// Payment for the booking failed.
    PaymentFailed,
    /// A seat reservation could not be secured.
    SeatUnavailable,
}

/// Payload of `booking.cancelled`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingCancelled {
    /// The booking that was cancelled.
    pub booking_id: BookingId,
    /// Why it was cancelled.
    pub reason: BookingCancelReason,
}

/// Payload of `booking.expired`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BookingExpired {
    /// The booking that expired while still `PENDING`.
    pub booking_id: BookingId,
}

/// Payload of `payment.initiated`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentInitiated {
    /// The payment being created.
    pub payment_id: PaymentId,
    /// The booking this payment is for.
    pub booking_id: BookingId,
    /// The user making the payment.
    pub user_id: UserId,
    /// The amount to charge.
    pub amount: Money,
}

/// Payload of `payment.completed`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentCompleted {
    /// The payment that completed.
    pub payment_id: PaymentId,
    /// The booking this payment is for.
    pub booking_id: BookingId,
    /// The payment provider's own reference for this charge.
    pub external_reference: String,
}

/// Payload of `payment.failed`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentFailed {
    /// The payment that failed.
    pub payment_id: PaymentId,
    /// The booking this payment is for.
    pub booking_id: BookingId,
    /// A human-readable failure reason from the provider.
    pub reason: String,
}

/// Payload of `payment.refunded`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentRefunded {
    /// The payment that was refunded.
    pub payment_id: PaymentId,
    /// The booking this payment was for.
    pub booking_id: BookingId,
}

/// Payload of `notification.email`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NotificationEmail {
    /// The notification being materialized.
    pub notification_id: NotificationId,
    /// The user the email is addressed to.
    pub user_id: UserId,
    /// Template identifier, e.g. `"booking_confirmed"`.
    pub template: String,
}

/// The full event taxonomy, one variant per `event_type` on the bus.
///
/// Deserialization is driven by the envelope's `event_type` string rather
/// than an internally tagged `serde` enum, because the wire format is the
/// envelope (see [`crate::envelope::EventEnvelope`]) with the payload typed
/// per `event_type`; an `event_type` this build doesn't recognize yet
/// becomes [`TicketingEvent::Unknown`] rather than a deserialization error,
/// so older producers and newer consumers can coexist on the same bus.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum TicketingEvent {
    /// `user.created`
    UserCreated(EventEnvelope<UserCreated>),
    /// `event.created`
    EventCreated(EventEnvelope<EventCreated>),
    /// `event.seat.reserved`
    SeatReserved(EventEnvelope<SeatReserved>),
    /// `event.seat.released`
    SeatReleased(EventEnvelope<SeatReleased>),
    /// `booking.initiated`
    BookingInitiated(EventEnvelope<BookingInitiated>),
    /// `booking.confirmed`
    BookingConfirmed(EventEnvelope<BookingConfirmed>),
    /// `booking.cancelled`
    BookingCancelled(EventEnvelope<BookingCancelled>),
    /// `booking.expired`
    BookingExpired(EventEnvelope<BookingExpired>),
    /// `payment.initiated`
    PaymentInitiated(EventEnvelope<PaymentInitiated>),
    /// `payment.completed`
    PaymentCompleted(EventEnvelope<PaymentCompleted>),
    /// `payment.failed`
    PaymentFailed(EventEnvelope<PaymentFailed>),
    /// `payment.refunded`
    PaymentRefunded(EventEnvelope<PaymentRefunded>),
    /// `notification.email`
    NotificationEmail(EventEnvelope<NotificationEmail>),
    /// An `event_type` this build does not recognize. Consumers must log
    /// and drop rather than panic, so newer producers never take down
    /// older consumers.
    Unknown {
        /// The raw, unparsed JSON body as received off the bus.
        raw: serde_json::Value,
    },
}

impl TicketingEvent {
    /// The dotted routing key this event was (or would be) published under.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::UserCreated(e) => &e.event_type,
            Self::EventCreated(e) => &e.event_type,
            Self::SeatReserved(e) => &e.event_type,
            Self::SeatReleased(e) => &e.event_type,
            Self::BookingInitiated(e) => &e.event_type,
            Self::BookingConfirmed(e) => &e.event_type,
            Self::BookingCancelled(e) => &e.event_type,
            Self::BookingExpired(e) => &e.event_type,
            Self::PaymentInitiated(e) => &e.event_type,
            Self::PaymentCompleted(e) => &e.event_type,
            Self::PaymentFailed(e) => &e.event_type,
            Self::PaymentRefunded(e) => &e.event_type,
            Self::NotificationEmail(e) => &e.event_type,
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Parse a raw JSON body plus its routing key into a typed event.
    ///
    /// Returns `Ok(TicketingEvent::Unknown { .. })`, never an error, when
    /// `event_type` is not one this build recognizes — callers that want to
    /// reject unrecognized events entirely should match on `Unknown`
    /// themselves rather than relying on this to fail.
    ///
    /// # Errors
    ///
    /// Returns an error if `event_type` is recognized but `raw` does not
    /// deserialize into that type's envelope shape (a malformed payload,
    /// distinct from an unrecognized type).
    pub fn from_routing_key(
        event_type: &str,
        raw: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        macro_rules! parse {
            ($variant:ident) => {
                Ok(Self::$variant(serde_json::from_value(raw)?))
            };
        }

        match event_type {
            "user.created" => parse!(UserCreated),
            "event.created" => parse!(EventCreated),
            "event.seat.reserved" => parse!(SeatReserved),
            "event.seat.released" => parse!(SeatReleased),
            "booking.initiated" => parse!(BookingInitiated),
            "booking.confirmed" => parse!(BookingConfirmed),
            "booking.cancelled" => parse!(BookingCancelled),
            "booking.expired" => parse!(BookingExpired),
            "payment.initiated" => parse!(PaymentInitiated),
            "payment.completed" => parse!(PaymentCompleted),
            "payment.failed" => parse!(PaymentFailed),
            "payment.refunded" => parse!(PaymentRefunded),
            "notification.email" => parse!(NotificationEmail),
            _ => Ok(Self::Unknown { raw }),
        }
    }
}
