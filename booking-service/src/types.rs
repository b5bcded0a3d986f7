//! In-memory booking state and the status lattice from spec.md §4.4.

use chrono::{DateTime, Utc};
use ticketwire_domain::events::{BookingCancelReason, BookingItem};
use ticketwire_domain::ids::{BookingId, EventId, ReservationId, UserId};
use ticketwire_domain::money::Money;

/// Where a booking sits in its lifecycle.
///
/// Transitions are one-way: `Pending` is the only state with more than one
/// possible successor, and every terminal state (`Confirmed`'s
/// `Cancelled`/`Refunded` descendants aside) stays put once reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingStatus {
    /// Awaiting seat confirmation and payment.
    Pending,
    /// Seats held and payment captured.
    Confirmed,
    /// Seats released, payment never captured or refunded.
    Cancelled {
        /// Why the booking was cancelled.
        reason: BookingCancelReason,
    },
    /// `Pending` for longer than `expiry_date` allowed.
    Expired,
    /// A `Confirmed` booking whose payment was later refunded.
    Refunded,
}

/// A single booking and its accumulated lifecycle facts.
#[derive(Clone, Debug)]
pub struct Booking {
    /// This booking's id.
    pub booking_id: BookingId,
    /// The user who made the booking.
    pub user_id: UserId,
    /// The event being booked.
    pub event_id: EventId,
    /// Line items; `Σ items[].price * items[].quantity == total_amount` (I-4).
    pub items: Vec<BookingItem>,
    /// The total amount charged across all items.
    pub total_amount: Money,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// Reservation ids accumulated as `event.seat.reserved` arrives for each
    /// item. Populated incrementally; `confirm` requires every item to have
    /// a matching reservation.
    pub reservation_ids: Vec<ReservationId>,
    /// Set once `payment.completed` transitions this booking to `Confirmed`.
    pub booking_reference: Option<String>,
    /// After this instant a `Pending` booking auto-expires (I-5).
    pub expiry_date: DateTime<Utc>,
    /// When the booking was created.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Whether every line item has a matching reservation recorded.
    #[must_use]
    pub fn all_seats_reserved(&self) -> bool {
        self.reservation_ids.len() >= self.items.len()
    }
}

/// All bookings held by this service instance, replayed from the event
/// store's single `"booking"` stream at startup.
#[derive(Clone, Debug, Default)]
pub struct BookingState {
    /// Live bookings keyed by id.
    pub bookings: std::collections::HashMap<BookingId, Booking>,
    /// Ids of inbound bus events already applied, short-circuiting replays
    /// of `event.seat.*`/`payment.*` (spec.md §4.4: "The `(booking_id,
    /// event_id)` of inbound events is recorded in a processed-events table
    /// to short-circuit replays").
    pub processed_event_ids: std::collections::HashSet<uuid::Uuid>,
    /// The last validation failure, surfaced to callers inspecting state.
    pub last_error: Option<String>,
}

impl BookingState {
    /// An empty booking state, as held before any events have replayed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a booking with this id already exists.
    #[must_use]
    pub fn exists(&self, booking_id: &BookingId) -> bool {
        self.bookings.contains_key(booking_id)
    }

    /// Whether `event_id` has already been applied to this state.
    #[must_use]
    pub fn already_processed(&self, event_id: uuid::Uuid) -> bool {
        self.processed_event_ids.contains(&event_id)
    }

    /// Look up a booking by id.
    #[must_use]
    pub fn get(&self, booking_id: &BookingId) -> Option<&Booking> {
        self.bookings.get(booking_id)
    }

    /// All bookings belonging to a user, most recently created first.
    #[must_use]
    pub fn list_for_user(&self, user_id: &UserId) -> Vec<Booking> {
        let mut mine: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine
    }
}
