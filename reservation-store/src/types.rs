//! Seat and reservation entities owned by this store.

use crate::error::ReservationError;
use chrono::{DateTime, Utc};
use ticketwire_domain::ids::{EventId, ReservationId, SeatId, SectionId, UserId};
use ticketwire_domain::money::Money;

/// The kind of seat, affecting its default price tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatType {
    /// A standard seat.
    Regular,
    /// A premium "very important person" seat.
    Vip,
    /// A premium seat, below VIP.
    Premium,
    /// A seat set aside for accessibility needs.
    Accessible,
}

impl SeatType {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Vip => "vip",
            Self::Premium => "premium",
            Self::Accessible => "accessible",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] if `s` doesn't match a known type.
    pub fn parse(s: &str) -> Result<Self, ReservationError> {
        match s {
            "regular" => Ok(Self::Regular),
            "vip" => Ok(Self::Vip),
            "premium" => Ok(Self::Premium),
            "accessible" => Ok(Self::Accessible),
            other => Err(ReservationError::Storage(format!("invalid seat type: {other}"))),
        }
    }
}

/// Current status of a seat.
///
/// `Blocked` is administrative (e.g. held back from sale); it never
/// transitions automatically to or from any other status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatStatus {
    /// Free to reserve.
    Available,
    /// Held by a pending or confirmed reservation.
    Reserved,
    /// Sold; the reservation that holds it is confirmed.
    Occupied,
    /// Administratively withheld from sale.
    Blocked,
}

impl SeatStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Occupied => "occupied",
            Self::Blocked => "blocked",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] if `s` doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, ReservationError> {
        match s {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "occupied" => Ok(Self::Occupied),
            "blocked" => Ok(Self::Blocked),
            other => Err(ReservationError::Storage(format!("invalid seat status: {other}"))),
        }
    }
}

/// A physical seat scoped to a single event occurrence.
///
/// Seats are recreated per event (the same physical chair in a venue is a
/// distinct `Seat` row for each event that uses it), so seat status is a
/// simple per-row field rather than needing a separate `(seat, event)`
/// join table — see `DESIGN.md` for why this resolves spec.md §3's
/// otherwise-ambiguous seat/event scoping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    /// The seat's id.
    pub seat_id: SeatId,
    /// The event this seat instance belongs to.
    pub event_id: EventId,
    /// The section the seat is in.
    pub section_id: SectionId,
    /// Row label within the section.
    pub row: String,
    /// Seat number within the row.
    pub number: String,
    /// The seat's type.
    pub seat_type: SeatType,
    /// Current status.
    pub status: SeatStatus,
}

/// Status of a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Held, awaiting confirmation before `expires_at`.
    Pending,
    /// Confirmed by a booking.
    Confirmed,
    /// TTL elapsed before confirmation.
    Expired,
    /// Explicitly released.
    Cancelled,
    /// Terminal, fully settled state after confirmation and payment.
    Completed,
}

impl ReservationStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] if `s` doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, ReservationError> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(ReservationError::Storage(format!(
                "invalid reservation status: {other}"
            ))),
        }
    }
}

/// A hold (or confirmed claim) on a single seat for a single event.
#[derive(Clone, Debug, PartialEq)]
pub struct Reservation {
    /// The reservation's id.
    pub reservation_id: ReservationId,
    /// The seat this reservation holds.
    pub seat_id: SeatId,
    /// The event the seat is reserved for.
    pub event_id: EventId,
    /// The user who holds the reservation.
    pub user_id: UserId,
    /// Current status.
    pub status: ReservationStatus,
    /// When the reservation was created.
    pub reserved_at: DateTime<Utc>,
    /// When a `PENDING` reservation lapses if not confirmed.
    pub expires_at: DateTime<Utc>,
    /// The price locked in at reservation time.
    pub reserved_price: Money,
    /// The booking reference this reservation was confirmed under, if any.
    pub booking_reference: Option<String>,
}

impl Reservation {
    /// Whether this reservation is logically expired right now, regardless
    /// of its stored `status` — spec.md §3 invariant I-3.
    #[must_use]
    pub fn is_logically_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at < now
    }
}
