//! In-memory payment state and the status lattice from spec.md §4.5.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use ticketwire_domain::ids::{BookingId, PaymentId, UserId};
use ticketwire_domain::money::Money;

/// Where a payment sits in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Created, not yet sent to the provider.
    Pending,
    /// Authorization/capture in flight at the provider.
    Processing,
    /// Provider confirmed the charge.
    Completed,
    /// Provider declined or errored terminally.
    Failed,
    /// A `Completed` payment that was later refunded (I-8).
    Refunded,
    /// Cancelled while still `Pending`.
    Cancelled,
}

/// A single payment and its accumulated lifecycle facts.
#[derive(Clone, Debug)]
pub struct Payment {
    /// This payment's id.
    pub payment_id: PaymentId,
    /// The booking this payment pays for (I-7: exactly one booking per
    /// completed payment).
    pub booking_id: BookingId,
    /// The user being charged.
    pub user_id: UserId,
    /// The amount charged.
    pub amount: Money,
    /// Current lifecycle state.
    pub status: PaymentStatus,
    /// The provider's own reference for the charge, once captured.
    pub external_reference: Option<String>,
    /// A human-readable reason, set when `status == Failed`.
    pub failure_reason: Option<String>,
    /// When the payment completed (successfully or not).
    pub completed_at: Option<DateTime<Utc>>,
    /// When the payment record was created.
    pub created_at: DateTime<Utc>,
}

/// All payments held by this service instance.
#[derive(Clone, Debug, Default)]
pub struct PaymentState {
    /// Live payments keyed by id.
    pub payments: HashMap<PaymentId, Payment>,
    /// `booking_id -> payment_id`, the dedup index spec.md §4.5 calls for:
    /// both the pull path (consuming `booking.initiated`) and the push path
    /// (explicit HTTP POST) converge here, so at most one payment is ever
    /// created per booking regardless of which path wins the race.
    pub payment_for_booking: HashMap<BookingId, PaymentId>,
    /// `event_id`s of bus events already applied, so a redelivered
    /// `booking.initiated` does not create a second payment.
    pub processed_event_ids: HashSet<uuid::Uuid>,
    /// The last validation failure, surfaced to callers inspecting state.
    pub last_error: Option<String>,
}

impl PaymentState {
    /// An empty payment state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a payment by id.
    #[must_use]
    pub fn get(&self, payment_id: &PaymentId) -> Option<&Payment> {
        self.payments.get(payment_id)
    }

    /// Whether a payment already exists for this booking.
    #[must_use]
    pub fn exists_for_booking(&self, booking_id: &BookingId) -> bool {
        self.payment_for_booking.contains_key(booking_id)
    }

    /// Whether this bus event has already been applied.
    #[must_use]
    pub fn already_processed(&self, event_id: uuid::Uuid) -> bool {
        self.processed_event_ids.contains(&event_id)
    }
}
