//! Extension point for post-event-start cancellation rules.
//!
//! spec.md §4.4 leaves "can a `Confirmed` booking be cancelled after the
//! event has started" unanswered. Rather than guess at a rule, this is a
//! trait nothing implements by default: `BookingReducer` consults it only
//! when present, so the state machine is complete without it and a concrete
//! policy can be wired in later without touching the reducer.

use ticketwire_domain::ids::EventId;

use crate::types::Booking;

/// Decides whether a booking may still be cancelled by its user.
pub trait CancellationPolicy: Send + Sync {
    /// Returns `Ok(())` if `booking` may be cancelled right now, or an error
    /// message explaining why not.
    fn allow_cancellation(&self, booking: &Booking, event_id: &EventId) -> Result<(), String>;
}
