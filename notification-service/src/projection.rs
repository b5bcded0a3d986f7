//! The notification read model: a `core::projection::Projection`
//! implementation keyed by `(user_id, event_id)` (spec.md §4.8), grounded
//! on `examples/ticketing/src/projections/customer_history_postgres.rs`'s
//! `PostgresCustomerHistoryProjection` shape (a thin `PgPool` wrapper
//! implementing `Projection::apply_event` via a `match` over the event
//! enum, persisting through its own store type rather than the
//! event-sourcing store).

use composable_rust_core::projection::{Projection, ProjectionError, Result};
use serde::Deserialize;
use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::{BookingCancelled, BookingConfirmed, PaymentFailed, TicketingEvent};

use crate::store::NotificationStore;
use crate::types::NotificationKind;

/// The subset of [`TicketingEvent`] this projection reacts to, narrowed to
/// a concrete enum rather than the full taxonomy since `Projection::Event`
/// requires `Deserialize` — `TicketingEvent` deliberately opts out of a
/// tagged-enum `Deserialize` impl in favor of `from_routing_key`'s
/// routing-key dispatch, so this projection owns a smaller type that can
/// satisfy the bound honestly.
#[derive(Clone, Debug, Deserialize)]
pub enum NotificationEvent {
    /// `booking.confirmed`
    BookingConfirmed(EventEnvelope<BookingConfirmed>),
    /// `booking.cancelled`
    BookingCancelled(EventEnvelope<BookingCancelled>),
    /// `payment.failed`
    PaymentFailed(EventEnvelope<PaymentFailed>),
}

impl NotificationEvent {
    /// Narrow a [`TicketingEvent`] down to the variants this projection
    /// cares about. Returns `None` for everything else, including
    /// `TicketingEvent::Unknown`.
    #[must_use]
    pub fn from_ticketing_event(event: TicketingEvent) -> Option<Self> {
        match event {
            TicketingEvent::BookingConfirmed(envelope) => Some(Self::BookingConfirmed(envelope)),
            TicketingEvent::BookingCancelled(envelope) => Some(Self::BookingCancelled(envelope)),
            TicketingEvent::PaymentFailed(envelope) => Some(Self::PaymentFailed(envelope)),
            _ => None,
        }
    }
}

/// Turns `booking.confirmed`/`booking.cancelled`/`payment.failed` into
/// persisted notification records.
pub struct NotificationProjection {
    store: NotificationStore,
}

impl NotificationProjection {
    /// Build a new projection over `store`.
    #[must_use]
    pub const fn new(store: NotificationStore) -> Self {
        Self { store }
    }
}

impl Projection for NotificationProjection {
    type Event = NotificationEvent;

    fn name(&self) -> &str {
        "notification"
    }

    async fn apply_event(&self, event: &Self::Event) -> Result<()> {
        let (user_id, source_event_id, kind, message) = match event {
            NotificationEvent::BookingConfirmed(envelope) => {
                let Some(user_id) = envelope.user_id else {
                    tracing::warn!(
                        booking_id = %envelope.data.booking_id,
                        "booking.confirmed carried no user_id, dropping notification"
                    );
                    return Ok(());
                };
                (
                    user_id,
                    envelope.event_id.as_uuid(),
                    NotificationKind::BookingConfirmed,
                    format!(
                        "Your booking {} is confirmed (reference {})",
                        envelope.data.booking_id, envelope.data.booking_reference
                    ),
                )
            }
            NotificationEvent::BookingCancelled(envelope) => {
                let Some(user_id) = envelope.user_id else {
                    tracing::warn!(
                        booking_id = %envelope.data.booking_id,
                        "booking.cancelled carried no user_id, dropping notification"
                    );
                    return Ok(());
                };
                (
                    user_id,
                    envelope.event_id.as_uuid(),
                    NotificationKind::BookingCancelled,
                    format!(
                        "Your booking {} was cancelled ({:?})",
                        envelope.data.booking_id, envelope.data.reason
                    ),
                )
            }
            NotificationEvent::PaymentFailed(envelope) => {
                let Some(user_id) = envelope.user_id else {
                    tracing::warn!(
                        payment_id = %envelope.data.payment_id,
                        "payment.failed carried no user_id, dropping notification"
                    );
                    return Ok(());
                };
                (
                    user_id,
                    envelope.event_id.as_uuid(),
                    NotificationKind::PaymentFailed,
                    format!(
                        "Payment for booking {} failed: {}",
                        envelope.data.booking_id, envelope.data.reason
                    ),
                )
            }
        };

        self.store
            .record_if_new(user_id, source_event_id, kind, message)
            .await
            .map_err(|e| ProjectionError::Storage(e.to_string()))?;
        Ok(())
    }
}
