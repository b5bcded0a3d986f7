//! The seat reservation store: availability queries, atomic multi-seat
//! reservation, confirmation, release, and a background expiry sweep.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE seats (
//!     seat_id    UUID PRIMARY KEY,
//!     event_id   UUID NOT NULL,
//!     section_id UUID NOT NULL,
//!     row        TEXT NOT NULL,
//!     number     TEXT NOT NULL,
//!     seat_type  TEXT NOT NULL,
//!     status     TEXT NOT NULL,
//!     UNIQUE (event_id, section_id, row, number)
//! );
//!
//! CREATE TABLE reservations (
//!     reservation_id    UUID PRIMARY KEY,
//!     seat_id           UUID NOT NULL REFERENCES seats(seat_id),
//!     event_id          UUID NOT NULL,
//!     user_id           UUID NOT NULL,
//!     status            TEXT NOT NULL,
//!     reserved_at       TIMESTAMPTZ NOT NULL,
//!     expires_at        TIMESTAMPTZ NOT NULL,
//!     reserved_price    NUMERIC NOT NULL,
//!     currency          TEXT NOT NULL,
//!     booking_reference TEXT
//! );
//! ```

use crate::error::ReservationError;
use crate::types::{Reservation, ReservationStatus, SeatStatus};
use chrono::{DateTime, Utc};
use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::EventBus;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::{SeatReleaseReason, SeatReleased};
use ticketwire_domain::ids::{CorrelationId, EventId, ReservationId, SeatId, UserId};
use ticketwire_domain::money::{Currency, Money};

/// Name this store publishes `event.seat.released` under.
const SERVICE_NAME: &str = "reservation-store";

async fn publish_seat_released(
    bus: &Arc<dyn EventBus>,
    reservation: &Reservation,
    reason: SeatReleaseReason,
) -> Result<(), ReservationError> {
    let envelope = EventEnvelope::originate(
        "event.seat.released",
        SERVICE_NAME,
        CorrelationId::new(),
        SeatReleased {
            reservation_id: reservation.reservation_id,
            seat_id: reservation.seat_id,
            event_id: reservation.event_id,
            reason,
            // reservation-store only knows a booking_reference once a
            // reservation has been confirmed, which a released hold never
            // reaches; booking attribution for the explicit-release path is
            // published separately by whatever issued the release.
            booking_id: None,
        },
    );
    let data = serde_json::to_vec(&envelope).map_err(|e| ReservationError::Storage(e.to_string()))?;
    let event = SerializedEvent::new("event.seat.released".to_string(), data, None);

    // Published on the plain "event" domain topic, not the dotted routing
    // key: AmqpEventBus resolves the exchange from the fixed per-service
    // binding table at connect time, and every in-process consumer (see
    // booking-service::consumer) subscribes by domain word, dispatching on
    // the envelope's own `event_type` rather than the topic string.
    bus.publish("event", &event)
        .await
        .map_err(|e| ReservationError::Storage(e.to_string()))
}

/// Availability of a single seat, as reported by [`ReservationStore::check_availability`].
///
/// Advisory only: a `true` result can still lose a race to
/// [`ReservationStore::reserve`], whose transaction is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeatAvailability {
    /// The seat being queried.
    pub seat_id: SeatId,
    /// Whether the seat appears reservable right now.
    pub available: bool,
}

/// `PostgreSQL`-backed seat reservation store.
pub struct ReservationStore {
    pool: PgPool,
    bus: Option<Arc<dyn EventBus>>,
}

impl ReservationStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool, bus: None }
    }

    /// Attach an event bus so `release` and the expiry sweep can publish
    /// `event.seat.released`.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Check seat availability without holding any lock.
    ///
    /// A seat is available iff its stored status is `AVAILABLE` and no
    /// `PENDING`/`CONFIRMED` reservation exists for it. The result is
    /// advisory; callers must still handle [`ReservationError::SeatConflict`]
    /// from [`Self::reserve`].
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] if the query fails.
    pub async fn check_availability(
        &self,
        event_id: EventId,
        seat_ids: &[SeatId],
    ) -> Result<Vec<SeatAvailability>, ReservationError> {
        let ids: Vec<uuid::Uuid> = seat_ids.iter().map(|id| id.as_uuid()).collect();

        let rows = sqlx::query(
            r"
            SELECT seat_id, status
            FROM seats
            WHERE event_id = $1 AND seat_id = ANY($2)
            ",
        )
        .bind(event_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(seat_ids.len());
        for row in &rows {
            let seat_id: uuid::Uuid = row.try_get("seat_id")?;
            let status_str: String = row.try_get("status")?;
            let status = SeatStatus::parse(&status_str)?;
            result.push(SeatAvailability {
                seat_id: SeatId::from(seat_id),
                available: status == SeatStatus::Available,
            });
        }
        Ok(result)
    }

    /// Attempt to atomically reserve every seat in `seat_ids` for `user_id`.
    ///
    /// Either all seats are reserved or none are: row locks are acquired on
    /// the seat rows in ascending `seat_id` order (a fixed canonical order
    /// across all callers) to avoid deadlocking against a concurrent
    /// reservation attempt that overlaps on a different subset of the same
    /// seats.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::SeatConflict`] for the first seat found
    /// not reservable (already held, sold, blocked, or not found). Returns
    /// [`ReservationError::Storage`] on a database failure.
    pub async fn reserve(
        &self,
        event_id: EventId,
        seat_ids: &[SeatId],
        user_id: UserId,
        ttl: Duration,
        price_per_seat: Money,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let mut sorted_seat_ids = seat_ids.to_vec();
        sorted_seat_ids.sort_by_key(ticketwire_domain::ids::SeatId::as_uuid);
        let ids: Vec<uuid::Uuid> = sorted_seat_ids.iter().map(|id| id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r"
            SELECT seat_id, status
            FROM seats
            WHERE event_id = $1 AND seat_id = ANY($2)
            ORDER BY seat_id
            FOR UPDATE
            ",
        )
        .bind(event_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut locked_status = std::collections::HashMap::new();
        for row in &rows {
            let seat_id: uuid::Uuid = row.try_get("seat_id")?;
            let status_str: String = row.try_get("status")?;
            locked_status.insert(seat_id, SeatStatus::parse(&status_str)?);
        }

        for seat_id in &sorted_seat_ids {
            match locked_status.get(&seat_id.as_uuid()) {
                Some(SeatStatus::Available) => {}
                _ => {
                    return Err(ReservationError::SeatConflict { seat_id: *seat_id });
                }
            }
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| ReservationError::Storage(e.to_string()))?;

        let mut reservations = Vec::with_capacity(sorted_seat_ids.len());
        for seat_id in &sorted_seat_ids {
            let reservation_id = ReservationId::new();

            sqlx::query("UPDATE seats SET status = $1 WHERE seat_id = $2")
                .bind(SeatStatus::Reserved.as_str())
                .bind(seat_id.as_uuid())
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r"
                INSERT INTO reservations (
                    reservation_id, seat_id, event_id, user_id, status,
                    reserved_at, expires_at, reserved_price, currency, booking_reference
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL)
                ",
            )
            .bind(reservation_id.as_uuid())
            .bind(seat_id.as_uuid())
            .bind(event_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(ReservationStatus::Pending.as_str())
            .bind(now)
            .bind(expires_at)
            .bind(price_per_seat.amount())
            .bind(price_per_seat.currency().as_str())
            .execute(&mut *tx)
            .await?;

            reservations.push(Reservation {
                reservation_id,
                seat_id: *seat_id,
                event_id,
                user_id,
                status: ReservationStatus::Pending,
                reserved_at: now,
                expires_at,
                reserved_price: price_per_seat,
                booking_reference: None,
            });
        }

        tx.commit().await?;

        metrics::counter!("reservation_store.seats_reserved").increment(reservations.len() as u64);

        Ok(reservations)
    }

    /// Confirm a set of reservations under a booking reference.
    ///
    /// Idempotent: a reservation already `CONFIRMED` under the same
    /// `booking_reference` is a no-op. Races the background sweep on the
    /// seat row lock; if the sweep wins, returns
    /// [`ReservationError::ReservationExpired`].
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotFound`], [`ReservationError::ReservationExpired`],
    /// or [`ReservationError::Storage`].
    pub async fn confirm(
        &self,
        reservation_ids: &[ReservationId],
        booking_reference: &str,
    ) -> Result<(), ReservationError> {
        let mut tx = self.pool.begin().await?;

        for reservation_id in reservation_ids {
            let row = sqlx::query(
                r"
                SELECT r.status, r.expires_at, r.booking_reference, r.seat_id
                FROM reservations r
                WHERE r.reservation_id = $1
                FOR UPDATE
                ",
            )
            .bind(reservation_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ReservationError::NotFound {
                reservation_id: *reservation_id,
            })?;

            let status_str: String = row.try_get("status")?;
            let status = ReservationStatus::parse(&status_str)?;
            let existing_ref: Option<String> = row.try_get("booking_reference")?;

            if status == ReservationStatus::Confirmed
                && existing_ref.as_deref() == Some(booking_reference)
            {
                continue;
            }

            let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
            if status != ReservationStatus::Pending || expires_at < Utc::now() {
                return Err(ReservationError::ReservationExpired {
                    reservation_id: *reservation_id,
                });
            }

            let seat_id: uuid::Uuid = row.try_get("seat_id")?;

            sqlx::query(
                r"
                UPDATE reservations
                SET status = $1, booking_reference = $2
                WHERE reservation_id = $3
                ",
            )
            .bind(ReservationStatus::Confirmed.as_str())
            .bind(booking_reference)
            .bind(reservation_id.as_uuid())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE seats SET status = $1 WHERE seat_id = $2")
                .bind(SeatStatus::Occupied.as_str())
                .bind(seat_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Release a set of reservations, freeing their seats.
    ///
    /// Idempotent on an already-released reservation. Returns the
    /// reservations actually released (skipping any already
    /// cancelled/expired or unknown id), so callers that publish their own
    /// enriched `event.seat.released` don't have to re-fetch.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] on a database failure.
    pub async fn release(
        &self,
        reservation_ids: &[ReservationId],
        reason: SeatReleaseReason,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let mut tx = self.pool.begin().await?;
        let mut released = Vec::new();

        for reservation_id in reservation_ids {
            let row = sqlx::query(
                r"
                SELECT status, seat_id, event_id, user_id, reserved_at, expires_at,
                       reserved_price, currency
                FROM reservations WHERE reservation_id = $1 FOR UPDATE
                ",
            )
            .bind(reservation_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else { continue };

            let status_str: String = row.try_get("status")?;
            let status = ReservationStatus::parse(&status_str)?;
            if status == ReservationStatus::Cancelled || status == ReservationStatus::Expired {
                continue;
            }

            let seat_id: uuid::Uuid = row.try_get("seat_id")?;

            sqlx::query("UPDATE reservations SET status = $1 WHERE reservation_id = $2")
                .bind(ReservationStatus::Cancelled.as_str())
                .bind(reservation_id.as_uuid())
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE seats SET status = $1 WHERE seat_id = $2")
                .bind(SeatStatus::Available.as_str())
                .bind(seat_id)
                .execute(&mut *tx)
                .await?;

            let event_id: uuid::Uuid = row.try_get("event_id")?;
            let user_id: uuid::Uuid = row.try_get("user_id")?;
            let reserved_at: DateTime<Utc> = row.try_get("reserved_at")?;
            let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
            let amount: rust_decimal::Decimal = row.try_get("reserved_price")?;
            let currency_str: String = row.try_get("currency")?;
            let currency = Currency::new(&currency_str)
                .map_err(|e| ReservationError::Storage(e.to_string()))?;

            released.push(Reservation {
                reservation_id: *reservation_id,
                seat_id: SeatId::from(seat_id),
                event_id: EventId::from(event_id),
                user_id: UserId::from(user_id),
                status: ReservationStatus::Cancelled,
                reserved_at,
                expires_at,
                reserved_price: Money::new(amount, currency),
                booking_reference: None,
            });
        }

        tx.commit().await?;

        if let Some(bus) = &self.bus {
            for reservation in &released {
                publish_seat_released(bus, reservation, reason).await?;
            }
        }

        Ok(released)
    }

    /// Resolve `seat_ids` to their live reservations for `event_id` and
    /// release them, per [`Self::release`]. Used by callers (e.g. the
    /// saga's `RELEASE_SEATS` compensation step) that only know which
    /// seats a workflow was holding, not the reservation ids `reserve`
    /// generated for them.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] on a database failure.
    pub async fn release_by_seats(
        &self,
        event_id: EventId,
        seat_ids: &[SeatId],
        reason: SeatReleaseReason,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let ids: Vec<uuid::Uuid> = seat_ids.iter().map(SeatId::as_uuid).collect();
        let statuses: Vec<&str> = vec![ReservationStatus::Pending.as_str(), ReservationStatus::Confirmed.as_str()];

        let rows = sqlx::query(
            r"
            SELECT reservation_id
            FROM reservations
            WHERE event_id = $1 AND seat_id = ANY($2) AND status = ANY($3)
            ",
        )
        .bind(event_id.as_uuid())
        .bind(&ids)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;

        let mut reservation_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let reservation_id: uuid::Uuid = row.try_get("reservation_id")?;
            reservation_ids.push(ReservationId::from(reservation_id));
        }

        self.release(&reservation_ids, reason).await
    }

    /// Find and expire every `PENDING` reservation whose `expires_at` has
    /// already passed, freeing their seats.
    ///
    /// Intended to be called on a fixed interval (spec.md §4.3: every 30s)
    /// by [`crate::sweeper::spawn_sweeper`]. Returns the reservations that
    /// were expired, so the caller can publish `event.seat.released`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Storage`] on a database failure.
    pub async fn sweep_expired(&self) -> Result<Vec<Reservation>, ReservationError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r"
            SELECT reservation_id, seat_id, event_id, user_id, reserved_at,
                   expires_at, reserved_price, currency
            FROM reservations
            WHERE status = $1 AND expires_at < NOW()
            FOR UPDATE
            ",
        )
        .bind(ReservationStatus::Pending.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut expired = Vec::with_capacity(rows.len());
        for row in &rows {
            let reservation_id: uuid::Uuid = row.try_get("reservation_id")?;
            let seat_id: uuid::Uuid = row.try_get("seat_id")?;
            let event_id: uuid::Uuid = row.try_get("event_id")?;
            let user_id: uuid::Uuid = row.try_get("user_id")?;
            let reserved_at: DateTime<Utc> = row.try_get("reserved_at")?;
            let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
            let amount: rust_decimal::Decimal = row.try_get("reserved_price")?;
            let currency_str: String = row.try_get("currency")?;
            let currency = Currency::new(&currency_str)
                .map_err(|e| ReservationError::Storage(e.to_string()))?;

            sqlx::query("UPDATE reservations SET status = $1 WHERE reservation_id = $2")
                .bind(ReservationStatus::Expired.as_str())
                .bind(reservation_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE seats SET status = $1 WHERE seat_id = $2")
                .bind(SeatStatus::Available.as_str())
                .bind(seat_id)
                .execute(&mut *tx)
                .await?;

            expired.push(Reservation {
                reservation_id: ReservationId::from(reservation_id),
                seat_id: SeatId::from(seat_id),
                event_id: EventId::from(event_id),
                user_id: UserId::from(user_id),
                status: ReservationStatus::Expired,
                reserved_at,
                expires_at,
                reserved_price: Money::new(amount, currency),
                booking_reference: None,
            });
        }

        tx.commit().await?;

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "swept expired reservations");
            metrics::counter!("reservation_store.swept").increment(expired.len() as u64);

            if let Some(bus) = &self.bus {
                for reservation in &expired {
                    publish_seat_released(bus, reservation, SeatReleaseReason::Expired).await?;
                }
            }
        }

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_logically_expired_checks_status_and_deadline() {
        let now = Utc::now();
        let reservation = Reservation {
            reservation_id: ReservationId::new(),
            seat_id: SeatId::new(),
            event_id: EventId::new(),
            user_id: UserId::new(),
            status: ReservationStatus::Pending,
            reserved_at: now - chrono::Duration::minutes(20),
            expires_at: now - chrono::Duration::minutes(5),
            reserved_price: Money::new(rust_decimal::Decimal::ZERO, Currency::USD),
            booking_reference: None,
        };

        assert!(reservation.is_logically_expired(now));
    }

    #[test]
    fn a_confirmed_reservation_is_never_logically_expired() {
        let now = Utc::now();
        let mut reservation = Reservation {
            reservation_id: ReservationId::new(),
            seat_id: SeatId::new(),
            event_id: EventId::new(),
            user_id: UserId::new(),
            status: ReservationStatus::Pending,
            reserved_at: now - chrono::Duration::minutes(20),
            expires_at: now - chrono::Duration::minutes(5),
            reserved_price: Money::new(rust_decimal::Decimal::ZERO, Currency::USD),
            booking_reference: None,
        };
        reservation.status = ReservationStatus::Confirmed;

        assert!(!reservation.is_logically_expired(now));
    }
}
