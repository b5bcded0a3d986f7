//! Errors raised by the reservation store.

use thiserror::Error;
use ticketwire_domain::ids::{ReservationId, SeatId};

/// Errors from seat reservation operations.
#[derive(Error, Debug)]
pub enum ReservationError {
    /// A reservation was attempted against a seat that is already held or
    /// not reservable, per spec.md §4.3.
    #[error("seat conflict on {seat_id}")]
    SeatConflict {
        /// The seat that could not be reserved.
        seat_id: SeatId,
    },

    /// A row lock was won by the expiry sweep before a confirm could land.
    #[error("reservation {reservation_id} expired before it could be confirmed")]
    ReservationExpired {
        /// The reservation that expired out from under the caller.
        reservation_id: ReservationId,
    },

    /// No reservation exists with the given id.
    #[error("reservation {reservation_id} not found")]
    NotFound {
        /// The reservation id that was looked up.
        reservation_id: ReservationId,
    },

    /// The underlying database failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ReservationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
