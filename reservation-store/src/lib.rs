//! Seat inventory and reservation storage with a background expiry sweep.

pub mod error;
pub mod store;
pub mod sweeper;
pub mod types;

pub use error::ReservationError;
pub use store::{ReservationStore, SeatAvailability};
pub use sweeper::spawn_sweeper;
pub use types::{Reservation, ReservationStatus, Seat, SeatStatus, SeatType};
