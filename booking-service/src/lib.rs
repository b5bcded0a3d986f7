//! Booking state machine and HTTP surface (spec.md's component D).
//!
//! Owns the `Booking` lifecycle: validates `CreateBooking` commands, tracks
//! seat reservation and payment events as they arrive off the bus, and
//! publishes `booking.*` events for the saga and notification service to
//! consume.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancellation_policy;
pub mod consumer;
pub mod http;
pub mod reducer;
pub mod types;

pub use cancellation_policy::CancellationPolicy;
pub use consumer::spawn_consumer;
pub use http::{build_router, AppState};
pub use reducer::{BookingAction, BookingEnvironment, BookingItemRequest, BookingReducer};
pub use types::{Booking, BookingState, BookingStatus};
