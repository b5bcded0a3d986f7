//! Thin CRUD shell over the seat reservation store (spec.md's component
//! out-of-scope shells), plus the saga's `RESERVE_SEATS`/`RELEASE_SEATS`
//! step targets (spec.md §4.6).
//!
//! Owns no domain logic of its own: seat availability, holds, and the
//! expiry sweep all live in `ticketwire_reservation_store`. This crate's
//! job is the HTTP surface and the booking-aware `event.seat.*` publishing
//! that surface needs, which the store itself can't provide since it has
//! no notion of a booking (see `DESIGN.md`).

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod http;
pub mod publish;
pub mod sweep;

pub use http::{build_router, AppState};
pub use sweep::spawn_expiry_publisher;
