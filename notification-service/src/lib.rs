//! Notification projection (spec.md §4.8): turns `booking.confirmed`,
//! `booking.cancelled`, and `payment.failed` into a durable, deduped
//! notification record per `(user_id, source event)`, plus the saga's
//! `SEND_CONFIRMATION` step target (spec.md §4.6).
//!
//! Rendering and delivery (email, SMS, push) are out of scope — this crate
//! owns only the "a user should be told about this" fact a downstream
//! delivery worker would consume.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod consumer;
pub mod error;
pub mod http;
pub mod projection;
pub mod store;
pub mod types;

pub use consumer::spawn_consumer;
pub use error::NotificationError;
pub use http::{build_router, AppState};
pub use projection::NotificationProjection;
pub use store::NotificationStore;
pub use types::{Notification, NotificationKind};
