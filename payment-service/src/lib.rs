//! Payment state machine and HTTP surface (spec.md's component E).
//!
//! Owns the `Payment` lifecycle: authorizes and captures charges against an
//! opaque provider capability, accepts both an HTTP push entry point and a
//! `booking.initiated` bus pull entry point (deduped against each other),
//! and publishes `payment.*` events for booking-service and the saga to
//! consume.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod consumer;
pub mod http;
pub mod provider;
pub mod reducer;
pub mod types;

pub use consumer::spawn_consumer;
pub use http::{build_router, AppState};
pub use provider::{Authorization, MockPaymentProvider, PaymentProvider, ProviderError, RefundReceipt};
pub use reducer::{PaymentAction, PaymentEnvironment, PaymentReducer};
pub use types::{Payment, PaymentState, PaymentStatus};
