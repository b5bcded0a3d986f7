//! # ticketwire-domain
//!
//! The shared vocabulary every ticketwire service is built from: strongly
//! typed ids, the event envelope carried on the bus, the event taxonomy
//! those envelopes wrap, money, and the domain error kinds that HTTP
//! handlers, bus consumers and sagas all translate from.
//!
//! Nothing in this crate talks to a database, a broker, or the network —
//! it is pure data and pure functions, imported by every other crate in
//! the workspace.

pub mod envelope;
pub mod error;
pub mod events;
pub mod ids;
pub mod money;

pub use envelope::EventEnvelope;
pub use error::DomainError;
pub use money::{Currency, Money, MoneyError};
