//! Errors raised by the messaging crate.

use thiserror::Error;

/// Errors specific to exchange topology and AMQP plumbing, distinct from
/// [`composable_rust_core::event_bus::EventBusError`] which this crate
/// also maps into at the `EventBus` trait boundary.
#[derive(Error, Debug)]
pub enum MessagingError {
    /// A routing key's leading domain segment did not match one of the
    /// four fixed exchanges.
    #[error("routing key has no matching exchange: {0}")]
    UnknownDomain(String),

    /// The underlying AMQP connection or channel failed.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}
