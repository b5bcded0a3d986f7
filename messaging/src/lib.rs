//! # ticketwire-messaging
//!
//! The typed pub/sub substrate every ticketwire service publishes to and
//! consumes from: four durable topic exchanges (one per domain), a fixed
//! per-service queue binding table, and an [`composable_rust_core::event_bus::EventBus`]
//! implementation over AMQP (`lapin`) rather than the teacher's Kafka-compatible
//! Redpanda client — see `DESIGN.md` for why.
//!
//! Delivery is at-least-once. Consumers ack only after the message has been
//! forwarded downstream; a deserialization failure is retried up to three
//! times before the message is persisted to the dead-letter queue and
//! dropped, so one malformed payload never poisons a consumer forever.

mod bus;
mod error;
pub mod topology;

pub use bus::AmqpEventBus;
pub use error::MessagingError;
