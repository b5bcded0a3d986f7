//! The canonical event envelope carried on every bus message.

use crate::ids::{CorrelationId, EventEnvelopeId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wraps a typed payload with the routing and correlation metadata every
/// consumer needs regardless of event type.
///
/// `event_id` uniquely identifies one publish. Consumers may observe the
/// same `event_id` more than once (at-least-once delivery) and must treat
/// repeats as idempotent rather than relying on the broker to dedupe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique id of this publish.
    pub event_id: EventEnvelopeId,
    /// The dotted event type, e.g. `"booking.initiated"`.
    pub event_type: String,
    /// Name of the service that published this event.
    pub service_name: String,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Shared across every event belonging to the same saga/workflow.
    pub correlation_id: CorrelationId,
    /// The `event_id` of the event that caused this one, if any.
    pub causation_id: Option<EventEnvelopeId>,
    /// The user this event is scoped to, if any.
    pub user_id: Option<UserId>,
    /// The typed payload.
    pub data: T,
    /// Free-form metadata that does not belong in the typed payload.
    pub metadata: serde_json::Value,
}

impl<T> EventEnvelope<T> {
    /// Start building an envelope for a freshly originated event (one with
    /// no parent event in this saga, e.g. the first event on a new
    /// correlation id).
    #[must_use]
    pub fn originate(
        event_type: impl Into<String>,
        service_name: impl Into<String>,
        correlation_id: CorrelationId,
        data: T,
    ) -> Self {
        Self {
            event_id: EventEnvelopeId::new(),
            event_type: event_type.into(),
            service_name: service_name.into(),
            timestamp: Utc::now(),
            correlation_id,
            causation_id: None,
            user_id: None,
            data,
            metadata: serde_json::Value::Null,
        }
    }

    /// Build an envelope caused by another envelope, inheriting its
    /// `correlation_id` and recording it as `causation_id`.
    #[must_use]
    pub fn caused_by<U>(
        parent: &EventEnvelope<U>,
        event_type: impl Into<String>,
        service_name: impl Into<String>,
        data: T,
    ) -> Self {
        Self {
            event_id: EventEnvelopeId::new(),
            event_type: event_type.into(),
            service_name: service_name.into(),
            timestamp: Utc::now(),
            correlation_id: parent.correlation_id,
            causation_id: Some(parent.event_id),
            user_id: parent.user_id,
            data,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach a user id.
    #[must_use]
    pub const fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
