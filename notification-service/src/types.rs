//! The notification record this service persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketwire_domain::ids::{NotificationId, UserId};

/// Which lifecycle transition a notification reports.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// `booking.confirmed` was observed.
    BookingConfirmed,
    /// `booking.cancelled` was observed.
    BookingCancelled,
    /// `payment.failed` was observed.
    PaymentFailed,
    /// `SEND_CONFIRMATION` saga step fired directly (not bus-driven).
    BookingConfirmation,
}

/// A persisted notification record. Rendering and transport (email/SMS)
/// are out of scope (spec.md §4.8); this is the durable "a user should be
/// told about this" fact a downstream delivery worker would consume.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// This notification's id.
    pub notification_id: NotificationId,
    /// The user to notify.
    pub user_id: UserId,
    /// The originating bus event's id (or, for the saga-step path, a
    /// synthetic id derived from the workflow), used to dedupe replays.
    pub source_event_id: uuid::Uuid,
    /// What happened.
    pub kind: NotificationKind,
    /// Human-readable summary; not a rendered template.
    pub message: String,
    /// When the notification was recorded.
    pub created_at: DateTime<Utc>,
}
