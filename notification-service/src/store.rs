//! The notification store: idempotent recording and lookup.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE notifications (
//!     notification_id  UUID PRIMARY KEY,
//!     user_id          UUID NOT NULL,
//!     source_event_id  UUID NOT NULL,
//!     kind             TEXT NOT NULL,
//!     message          TEXT NOT NULL,
//!     created_at       TIMESTAMPTZ NOT NULL,
//!     UNIQUE (user_id, source_event_id)
//! );
//! ```

use crate::error::NotificationError;
use crate::types::{Notification, NotificationKind};
use sqlx::{PgPool, Row};
use ticketwire_domain::ids::{NotificationId, UserId};

fn kind_as_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::BookingConfirmed => "booking_confirmed",
        NotificationKind::BookingCancelled => "booking_cancelled",
        NotificationKind::PaymentFailed => "payment_failed",
        NotificationKind::BookingConfirmation => "booking_confirmation",
    }
}

fn kind_from_str(value: &str) -> NotificationKind {
    match value {
        "booking_cancelled" => NotificationKind::BookingCancelled,
        "payment_failed" => NotificationKind::PaymentFailed,
        "booking_confirmation" => NotificationKind::BookingConfirmation,
        _ => NotificationKind::BookingConfirmed,
    }
}

/// `PostgreSQL`-backed notification store.
pub struct NotificationStore {
    pool: PgPool,
}

impl NotificationStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a notification keyed by `(user_id, source_event_id)`, unless
    /// one already exists for that key — spec.md §4.8's "so a replay does
    /// not double-notify." Returns `None` when the key was already
    /// recorded, `Some` when this call is the one that created it.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::Storage`] on a database failure.
    pub async fn record_if_new(
        &self,
        user_id: UserId,
        source_event_id: uuid::Uuid,
        kind: NotificationKind,
        message: String,
    ) -> Result<Option<Notification>, NotificationError> {
        let notification_id = NotificationId::new();
        let created_at = chrono::Utc::now();

        let row = sqlx::query(
            r"
            INSERT INTO notifications (notification_id, user_id, source_event_id, kind, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, source_event_id) DO NOTHING
            RETURNING notification_id
            ",
        )
        .bind(notification_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(source_event_id)
        .bind(kind_as_str(kind))
        .bind(&message)
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            return Ok(None);
        }

        Ok(Some(Notification {
            notification_id,
            user_id,
            source_event_id,
            kind,
            message,
            created_at,
        }))
    }

    /// List a user's notifications, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::Storage`] on a database failure.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, NotificationError> {
        let rows = sqlx::query(
            r"
            SELECT notification_id, user_id, source_event_id, kind, message, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_str: String = row.try_get("kind")?;
            notifications.push(Notification {
                notification_id: NotificationId::from_uuid(row.try_get("notification_id")?),
                user_id: UserId::from_uuid(row.try_get("user_id")?),
                source_event_id: row.try_get("source_event_id")?,
                kind: kind_from_str(&kind_str),
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(notifications)
    }
}
