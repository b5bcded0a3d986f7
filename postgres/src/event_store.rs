//! `PostgreSQL`-backed implementation of [`EventStore`].
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE events (
//!     stream_id   TEXT NOT NULL,
//!     version     BIGINT NOT NULL,
//!     event_type  TEXT NOT NULL,
//!     data        BYTEA NOT NULL,
//!     metadata    JSONB,
//!     recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     PRIMARY KEY (stream_id, version)
//! );
//!
//! CREATE TABLE snapshots (
//!     stream_id  TEXT PRIMARY KEY,
//!     version    BIGINT NOT NULL,
//!     state      BYTEA NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```

use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_store::{EventStore, EventStoreError};
use composable_rust_core::stream::{StreamId, Version};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL` event store.
///
/// Append uses a transaction that re-checks the stream's current version
/// before inserting, so two concurrent appends against the same expected
/// version race on the primary key and exactly one wins.
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `PostgreSQL` and wrap the resulting pool.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        Ok(Self::new(pool))
    }

}

impl EventStore for PostgresEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            let (max,): (Option<i64>,) =
                sqlx::query_as("SELECT MAX(version) FROM events WHERE stream_id = $1 FOR UPDATE")
                    .bind(stream_id.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            #[allow(clippy::cast_sign_loss)]
            let current = max.map_or(Version::INITIAL, |v| Version::new(v as u64 + 1));

            if let Some(expected) = expected_version {
                if expected != current {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual: current,
                    });
                }
            }

            #[allow(clippy::cast_possible_wrap)]
            let mut next_version = current.value() as i64;
            for event in &events {
                sqlx::query(
                    r"
                    INSERT INTO events (stream_id, version, event_type, data, metadata)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(stream_id.as_str())
                .bind(next_version)
                .bind(&event.event_type)
                .bind(&event.data)
                .bind(&event.metadata)
                .execute(&mut *tx)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

                next_version += 1;
            }

            tx.commit()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            #[allow(clippy::cast_sign_loss)]
            let new_version = Version::new(next_version as u64);

            metrics::counter!("event_store.events.appended", "stream" => stream_id.as_str().to_string())
                .increment(events.len() as u64);

            Ok(new_version)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)]
            let from = from_version.map_or(0_i64, |v| v.value() as i64);

            let rows = sqlx::query(
                r"
                SELECT event_type, data, metadata
                FROM events
                WHERE stream_id = $1 AND version >= $2
                ORDER BY version ASC
                ",
            )
            .bind(stream_id.as_str())
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            Ok(rows
                .into_iter()
                .map(|row| {
                    SerializedEvent::new(row.get("event_type"), row.get("data"), row.get("metadata"))
                })
                .collect())
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        version: Version,
        state: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)]
            let version_i64 = version.value() as i64;

            sqlx::query(
                r"
                INSERT INTO snapshots (stream_id, version, state, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (stream_id)
                DO UPDATE SET version = $2, state = $3, updated_at = now()
                ",
            )
            .bind(stream_id.as_str())
            .bind(version_i64)
            .bind(&state)
            .execute(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let row = sqlx::query("SELECT version, state FROM snapshots WHERE stream_id = $1")
                .bind(stream_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            Ok(row.map(|row| {
                let version: i64 = row.get("version");
                #[allow(clippy::cast_sign_loss)]
                let version = Version::new(version as u64);
                (version, row.get("state"))
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_wraps_pool_without_connecting() {
        // PgPool requires a runtime to construct a real connection; this just
        // documents that `new` is a plain constructor with no I/O.
        let _ = PostgresEventStore::connect;
    }
}
