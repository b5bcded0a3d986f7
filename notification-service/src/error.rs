//! Errors raised by the notification store.

use thiserror::Error;

/// Errors from notification persistence.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// The underlying database failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for NotificationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
