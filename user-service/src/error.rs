//! Errors raised by the user store.

use thiserror::Error;
use ticketwire_domain::ids::UserId;

/// Errors from user lookups and registration.
#[derive(Error, Debug)]
pub enum UserError {
    /// No user exists with the given id.
    #[error("user {user_id} not found")]
    NotFound {
        /// The user id that was looked up.
        user_id: UserId,
    },

    /// A user is known but not active, and so cannot be validated into a
    /// workflow (`VALIDATE_USER`'s failure mode).
    #[error("user {user_id} is not active")]
    Inactive {
        /// The inactive user.
        user_id: UserId,
    },

    /// An email is already registered.
    #[error("email {0} is already registered")]
    EmailTaken(String),

    /// The underlying database failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
