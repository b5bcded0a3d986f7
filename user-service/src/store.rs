//! The user store: registration and lookup.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     user_id    UUID PRIMARY KEY,
//!     email      TEXT NOT NULL UNIQUE,
//!     is_active  BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use crate::error::UserError;
use crate::types::User;
use sqlx::{PgPool, Row};
use ticketwire_domain::ids::UserId;

/// `PostgreSQL`-backed user store.
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new user. Fails with [`UserError::EmailTaken`] if the
    /// email is already registered — the unique index does the actual
    /// enforcement, this surfaces it as a typed error rather than a raw
    /// constraint-violation string.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::EmailTaken`] on a duplicate email, or
    /// [`UserError::Storage`] on any other database failure.
    pub async fn register(&self, email: String) -> Result<User, UserError> {
        let user_id = UserId::new();
        let created_at = chrono::Utc::now();

        let result = sqlx::query(
            r"
            INSERT INTO users (user_id, email, is_active, created_at)
            VALUES ($1, $2, TRUE, $3)
            ",
        )
        .bind(user_id.as_uuid())
        .bind(&email)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_error)) = &result {
            if db_error.is_unique_violation() {
                return Err(UserError::EmailTaken(email));
            }
        }
        result?;

        Ok(User {
            user_id,
            email,
            is_active: true,
            created_at,
        })
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::NotFound`] if no such user exists, or
    /// [`UserError::Storage`] on a database failure.
    pub async fn get(&self, user_id: UserId) -> Result<User, UserError> {
        let row = sqlx::query(
            r"
            SELECT user_id, email, is_active, created_at
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(UserError::NotFound { user_id });
        };

        Ok(User {
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            email: row.try_get("email")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Validate that `user_id` exists and is active. This is the store-level
    /// half of the saga's `VALIDATE_USER` step: it has no compensation
    /// (spec.md §4.6) because it mutates nothing, only asserts.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::NotFound`] if the user doesn't exist,
    /// [`UserError::Inactive`] if the account is suspended, or
    /// [`UserError::Storage`] on a database failure.
    pub async fn validate(&self, user_id: UserId) -> Result<User, UserError> {
        let user = self.get(user_id).await?;
        if !user.is_active {
            return Err(UserError::Inactive { user_id });
        }
        Ok(user)
    }
}
