//! HTTP surface for the user service (spec.md's out-of-scope CRUD shell,
//! kept thin): registration, lookup, and the saga's `VALIDATE_USER` step
//! target.
//!
//! Grounded on `event-service/src/http.rs`'s shape, itself grounded on
//! `booking-service/src/http.rs`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use composable_rust_web::AppError;
use serde::{Deserialize, Serialize};
use ticketwire_domain::ids::UserId;
use ticketwire_saga::SagaContext;
use uuid::Uuid;

use crate::error::UserError;
use crate::store::UserStore;
use crate::types::User;

/// Shared state for the user service's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The user store.
    pub store: Arc<UserStore>,
}

impl AppState {
    /// Build a new `AppState`.
    #[must_use]
    pub const fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

/// Build the user service's Axum router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/users", post(register_user))
        .route("/users/:user_id", get(get_user));

    let internal_routes = Router::new().route("/steps/VALIDATE_USER", post(validate_user_step));

    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
}

impl From<UserError> for AppError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound { user_id } => Self::not_found("user", user_id),
            UserError::Inactive { user_id } => {
                Self::forbidden(format!("user {user_id} is not active"))
            }
            UserError::EmailTaken(email) => {
                Self::conflict(format!("email {email} is already registered"))
            }
            UserError::Storage(message) => Self::internal(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterUserRequest {
    email: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    user_id: UserId,
    email: String,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Registration: account creation. Password hashing and credential storage
/// are the external collaborator spec.md §1 carves out — this only creates
/// the row a workflow can later validate.
async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.store.register(request.email).await?;
    Ok(Json(user.into()))
}

async fn get_user(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.store.get(UserId::from_uuid(user_id)).await?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    context: SagaContext,
}

/// `VALIDATE_USER`: asserts `context.user_id` exists and is active. Has no
/// compensation (spec.md §4.6) — it mutates nothing, only asserts, so there
/// is nothing to undo if a later step fails.
async fn validate_user_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let user_id = request
        .context
        .user_id
        .ok_or_else(|| AppError::validation("VALIDATE_USER requires context.user_id"))?;
    state.store.validate(user_id).await?;
    Ok(())
}
