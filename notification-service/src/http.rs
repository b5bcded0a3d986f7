//! HTTP surface for the notification service: a thin read endpoint over
//! recorded notifications, plus the saga's `SEND_CONFIRMATION` step target
//! (spec.md §4.6, the `booking_confirmation` workflow's last step).
//!
//! Grounded on `event-service/src/http.rs`'s shape, itself grounded on
//! `booking-service/src/http.rs`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use composable_rust_web::AppError;
use serde::{Deserialize, Serialize};
use ticketwire_domain::ids::UserId;
use ticketwire_saga::SagaContext;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::store::NotificationStore;
use crate::types::{Notification, NotificationKind};

/// Shared state for the notification service's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The notification store.
    pub store: Arc<NotificationStore>,
}

impl AppState {
    /// Build a new `AppState`.
    #[must_use]
    pub const fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

/// Build the notification service's Axum router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/notifications", get(list_notifications));

    let internal_routes =
        Router::new().route("/steps/SEND_CONFIRMATION", post(send_confirmation_step));

    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
}

impl From<NotificationError> for AppError {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::Storage(message) => Self::internal(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListNotificationsQuery {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct NotificationResponse {
    notification_id: ticketwire_domain::ids::NotificationId,
    user_id: UserId,
    kind: NotificationKind,
    message: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            notification_id: notification.notification_id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            created_at: notification.created_at,
        }
    }
}

async fn list_notifications(
    Query(query): Query<ListNotificationsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let notifications = state.store.list_for_user(UserId::from_uuid(query.user_id)).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    context: SagaContext,
}

/// `SEND_CONFIRMATION`: the workflow's terminal step, fired directly by the
/// saga rather than observed off the bus. Has no `source_event_id` to key
/// the dedup constraint on (there's no bus envelope on this path), so it
/// uses `context.booking_id`'s own id as the key — stable across saga
/// retries of the same step, and a booking is confirmed by at most one
/// workflow run, so one booking can only ever produce one notification
/// here regardless of how many times the step is retried. No compensation:
/// sending a confirmation has nothing a later failure would need to undo.
async fn send_confirmation_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let user_id = request
        .context
        .user_id
        .ok_or_else(|| AppError::validation("SEND_CONFIRMATION requires context.user_id"))?;
    let booking_id = request
        .context
        .booking_id
        .ok_or_else(|| AppError::validation("SEND_CONFIRMATION requires context.booking_id"))?;

    state
        .store
        .record_if_new(
            user_id,
            booking_id.as_uuid(),
            NotificationKind::BookingConfirmation,
            format!("Your booking {booking_id} is confirmed"),
        )
        .await?;
    Ok(())
}
