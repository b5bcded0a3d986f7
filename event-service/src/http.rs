//! HTTP surface for the event service (spec.md's out-of-scope CRUD shells,
//! kept thin): seat availability, a direct-reservation entry point, and
//! the saga's `RESERVE_SEATS`/`RELEASE_SEATS` step targets (spec.md §4.6).
//!
//! Grounded on `booking-service/src/http.rs`'s shape for the thin-CRUD
//! parts, and on `saga::executor::HttpStepExecutor`'s
//! `/internal/steps/{command}` convention for the saga-facing handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use composable_rust_core::event_bus::EventBus;
use composable_rust_web::AppError;
use serde::{Deserialize, Serialize};
use ticketwire_domain::events::SeatReleaseReason;
use ticketwire_domain::ids::{BookingId, EventId, SeatId};
use ticketwire_domain::money::{Currency, Money};
use ticketwire_reservation_store::{Reservation, ReservationError, ReservationStatus, ReservationStore};
use ticketwire_saga::SagaContext;
use uuid::Uuid;

use crate::publish::{publish_seat_released, publish_seat_reserved};

/// Default hold duration for a seat reserved through this service,
/// restored from `examples/original_source/services/event_service/routes/seat_reservation_routes.py`'s
/// `expires_at = datetime.utcnow() + timedelta(minutes=15)`, dropped by the
/// distillation.
const RESERVATION_TTL: Duration = Duration::from_secs(15 * 60);

/// Shared state for the event service's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The seat reservation store. Built without `.with_event_bus()`: this
    /// service publishes every `event.seat.*` itself so it can attribute
    /// the booking a reservation/release was made on behalf of (see
    /// `crate::publish`).
    pub store: Arc<ReservationStore>,
    /// The bus this service publishes `event.seat.*` to.
    pub event_bus: Arc<dyn EventBus>,
}

impl AppState {
    /// Build a new `AppState`.
    #[must_use]
    pub const fn new(store: Arc<ReservationStore>, event_bus: Arc<dyn EventBus>) -> Self {
        Self { store, event_bus }
    }
}

/// Build the event service's Axum router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events/:event_id/seats", get(seat_availability))
        .route("/events/:event_id/reservations", post(create_reservation));

    let internal_routes = Router::new()
        .route("/steps/RESERVE_SEATS", post(reserve_seats_step))
        .route("/steps/RELEASE_SEATS", post(release_seats_step));

    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
}

impl From<ReservationError> for AppError {
    fn from(error: ReservationError) -> Self {
        match error {
            ReservationError::SeatConflict { seat_id } => {
                Self::conflict(format!("seat {seat_id} is not available"))
            }
            ReservationError::ReservationExpired { reservation_id } => {
                Self::conflict(format!("reservation {reservation_id} expired before it could be confirmed"))
            }
            ReservationError::NotFound { reservation_id } => {
                Self::not_found("reservation", reservation_id)
            }
            ReservationError::Storage(message) => Self::internal(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeatIdsQuery {
    seat_ids: String,
}

#[derive(Debug, Serialize)]
struct SeatAvailabilityResponse {
    seat_id: SeatId,
    available: bool,
}

async fn seat_availability(
    Path(event_id): Path<Uuid>,
    Query(query): Query<SeatIdsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SeatAvailabilityResponse>>, AppError> {
    let event_id = EventId::from_uuid(event_id);
    let seat_ids: Vec<SeatId> = query
        .seat_ids
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Uuid>().map(SeatId::from))
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::bad_request(format!("invalid seat id: {e}")))?;

    let availability = state.store.check_availability(event_id, &seat_ids).await?;
    Ok(Json(
        availability
            .into_iter()
            .map(|a| SeatAvailabilityResponse { seat_id: a.seat_id, available: a.available })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    seat_ids: Vec<SeatId>,
    user_id: ticketwire_domain::ids::UserId,
    price_per_seat: Money,
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    reservation_id: ticketwire_domain::ids::ReservationId,
    seat_id: SeatId,
    event_id: EventId,
    status: ReservationStatusResponse,
    expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ReservationStatusResponse {
    Pending,
    Confirmed,
    Expired,
    Cancelled,
    Completed,
}

impl From<&Reservation> for ReservationResponse {
    fn from(reservation: &Reservation) -> Self {
        Self {
            reservation_id: reservation.reservation_id,
            seat_id: reservation.seat_id,
            event_id: reservation.event_id,
            status: match reservation.status {
                ReservationStatus::Pending => ReservationStatusResponse::Pending,
                ReservationStatus::Confirmed => ReservationStatusResponse::Confirmed,
                ReservationStatus::Expired => ReservationStatusResponse::Expired,
                ReservationStatus::Cancelled => ReservationStatusResponse::Cancelled,
                ReservationStatus::Completed => ReservationStatusResponse::Completed,
            },
            expires_at: reservation.expires_at,
        }
    }
}

/// Direct (non-saga) reservation entry point: holds `request.seat_ids` for
/// `request.user_id` with no booking attribution (`booking_id: None`),
/// mirroring the original's standalone `POST /reservations` endpoint.
async fn create_reservation(
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<Json<Vec<ReservationResponse>>, AppError> {
    let event_id = EventId::from_uuid(event_id);
    let reservations = state
        .store
        .reserve(event_id, &request.seat_ids, request.user_id, RESERVATION_TTL, request.price_per_seat)
        .await?;

    for reservation in &reservations {
        if let Err(error) = publish_seat_reserved(&state.event_bus, reservation, None).await {
            tracing::error!(%error, reservation_id = %reservation.reservation_id, "failed to publish seat reservation");
        }
    }

    Ok(Json(reservations.iter().map(ReservationResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    context: SagaContext,
}

/// `RESERVE_SEATS`: reserve `context.seat_ids` for `context.user_id`
/// against `context.event_id`, attributing the reservation to
/// `context.booking_id`.
///
/// `context.amount`, when present, is the booking's total and is split
/// evenly across the seats being reserved — `SagaContext` carries no
/// per-seat price breakdown, a documented simplification (see
/// `DESIGN.md`).
async fn reserve_seats_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let context = request.context;
    let event_id = context
        .event_id
        .ok_or_else(|| AppError::validation("RESERVE_SEATS requires context.event_id"))?;
    let user_id = context
        .user_id
        .ok_or_else(|| AppError::validation("RESERVE_SEATS requires context.user_id"))?;
    if context.seat_ids.is_empty() {
        return Err(AppError::validation("RESERVE_SEATS requires a non-empty context.seat_ids"));
    }

    let price_per_seat = price_per_seat(&context);

    let reservations = state
        .store
        .reserve(event_id, &context.seat_ids, user_id, RESERVATION_TTL, price_per_seat)
        .await?;

    for reservation in &reservations {
        publish_seat_reserved(&state.event_bus, reservation, context.booking_id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
    }

    Ok(())
}

/// `RELEASE_SEATS`: the compensation for `RESERVE_SEATS`. Resolves
/// `context.seat_ids` back to their reservations and releases them,
/// attributing the release to `context.booking_id`.
async fn release_seats_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let context = request.context;
    let event_id = context
        .event_id
        .ok_or_else(|| AppError::validation("RELEASE_SEATS requires context.event_id"))?;
    if context.seat_ids.is_empty() {
        return Ok(());
    }

    let released = state
        .store
        .release_by_seats(event_id, &context.seat_ids, SeatReleaseReason::Cancelled)
        .await?;

    for reservation in &released {
        publish_seat_released(&state.event_bus, reservation, SeatReleaseReason::Cancelled, context.booking_id)
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
    }

    Ok(())
}

fn price_per_seat(context: &SagaContext) -> Money {
    let Some(amount) = context.amount else {
        return Money::new(rust_decimal::Decimal::ZERO, Currency::USD);
    };
    let seat_count = rust_decimal::Decimal::from(context.seat_ids.len().max(1));
    Money::new(amount.amount() / seat_count, amount.currency())
}
