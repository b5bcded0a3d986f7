//! HTTP surface for the booking service (spec.md §6):
//!
//! - `POST /api/v1/bookings` — create a booking
//! - `GET /api/v1/bookings/:id` — fetch a booking
//! - `GET /api/v1/bookings` — list the caller's bookings
//! - `PUT /api/v1/bookings/:id/cancel` — cancel a booking
//!
//! Grounded on `examples/ticketing/src/api/reservations.rs` and
//! `server/routes.rs`: handlers build a command, dispatch it through the
//! `Store`, wait for effects to settle, then read back state to answer the
//! request (the teacher's per-request command/read-state shape).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use composable_rust_runtime::Store;
use composable_rust_web::AppError;
use serde::{Deserialize, Serialize};

use ticketwire_domain::ids::{BookingId, EventId, UserId};
use ticketwire_domain::money::{Currency, Money};
use ticketwire_saga::SagaContext;
use uuid::Uuid;

use crate::reducer::{BookingAction, BookingEnvironment, BookingItemRequest, BookingReducer};
use crate::types::{Booking, BookingState, BookingStatus};

/// How long a handler waits for a dispatched command's effects to settle
/// before answering from whatever state is available.
const EFFECT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the booking service's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The booking reducer's store, shared across every request.
    pub store: Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
}

impl AppState {
    /// Build a new `AppState` over an already-constructed `Store`.
    #[must_use]
    pub const fn new(
        store: Arc<Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>>,
    ) -> Self {
        Self { store }
    }
}

/// Build the booking service's Axum router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings", get(list_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/cancel", put(cancel_booking));

    let internal_routes = Router::new()
        .route("/steps/CREATE_BOOKING", post(create_booking_step))
        .route("/steps/CANCEL_BOOKING", post(cancel_booking_step));

    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    user_id: UserId,
    event_id: EventId,
    items: Vec<BookingItemRequest>,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: BookingId,
    user_id: UserId,
    event_id: EventId,
    status: BookingStatusResponse,
    total_amount: Money,
    booking_reference: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum BookingStatusResponse {
    Pending,
    Confirmed,
    Cancelled { reason: String },
    Expired,
    Refunded,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            status: match &booking.status {
                BookingStatus::Pending => BookingStatusResponse::Pending,
                BookingStatus::Confirmed => BookingStatusResponse::Confirmed,
                BookingStatus::Cancelled { reason } => BookingStatusResponse::Cancelled {
                    reason: format!("{reason:?}"),
                },
                BookingStatus::Expired => BookingStatusResponse::Expired,
                BookingStatus::Refunded => BookingStatusResponse::Refunded,
            },
            total_amount: booking.total_amount,
            booking_reference: booking.booking_reference.clone(),
            created_at: booking.created_at,
        }
    }
}

async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    if request.items.is_empty() {
        return Err(AppError::bad_request(
            "a booking must contain at least one item",
        ));
    }

    let booking_id = BookingId::new();
    let command = BookingAction::CreateBooking {
        booking_id,
        user_id: request.user_id,
        event_id: request.event_id,
        items: request.items,
        correlation_id: None,
    };

    let mut handle = state.store.send(command).await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let outcome = state
        .store
        .state(|s| {
            (
                s.get(&booking_id).cloned(),
                s.last_error.clone(),
            )
        })
        .await;

    match outcome {
        (Some(booking), _) => Ok((StatusCode::CREATED, Json(BookingResponse::from(&booking)))),
        (None, Some(error)) => Err(AppError::validation(error)),
        (None, None) => Err(AppError::internal("booking was not created")),
    }
}

async fn get_booking(
    Path(booking_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking_id = BookingId::from_uuid(booking_id);
    let booking = state.store.state(|s| s.get(&booking_id).cloned()).await;
    booking
        .map(|b| Json(BookingResponse::from(&b)))
        .ok_or_else(|| AppError::not_found("booking", booking_id))
}

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct ListBookingsResponse {
    bookings: Vec<BookingResponse>,
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Json<ListBookingsResponse> {
    let user_id = UserId::from_uuid(query.user_id);
    let bookings = state.store.state(|s| s.list_for_user(&user_id)).await;
    Json(ListBookingsResponse {
        bookings: bookings.iter().map(BookingResponse::from).collect(),
    })
}

async fn cancel_booking(
    Path(booking_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking_id = BookingId::from_uuid(booking_id);
    if !state.store.state(|s| s.exists(&booking_id)).await {
        return Err(AppError::not_found("booking", booking_id));
    }

    let mut handle = state
        .store
        .send(BookingAction::CancelBooking { booking_id })
        .await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let (booking, error) = state
        .store
        .state(|s| (s.get(&booking_id).cloned(), s.last_error.clone()))
        .await;

    match (booking, error) {
        (Some(b), _) if matches!(b.status, BookingStatus::Cancelled { .. }) => {
            Ok(Json(BookingResponse::from(&b)))
        }
        (_, Some(error)) => Err(AppError::conflict(error)),
        (Some(b), None) => Ok(Json(BookingResponse::from(&b))),
        (None, None) => Err(AppError::internal("booking disappeared during cancellation")),
    }
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    context: SagaContext,
}

/// `CREATE_BOOKING`: the workflow's first step. `SagaContext` carries no
/// per-seat section/price breakdown, only a flat `seat_ids` list and a
/// total `amount`, so each item is synthesized with `section: "general"`
/// and the total split evenly across seats — the same documented
/// simplification `event-service::http::reserve_seats_step` makes for
/// `RESERVE_SEATS` (see `DESIGN.md`).
async fn create_booking_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let context = request.context;
    let event_id = context
        .event_id
        .ok_or_else(|| AppError::validation("CREATE_BOOKING requires context.event_id"))?;
    let user_id = context
        .user_id
        .ok_or_else(|| AppError::validation("CREATE_BOOKING requires context.user_id"))?;
    let booking_id = context
        .booking_id
        .ok_or_else(|| AppError::validation("CREATE_BOOKING requires context.booking_id"))?;
    if context.seat_ids.is_empty() {
        return Err(AppError::validation("CREATE_BOOKING requires a non-empty context.seat_ids"));
    }

    let share = price_per_seat(&context);
    let items = context
        .seat_ids
        .iter()
        .map(|&seat_id| BookingItemRequest {
            seat_id,
            section: "general".to_string(),
            price: share,
        })
        .collect();

    let command = BookingAction::CreateBooking {
        booking_id,
        user_id,
        event_id,
        items,
        correlation_id: None,
    };

    let mut handle = state.store.send(command).await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let (booking, error) = state
        .store
        .state(|s| (s.get(&booking_id).cloned(), s.last_error.clone()))
        .await;

    match (booking, error) {
        (Some(_), _) => Ok(()),
        (None, Some(error)) => Err(AppError::validation(error)),
        (None, None) => Err(AppError::internal("booking was not created")),
    }
}

/// `CANCEL_BOOKING`: the compensation for `CREATE_BOOKING`.
async fn cancel_booking_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let booking_id = request
        .context
        .booking_id
        .ok_or_else(|| AppError::validation("CANCEL_BOOKING requires context.booking_id"))?;

    if !state.store.state(|s| s.exists(&booking_id)).await {
        return Ok(());
    }

    let mut handle = state
        .store
        .send(BookingAction::CancelBooking { booking_id })
        .await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;
    Ok(())
}

/// `context.amount`, split evenly across `context.seat_ids` — `SagaContext`
/// carries no per-seat price breakdown. Falls back to zero if no amount is
/// set. Mirrors `event-service::http::price_per_seat`.
fn price_per_seat(context: &SagaContext) -> Money {
    let Some(amount) = context.amount else {
        return Money::new(rust_decimal::Decimal::ZERO, Currency::USD);
    };
    let seat_count = rust_decimal::Decimal::from(context.seat_ids.len().max(1));
    Money::new(amount.amount() / seat_count, amount.currency())
}

#[cfg(test)]
mod step_tests {
    use super::*;
    use ticketwire_domain::ids::SeatId;

    #[test]
    fn splits_total_amount_evenly_across_seats() {
        let context = SagaContext {
            seat_ids: vec![SeatId::new(), SeatId::new()],
            amount: Some(Money::new(rust_decimal::Decimal::from(100), Currency::USD)),
            ..SagaContext::default()
        };
        let per_seat = price_per_seat(&context);
        assert_eq!(per_seat.amount(), rust_decimal::Decimal::from(50));
    }

    #[test]
    fn falls_back_to_zero_with_no_amount_in_context() {
        let context = SagaContext {
            seat_ids: vec![SeatId::new()],
            ..SagaContext::default()
        };
        let per_seat = price_per_seat(&context);
        assert_eq!(per_seat.amount(), rust_decimal::Decimal::ZERO);
    }
}
