//! HTTP surface for the payment service (spec.md §6):
//!
//! - `POST /api/v1/payments` — the push-model entry point: create and drive
//!   a payment to completion for a booking
//! - `GET /api/v1/payments/:id` — fetch a payment
//! - `POST /api/v1/payments/:id/refund` — refund a completed payment
//!
//! Mirrors booking-service's `http.rs` shape: handlers build a command,
//! dispatch it through the `Store`, wait for effects to settle, then read
//! back state to answer the request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use composable_rust_runtime::Store;
use composable_rust_web::AppError;
use serde::{Deserialize, Serialize};

use ticketwire_domain::ids::{BookingId, PaymentId, UserId};
use ticketwire_domain::money::Money;
use ticketwire_saga::SagaContext;
use uuid::Uuid;

use crate::reducer::{PaymentAction, PaymentEnvironment, PaymentReducer};
use crate::types::{Payment, PaymentState, PaymentStatus};

/// How long a handler waits for a dispatched command's effects to settle
/// before answering from whatever state is available.
const EFFECT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the payment service's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The payment reducer's store, shared across every request.
    pub store: Arc<Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>>,
}

impl AppState {
    /// Build a new `AppState` over an already-constructed `Store`.
    #[must_use]
    pub const fn new(
        store: Arc<Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>>,
    ) -> Self {
        Self { store }
    }
}

/// Build the payment service's Axum router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/:id", get(get_payment))
        .route("/payments/:id/refund", post(refund_payment));

    let internal_routes = Router::new()
        .route("/steps/PROCESS_PAYMENT", post(process_payment_step))
        .route("/steps/REFUND_PAYMENT", post(refund_payment_step));

    Router::new()
        .route("/health", get(composable_rust_web::handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .nest("/internal", internal_routes)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreatePaymentRequest {
    booking_id: BookingId,
    user_id: UserId,
    amount: Money,
}

#[derive(Debug, Serialize)]
struct PaymentResponse {
    payment_id: PaymentId,
    booking_id: BookingId,
    user_id: UserId,
    amount: Money,
    status: PaymentStatusResponse,
    external_reference: Option<String>,
    failure_reason: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum PaymentStatusResponse {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            booking_id: payment.booking_id,
            user_id: payment.user_id,
            amount: payment.amount,
            status: match payment.status {
                PaymentStatus::Pending => PaymentStatusResponse::Pending,
                PaymentStatus::Processing => PaymentStatusResponse::Processing,
                PaymentStatus::Completed => PaymentStatusResponse::Completed,
                PaymentStatus::Failed => PaymentStatusResponse::Failed,
                PaymentStatus::Refunded => PaymentStatusResponse::Refunded,
                PaymentStatus::Cancelled => PaymentStatusResponse::Cancelled,
            },
            external_reference: payment.external_reference.clone(),
            failure_reason: payment.failure_reason.clone(),
            created_at: payment.created_at,
        }
    }
}

async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    if state
        .store
        .state(|s| s.exists_for_booking(&request.booking_id))
        .await
    {
        return Err(AppError::conflict(format!(
            "a payment already exists for booking {}",
            request.booking_id
        )));
    }

    let payment_id = PaymentId::new();
    let command = PaymentAction::InitiatePayment {
        payment_id,
        booking_id: request.booking_id,
        user_id: request.user_id,
        amount: request.amount,
        correlation_id: None,
    };

    let mut handle = state.store.send(command).await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let outcome = state
        .store
        .state(|s| (s.get(&payment_id).cloned(), s.last_error.clone()))
        .await;

    match outcome {
        (Some(payment), _) => Ok((StatusCode::CREATED, Json(PaymentResponse::from(&payment)))),
        (None, Some(error)) => Err(AppError::validation(error)),
        (None, None) => Err(AppError::internal("payment was not created")),
    }
}

async fn get_payment(
    Path(payment_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment_id = PaymentId::from_uuid(payment_id);
    let payment = state.store.state(|s| s.get(&payment_id).cloned()).await;
    payment
        .map(|p| Json(PaymentResponse::from(&p)))
        .ok_or_else(|| AppError::not_found("payment", payment_id))
}

async fn refund_payment(
    Path(payment_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment_id = PaymentId::from_uuid(payment_id);
    if state.store.state(|s| s.get(&payment_id).cloned()).await.is_none() {
        return Err(AppError::not_found("payment", payment_id));
    }

    let mut handle = state
        .store
        .send(PaymentAction::RefundPayment { payment_id })
        .await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let (payment, error) = state
        .store
        .state(|s| (s.get(&payment_id).cloned(), s.last_error.clone()))
        .await;

    match (payment, error) {
        (Some(p), _) if matches!(p.status, PaymentStatus::Refunded) => {
            Ok(Json(PaymentResponse::from(&p)))
        }
        (_, Some(error)) => Err(AppError::conflict(error)),
        (Some(p), None) => Ok(Json(PaymentResponse::from(&p))),
        (None, None) => Err(AppError::internal("payment disappeared during refund")),
    }
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    context: SagaContext,
}

/// `PROCESS_PAYMENT`: initiate a payment for `context.booking_id`. Idempotent
/// against retries the same way `PaymentState::payment_for_booking` already
/// dedupes the pull/push race (spec.md §4.5's Open Question): if a payment
/// already exists for this booking, the step succeeds without re-initiating.
async fn process_payment_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let context = request.context;
    let booking_id = context
        .booking_id
        .ok_or_else(|| AppError::validation("PROCESS_PAYMENT requires context.booking_id"))?;
    let user_id = context
        .user_id
        .ok_or_else(|| AppError::validation("PROCESS_PAYMENT requires context.user_id"))?;
    let amount = context
        .amount
        .ok_or_else(|| AppError::validation("PROCESS_PAYMENT requires context.amount"))?;

    if state.store.state(|s| s.exists_for_booking(&booking_id)).await {
        return Ok(());
    }

    let payment_id = PaymentId::new();
    let command = PaymentAction::InitiatePayment {
        payment_id,
        booking_id,
        user_id,
        amount,
        correlation_id: None,
    };

    let mut handle = state.store.send(command).await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;

    let (payment, error) = state
        .store
        .state(|s| (s.get(&payment_id).cloned(), s.last_error.clone()))
        .await;

    match (payment, error) {
        (Some(_), _) => Ok(()),
        (None, Some(error)) => Err(AppError::validation(error)),
        (None, None) => Err(AppError::internal("payment was not created")),
    }
}

/// `REFUND_PAYMENT`: the compensation for `PROCESS_PAYMENT`. Resolves
/// `context.booking_id` back to its payment through
/// `PaymentState::payment_for_booking` — `SagaContext` carries no
/// `payment_id` field of its own, only the booking it's acting on behalf of.
async fn refund_payment_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<(), AppError> {
    let booking_id = request
        .context
        .booking_id
        .ok_or_else(|| AppError::validation("REFUND_PAYMENT requires context.booking_id"))?;

    let Some(payment_id) = state
        .store
        .state(|s| s.payment_for_booking.get(&booking_id).copied())
        .await
    else {
        return Ok(());
    };

    let mut handle = state
        .store
        .send(PaymentAction::RefundPayment { payment_id })
        .await;
    let _ = handle.wait_with_timeout(EFFECT_SETTLE_TIMEOUT).await;
    Ok(())
}
