//! The payment state machine (spec.md §4.5): commands, domain events, the
//! pure reducer, and the side-effect environment it is executed against.

use std::sync::Arc;

use composable_rust_core::environment::Clock;
use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::EventBus;
use composable_rust_core::event_store::EventStore;
use composable_rust_core::reducer::Reducer;
use composable_rust_core::stream::StreamId;
use composable_rust_core::{append_events, async_effect, effect::Effect, publish_event};
use composable_rust_macros::Action;
use serde::{Deserialize, Serialize};

use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::{PaymentCompleted, PaymentFailed, PaymentInitiated, PaymentRefunded};
use ticketwire_domain::ids::{BookingId, CorrelationId, PaymentId, UserId};
use ticketwire_domain::money::Money;

use crate::provider::PaymentProvider;
use crate::types::{PaymentState, PaymentStatus};

const SERVICE_NAME: &str = "payment-service";

/// Commands and events processed by [`PaymentReducer`].
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum PaymentAction {
    /// Command: create and drive a payment to completion. Constructed by
    /// both entry points spec.md §4.5 allows: the HTTP push path
    /// (`POST /api/v1/payments`) and the bus pull path (consuming
    /// `booking.initiated`) — both converge here, and `PaymentState`'s
    /// `payment_for_booking` index makes a second `InitiatePayment` for the
    /// same booking a no-op regardless of which path wins the race.
    #[command]
    InitiatePayment {
        /// Id to assign the new payment.
        payment_id: PaymentId,
        /// The booking this payment is for.
        booking_id: BookingId,
        /// The user being charged.
        user_id: UserId,
        /// The amount to charge.
        amount: Money,
        /// Correlation id for request tracing.
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation_id: Option<CorrelationId>,
    },

    /// Command: refund a completed payment.
    #[command]
    RefundPayment {
        /// The payment to refund.
        payment_id: PaymentId,
    },

    /// Event: a `booking.initiated` envelope was observed on the bus (the
    /// pull-model entry point). Carries the originating event's id so
    /// redelivery is recognized and ignored.
    #[event]
    BookingInitiatedObserved {
        /// The bus event's own id, for dedup.
        source_event_id: uuid::Uuid,
        /// The booking being created.
        booking_id: BookingId,
        /// The user making the booking.
        user_id: UserId,
        /// The booking's total amount.
        amount: Money,
    },

    /// Event: the provider authorized and captured the charge.
    #[event]
    ProviderCaptured {
        /// The payment that was captured.
        payment_id: PaymentId,
        /// The provider's reference for the charge.
        external_reference: String,
    },

    /// Event: the provider declined or errored on authorize/capture.
    #[event]
    ProviderDeclined {
        /// The payment that failed.
        payment_id: PaymentId,
        /// The provider's failure reason.
        reason: String,
    },

    /// Event: the provider refunded a previously captured charge.
    #[event]
    ProviderRefunded {
        /// The payment that was refunded.
        payment_id: PaymentId,
    },

    /// Event: the payment was created (self-originated, persisted+published).
    #[event]
    PaymentInitiatedEvent {
        /// The payment that was created.
        payment_id: PaymentId,
        /// The booking this payment is for.
        booking_id: BookingId,
        /// The user being charged.
        user_id: UserId,
        /// The amount to charge.
        amount: Money,
        /// When the payment record was created.
        created_at: chrono::DateTime<chrono::Utc>,
    },

    /// Event: the payment reached `Completed` (self-originated).
    #[event]
    PaymentCompletedEvent {
        /// The payment that completed.
        payment_id: PaymentId,
        /// The booking this payment is for.
        booking_id: BookingId,
        /// The provider's reference for the charge.
        external_reference: String,
    },

    /// Event: the payment reached `Failed` (self-originated).
    #[event]
    PaymentFailedEvent {
        /// The payment that failed.
        payment_id: PaymentId,
        /// The booking this payment was for.
        booking_id: BookingId,
        /// A human-readable failure reason.
        reason: String,
    },

    /// Event: a completed payment was refunded (self-originated).
    #[event]
    PaymentRefundedEvent {
        /// The payment that was refunded.
        payment_id: PaymentId,
        /// The booking this payment was for.
        booking_id: BookingId,
    },

    /// Event: a command or transition was rejected.
    #[event]
    ValidationFailed {
        /// The payment the failure pertains to, if known.
        payment_id: Option<PaymentId>,
        /// The failure message.
        error: String,
    },
}

/// Side-effect dependencies for [`PaymentReducer`].
#[derive(Clone)]
pub struct PaymentEnvironment {
    /// Clock for timestamps.
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence of payment events.
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing payment lifecycle events.
    pub event_bus: Arc<dyn EventBus>,
    /// The single stream every payment's events are appended to.
    pub stream_id: StreamId,
    /// The external payment provider.
    pub provider: Arc<dyn PaymentProvider>,
}

impl PaymentEnvironment {
    /// Build a new environment over the shared `"payment"` event stream.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new("payment"),
            provider,
        }
    }
}

/// The payment lifecycle reducer.
#[derive(Clone, Debug, Default)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// Creates a new `PaymentReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist (bincode, to the event store) and publish (JSON, to the bus)
    /// a self-originated payment event.
    fn create_effects(
        event: &PaymentAction,
        env: &PaymentEnvironment,
        envelope_json: serde_json::Value,
    ) -> Vec<Effect<PaymentAction>> {
        let Ok(data) = bincode::serialize(event) else {
            return vec![Effect::None];
        };
        let store_event = SerializedEvent::new(event.event_type().to_string(), data, None);
        let bus_event = SerializedEvent::new(
            envelope_json
                .get("event_type")
                .and_then(|v| v.as_str())
                .unwrap_or(event.event_type())
                .to_string(),
            serde_json::to_vec(&envelope_json).unwrap_or_default(),
            None,
        );

        vec![
            append_events! {
                store: env.event_store,
                stream: env.stream_id.as_str(),
                expected_version: None,
                events: vec![store_event],
                on_success: |_version| None,
                on_error: |error| Some(PaymentAction::ValidationFailed {
                    payment_id: None,
                    error: error.to_string(),
                })
            },
            publish_event! {
                bus: env.event_bus,
                topic: "payment",
                event: bus_event,
                on_success: || None,
                on_error: |error| Some(PaymentAction::ValidationFailed {
                    payment_id: None,
                    error: error.to_string(),
                })
            },
        ]
    }

    fn apply_event(state: &mut PaymentState, action: &PaymentAction) {
        match action {
            PaymentAction::PaymentInitiatedEvent {
                payment_id,
                booking_id,
                user_id,
                amount,
                created_at,
            } => {
                let payment = crate::types::Payment {
                    payment_id: *payment_id,
                    booking_id: *booking_id,
                    user_id: *user_id,
                    amount: *amount,
                    status: PaymentStatus::Processing,
                    external_reference: None,
                    failure_reason: None,
                    completed_at: None,
                    created_at: *created_at,
                };
                state.payments.insert(*payment_id, payment);
                state.payment_for_booking.insert(*booking_id, *payment_id);
                state.last_error = None;
            }
            PaymentAction::PaymentCompletedEvent {
                payment_id,
                external_reference,
                ..
            } => {
                if let Some(p) = state.payments.get_mut(payment_id) {
                    p.status = PaymentStatus::Completed;
                    p.external_reference = Some(external_reference.clone());
                }
                state.last_error = None;
            }
            PaymentAction::PaymentFailedEvent {
                payment_id, reason, ..
            } => {
                if let Some(p) = state.payments.get_mut(payment_id) {
                    p.status = PaymentStatus::Failed;
                    p.failure_reason = Some(reason.clone());
                }
                state.last_error = Some(reason.clone());
            }
            PaymentAction::PaymentRefundedEvent { payment_id, .. } => {
                if let Some(p) = state.payments.get_mut(payment_id) {
                    if matches!(p.status, PaymentStatus::Completed) {
                        p.status = PaymentStatus::Refunded;
                    }
                }
                state.last_error = None;
            }
            PaymentAction::ValidationFailed { error, .. } => {
                state.last_error = Some(error.clone());
            }
            PaymentAction::InitiatePayment { .. }
            | PaymentAction::RefundPayment { .. }
            | PaymentAction::BookingInitiatedObserved { .. }
            | PaymentAction::ProviderCaptured { .. }
            | PaymentAction::ProviderDeclined { .. }
            | PaymentAction::ProviderRefunded { .. } => {}
        }
    }

    /// Shared body for both `InitiatePayment` entry points: validate the
    /// booking hasn't already been paid, record `Processing`, and kick off
    /// the provider call.
    fn initiate(
        state: &mut PaymentState,
        payment_id: PaymentId,
        booking_id: BookingId,
        user_id: UserId,
        amount: Money,
        env: &PaymentEnvironment,
    ) -> Vec<Effect<PaymentAction>> {
        if state.exists_for_booking(&booking_id) {
            return vec![Effect::None];
        }

        let initiated = PaymentAction::PaymentInitiatedEvent {
            payment_id,
            booking_id,
            user_id,
            amount,
            created_at: env.clock.now(),
        };
        Self::apply_event(state, &initiated);

        let cid = CorrelationId::new();
        let envelope = EventEnvelope::originate(
            "payment.initiated",
            SERVICE_NAME,
            cid,
            PaymentInitiated {
                payment_id,
                booking_id,
                user_id,
                amount,
            },
        );
        let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
        let mut effects = Self::create_effects(&initiated, env, envelope_json);

        let provider = Arc::clone(&env.provider);
        effects.push(async_effect! {
            match provider.authorize_and_capture(payment_id, amount).await {
                Ok(authorization) => Some(PaymentAction::ProviderCaptured {
                    payment_id,
                    external_reference: authorization.external_reference,
                }),
                Err(error) => Some(PaymentAction::ProviderDeclined {
                    payment_id,
                    reason: error.to_string(),
                }),
            }
        });

        effects
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = PaymentEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Vec<Effect<Self::Action>> {
        match action {
            // Push path: explicit HTTP POST.
            PaymentAction::InitiatePayment {
                payment_id,
                booking_id,
                user_id,
                amount,
                ..
            } => Self::initiate(state, payment_id, booking_id, user_id, amount, env),

            // Pull path: `booking.initiated` consumed off the bus.
            PaymentAction::BookingInitiatedObserved {
                source_event_id,
                booking_id,
                user_id,
                amount,
            } => {
                if state.already_processed(source_event_id) {
                    return vec![Effect::None];
                }
                state.processed_event_ids.insert(source_event_id);
                Self::initiate(state, PaymentId::new(), booking_id, user_id, amount, env)
            }

            // PENDING/PROCESSING --provider success--> COMPLETED
            PaymentAction::ProviderCaptured {
                payment_id,
                external_reference,
            } => {
                let Some(p) = state.payments.get(&payment_id) else {
                    return vec![Effect::None];
                };
                let booking_id = p.booking_id;
                let completed = PaymentAction::PaymentCompletedEvent {
                    payment_id,
                    booking_id,
                    external_reference: external_reference.clone(),
                };
                Self::apply_event(state, &completed);

                let envelope = EventEnvelope::originate(
                    "payment.completed",
                    SERVICE_NAME,
                    CorrelationId::new(),
                    PaymentCompleted {
                        payment_id,
                        booking_id,
                        external_reference,
                    },
                );
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                Self::create_effects(&completed, env, envelope_json)
            }

            // PENDING/PROCESSING --provider decline--> FAILED
            PaymentAction::ProviderDeclined { payment_id, reason } => {
                let Some(p) = state.payments.get(&payment_id) else {
                    return vec![Effect::None];
                };
                let booking_id = p.booking_id;
                let user_id = p.user_id;
                tracing::warn!(%payment_id, %reason, "payment provider declined charge");
                let failed = PaymentAction::PaymentFailedEvent {
                    payment_id,
                    booking_id,
                    reason: reason.clone(),
                };
                Self::apply_event(state, &failed);

                let envelope = EventEnvelope::originate(
                    "payment.failed",
                    SERVICE_NAME,
                    CorrelationId::new(),
                    PaymentFailed {
                        payment_id,
                        booking_id,
                        reason,
                    },
                )
                .with_user(user_id);
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                Self::create_effects(&failed, env, envelope_json)
            }

            // COMPLETED --refund policy (I-8)--> provider refund call
            PaymentAction::RefundPayment { payment_id } => {
                let Some(p) = state.payments.get(&payment_id) else {
                    let failed = PaymentAction::ValidationFailed {
                        payment_id: Some(payment_id),
                        error: format!("payment {payment_id} not found"),
                    };
                    Self::apply_event(state, &failed);
                    return vec![Effect::None];
                };
                if !matches!(p.status, PaymentStatus::Completed) {
                    let failed = PaymentAction::ValidationFailed {
                        payment_id: Some(payment_id),
                        error: "only a completed payment may be refunded".to_string(),
                    };
                    Self::apply_event(state, &failed);
                    return vec![Effect::None];
                }
                let Some(external_reference) = p.external_reference.clone() else {
                    return vec![Effect::None];
                };
                let amount = p.amount;
                let provider = Arc::clone(&env.provider);
                vec![async_effect! {
                    match provider
                        .refund(payment_id, &external_reference, amount)
                        .await
                    {
                        Ok(_receipt) => Some(PaymentAction::ProviderRefunded { payment_id }),
                        Err(error) => Some(PaymentAction::ValidationFailed {
                            payment_id: Some(payment_id),
                            error: error.to_string(),
                        }),
                    }
                }]
            }

            PaymentAction::ProviderRefunded { payment_id } => {
                let Some(p) = state.payments.get(&payment_id) else {
                    return vec![Effect::None];
                };
                let booking_id = p.booking_id;
                let refunded = PaymentAction::PaymentRefundedEvent {
                    payment_id,
                    booking_id,
                };
                Self::apply_event(state, &refunded);

                let envelope = EventEnvelope::originate(
                    "payment.refunded",
                    SERVICE_NAME,
                    CorrelationId::new(),
                    PaymentRefunded {
                        payment_id,
                        booking_id,
                    },
                );
                let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
                Self::create_effects(&refunded, env, envelope_json)
            }

            // Other events apply to state but issue no further effects.
            event => {
                Self::apply_event(state, &event);
                vec![Effect::None]
            }
        }
    }
}
