//! The generic workflow executor (spec.md §4.6): commands, events, and the
//! reducer that drives a [`WorkflowDefinition`] instance through its steps,
//! retrying on failure and compensating completed steps in reverse order
//! when retries are exhausted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use composable_rust_core::environment::Clock;
use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::EventBus;
use composable_rust_core::event_store::EventStore;
use composable_rust_core::reducer::Reducer;
use composable_rust_core::stream::StreamId;
use composable_rust_core::{append_events, async_effect, delay, effect::Effect, publish_event};
use composable_rust_macros::Action;
use serde::{Deserialize, Serialize};

use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::ids::{BookingId, CorrelationId, EventId, SeatId, UserId, WorkflowId};
use ticketwire_domain::money::Money;

use crate::executor::StepExecutor;
use crate::types::{SagaContext, SagaInstance, SagaState, SagaStatus, StepStatus};
use crate::workflow::{WorkflowDefinition, WorkflowStep};

const SERVICE_NAME: &str = "saga";

/// Default time a single step is given to complete before it is treated as
/// failed, absent a per-step override (spec.md §4.6: "per-step default
/// 30 s, overridable per step").
const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Wall-clock deadline for the whole instance, armed at `StartWorkflow` and
/// re-armed relative to `started_at` on recovery (spec.md §4.6 "Timeouts":
/// "saga global 300 s (configurable)").
pub(crate) const WORKFLOW_TIMEOUT: Duration = Duration::from_secs(300);

/// Retry backoff schedule, capped at the last entry (spec.md §4.6).
pub(crate) const RETRY_BACKOFFS: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_secs(2),
    Duration::from_secs(8),
];

/// Commands and events processed by [`SagaReducer`].
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum SagaAction {
    /// Command: start a new workflow instance.
    #[command]
    StartWorkflow {
        /// Id to assign the new instance.
        workflow_id: WorkflowId,
        /// Which workflow definition to run (`"booking_creation"` or
        /// `"booking_confirmation"`).
        workflow_type: String,
        /// The user this workflow acts on behalf of.
        user_id: UserId,
        /// The event seats are reserved against, if known at start.
        event_id: Option<EventId>,
        /// The seats requested, if known at start.
        seat_ids: Vec<SeatId>,
        /// The booking being created or confirmed, if known at start.
        booking_id: Option<BookingId>,
        /// The amount to charge, if known at start.
        amount: Option<Money>,
        /// Correlation id for end-to-end tracing.
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation_id: Option<CorrelationId>,
    },

    /// Command: the step timeout or retry backoff elapsed; re-attempt the
    /// step named by `step_index` if it is still current.
    #[command]
    RetryStep {
        /// The instance to retry a step on.
        workflow_id: WorkflowId,
        /// The step to retry.
        step_index: usize,
    },

    /// Event: the current step's forward call succeeded.
    #[event]
    StepSucceeded {
        /// The instance this applies to.
        workflow_id: WorkflowId,
        /// The step that succeeded.
        step_index: usize,
    },

    /// Event: the current step's forward call failed.
    #[event]
    StepFailed {
        /// The instance this applies to.
        workflow_id: WorkflowId,
        /// The step that failed.
        step_index: usize,
        /// A human-readable failure reason.
        reason: String,
    },

    /// Event: the current step's deadline elapsed without a response.
    #[event]
    StepTimedOut {
        /// The instance this applies to.
        workflow_id: WorkflowId,
        /// The step that timed out.
        step_index: usize,
    },

    /// Event: the instance's global deadline (spec.md §4.6, default 300 s)
    /// elapsed before every step succeeded.
    #[event]
    WorkflowTimedOut {
        /// The instance that timed out.
        workflow_id: WorkflowId,
    },

    /// Event: a compensating call for `step_index` finished (successfully
    /// or not — compensation is best-effort).
    #[event]
    CompensationStepCompleted {
        /// The instance this applies to.
        workflow_id: WorkflowId,
        /// The step that was compensated.
        step_index: usize,
    },

    /// Event: every step succeeded.
    #[event]
    WorkflowCompleted {
        /// The instance that completed.
        workflow_id: WorkflowId,
    },

    /// Event: compensation finished for every previously-completed step.
    #[event]
    WorkflowCompensated {
        /// The instance that was compensated.
        workflow_id: WorkflowId,
    },

    /// Event: a command was rejected.
    #[event]
    ValidationFailed {
        /// The instance this pertains to, if known.
        workflow_id: Option<WorkflowId>,
        /// The failure message.
        error: String,
    },
}

/// Side-effect dependencies for [`SagaReducer`].
#[derive(Clone)]
pub struct SagaEnvironment {
    /// Clock for timestamps and deadlines.
    pub clock: Arc<dyn Clock>,
    /// Event store for persistence of saga events.
    pub event_store: Arc<dyn EventStore>,
    /// Event bus for publishing terminal workflow outcomes.
    pub event_bus: Arc<dyn EventBus>,
    /// The single stream every saga instance's events are appended to.
    pub stream_id: StreamId,
    /// Executes each step's forward and compensating call.
    pub executor: Arc<dyn StepExecutor>,
}

impl SagaEnvironment {
    /// Build a new environment over the shared `"saga"` event stream.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            clock,
            event_store,
            event_bus,
            stream_id: StreamId::new("saga"),
            executor,
        }
    }
}

/// The generic workflow executor reducer.
#[derive(Clone, Debug, Default)]
pub struct SagaReducer;

impl SagaReducer {
    /// Creates a new `SagaReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist a self-originated saga event, without publishing it to the
    /// bus. Step-level bookkeeping (`StepSucceeded`, `StepFailed`,
    /// compensation progress) is internal to this service; only terminal
    /// workflow outcomes are part of the public event taxonomy.
    fn persist_only(event: &SagaAction, env: &SagaEnvironment) -> Effect<SagaAction> {
        let Ok(data) = bincode::serialize(event) else {
            return Effect::None;
        };
        let store_event = SerializedEvent::new(event.event_type().to_string(), data, None);
        append_events! {
            store: env.event_store,
            stream: env.stream_id.as_str(),
            expected_version: None,
            events: vec![store_event],
            on_success: |_version| None,
            on_error: |error| Some(SagaAction::ValidationFailed {
                workflow_id: None,
                error: error.to_string(),
            })
        }
    }

    /// Persist and publish a terminal workflow outcome.
    fn persist_and_publish(
        event: &SagaAction,
        env: &SagaEnvironment,
        envelope_json: serde_json::Value,
    ) -> Vec<Effect<SagaAction>> {
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
                on_error: |error| Some(SagaAction::ValidationFailed {
                    workflow_id: None,
                    error: error.to_string(),
                })
            },
            publish_event! {
                bus: env.event_bus,
                topic: "saga",
                event: bus_event,
                on_success: || None,
                on_error: |error| Some(SagaAction::ValidationFailed {
                    workflow_id: None,
                    error: error.to_string(),
                })
            },
        ]
    }

    /// Dispatch the instance's current step: mark it in-flight, call out
    /// to its owning service, and arm the step timeout. Returns the
    /// `WorkflowCompleted` transition instead if every step already
    /// succeeded.
    pub(crate) fn execute_current_step(
        instance: &mut SagaInstance,
        env: &SagaEnvironment,
    ) -> Vec<Effect<SagaAction>> {
        let workflow_id = instance.workflow_id;

        if instance.current_step >= instance.steps.len() {
            instance.status = SagaStatus::Completed;
            let completed = SagaAction::WorkflowCompleted { workflow_id };
            let envelope = EventEnvelope::originate(
                "saga.workflow.completed",
                SERVICE_NAME,
                instance.correlation_id,
                WorkflowOutcome {
                    workflow_id,
                    workflow_type: instance.workflow_type.clone(),
                },
            );
            let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
            return Self::persist_and_publish(&completed, env, envelope_json);
        }

        let step_index = instance.current_step;
        let step = instance.steps[step_index];
        let step_timeout = step.timeout.unwrap_or(STEP_TIMEOUT);
        instance.step_states[step_index].status = StepStatus::InFlight;
        instance.deadline = Some(env.clock.now() + chrono::Duration::from_std(step_timeout).unwrap_or_default());

        let executor = Arc::clone(&env.executor);
        let context = instance.context.clone();
        let mut effects = vec![async_effect! {
            match executor.execute(step, context).await {
                Ok(()) => Some(SagaAction::StepSucceeded { workflow_id, step_index }),
                Err(error) => Some(SagaAction::StepFailed {
                    workflow_id,
                    step_index,
                    reason: error.to_string(),
                }),
            }
        }];
        effects.push(delay! {
            duration: step_timeout,
            action: SagaAction::StepTimedOut { workflow_id, step_index }
        });
        effects
    }

    /// Start (or continue) compensating an instance from `from_step`
    /// downwards (I-9: strictly reverse completion order, only completed
    /// steps). Steps without a compensation command are marked compensated
    /// directly, without an effect. Returns `WorkflowCompensated` once
    /// every earlier step has been handled.
    pub(crate) fn advance_compensation(
        instance: &mut SagaInstance,
        from_step: isize,
        env: &SagaEnvironment,
    ) -> Vec<Effect<SagaAction>> {
        let workflow_id = instance.workflow_id;
        let mut index = from_step;

        while index >= 0 {
            let i = index as usize;
            if instance.step_states[i].status == StepStatus::Succeeded {
                let step = instance.steps[i];
                if step.compensation_command.is_none() {
                    instance.step_states[i].status = StepStatus::Compensated;
                    index -= 1;
                    continue;
                }

                let executor = Arc::clone(&env.executor);
                let context = instance.context.clone();
                return vec![async_effect! {
                    let _ = executor.compensate(step, context).await;
                    Some(SagaAction::CompensationStepCompleted { workflow_id, step_index: i })
                }];
            }
            index -= 1;
        }

        instance.status = SagaStatus::Compensated;
        let compensated = SagaAction::WorkflowCompensated { workflow_id };
        let envelope = EventEnvelope::originate(
            "saga.workflow.compensated",
            SERVICE_NAME,
            instance.correlation_id,
            WorkflowOutcome {
                workflow_id,
                workflow_type: instance.workflow_type.clone(),
            },
        );
        let envelope_json = serde_json::to_value(&envelope).unwrap_or_default();
        Self::persist_and_publish(&compensated, env, envelope_json)
    }

    /// Shared handling for a step's forward call failing, whether from an
    /// explicit `StepFailed` event or a `StepTimedOut` deadline. Retries
    /// up to `RETRY_BACKOFFS.len()` times without advancing
    /// `current_step`; once exhausted, starts compensation.
    fn on_step_failure(
        state: &mut SagaState,
        workflow_id: WorkflowId,
        step_index: usize,
        reason: String,
        env: &SagaEnvironment,
    ) -> Vec<Effect<SagaAction>> {
        let Some(instance) = state.instances.get_mut(&workflow_id) else {
            return vec![Effect::None];
        };
        if !instance.is_current_step(step_index) {
            return vec![Effect::None];
        }

        instance.last_error = Some(reason);
        let attempts = instance.step_states[step_index].attempts;

        if (attempts as usize) < RETRY_BACKOFFS.len() {
            let backoff = RETRY_BACKOFFS[attempts as usize];
            instance.step_states[step_index].attempts += 1;
            vec![delay! {
                duration: backoff,
                action: SagaAction::RetryStep { workflow_id, step_index }
            }]
        } else {
            instance.step_states[step_index].status = StepStatus::Failed;
            instance.status = SagaStatus::Compensating;
            Self::advance_compensation(instance, step_index as isize - 1, env)
        }
    }
}

/// Payload published for `saga.workflow.completed`/`saga.workflow.compensated`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct WorkflowOutcome {
    workflow_id: WorkflowId,
    workflow_type: String,
}

impl Reducer for SagaReducer {
    type State = SagaState;
    type Action = SagaAction;
    type Environment = SagaEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Vec<Effect<Self::Action>> {
        match action {
            SagaAction::StartWorkflow {
                workflow_id,
                workflow_type,
                user_id,
                event_id,
                seat_ids,
                booking_id,
                amount,
                correlation_id,
            } => {
                let Some(definition) = WorkflowDefinition::by_type(&workflow_type) else {
                    state.last_error = Some(format!("unknown workflow type '{workflow_type}'"));
                    return vec![Effect::None];
                };
                if state.instances.contains_key(&workflow_id) {
                    return vec![Effect::None];
                }

                let context = SagaContext {
                    user_id: Some(user_id),
                    event_id,
                    seat_ids,
                    booking_id,
                    amount,
                };
                let mut instance = SagaState::new_instance(
                    workflow_id,
                    workflow_type,
                    definition.steps,
                    context,
                    correlation_id.unwrap_or_else(CorrelationId::new),
                    env.clock.now(),
                );
                let mut effects = Self::execute_current_step(&mut instance, env);
                effects.push(delay! {
                    duration: WORKFLOW_TIMEOUT,
                    action: SagaAction::WorkflowTimedOut { workflow_id }
                });
                effects.push(Self::persist_only(
                    &SagaAction::StartWorkflow {
                        workflow_id,
                        workflow_type: instance.workflow_type.clone(),
                        user_id,
                        event_id: instance.context.event_id,
                        seat_ids: instance.context.seat_ids.clone(),
                        booking_id: instance.context.booking_id,
                        amount: instance.context.amount,
                        correlation_id: Some(instance.correlation_id),
                    },
                    env,
                ));
                state.instances.insert(workflow_id, instance);
                effects
            }

            SagaAction::RetryStep { workflow_id, step_index } => {
                let Some(instance) = state.instances.get_mut(&workflow_id) else {
                    return vec![Effect::None];
                };
                if !instance.is_current_step(step_index) {
                    return vec![Effect::None];
                }
                Self::execute_current_step(instance, env)
            }

            SagaAction::StepSucceeded { workflow_id, step_index } => {
                let Some(instance) = state.instances.get_mut(&workflow_id) else {
                    return vec![Effect::None];
                };
                if !instance.is_current_step(step_index) {
                    return vec![Effect::None];
                }
                instance.step_states[step_index].status = StepStatus::Succeeded;
                instance.current_step += 1;
                instance.last_error = None;
                let mut effects = Self::execute_current_step(instance, env);
                effects.push(Self::persist_only(
                    &SagaAction::StepSucceeded { workflow_id, step_index },
                    env,
                ));
                effects
            }

            SagaAction::StepFailed { workflow_id, step_index, reason } => {
                let mut effects = Self::on_step_failure(state, workflow_id, step_index, reason.clone(), env);
                effects.push(Self::persist_only(
                    &SagaAction::StepFailed { workflow_id, step_index, reason },
                    env,
                ));
                effects
            }

            SagaAction::StepTimedOut { workflow_id, step_index } => {
                let mut effects = Self::on_step_failure(
                    state,
                    workflow_id,
                    step_index,
                    "step timed out".to_string(),
                    env,
                );
                effects.push(Self::persist_only(
                    &SagaAction::StepTimedOut { workflow_id, step_index },
                    env,
                ));
                effects
            }

            SagaAction::WorkflowTimedOut { workflow_id } => {
                let Some(instance) = state.instances.get_mut(&workflow_id) else {
                    return vec![Effect::None];
                };
                if instance.status.is_terminal() {
                    return vec![Effect::None];
                }

                instance.last_error = Some("workflow timed out".to_string());
                let current_step = instance.current_step;
                if current_step < instance.step_states.len()
                    && instance.step_states[current_step].status == StepStatus::InFlight
                {
                    instance.step_states[current_step].status = StepStatus::Failed;
                }
                instance.status = SagaStatus::Compensating;

                let mut effects =
                    Self::advance_compensation(instance, current_step as isize - 1, env);
                effects.push(Self::persist_only(
                    &SagaAction::WorkflowTimedOut { workflow_id },
                    env,
                ));
                effects
            }

            SagaAction::CompensationStepCompleted { workflow_id, step_index } => {
                let Some(instance) = state.instances.get_mut(&workflow_id) else {
                    return vec![Effect::None];
                };
                instance.step_states[step_index].status = StepStatus::Compensated;
                let mut effects = Self::advance_compensation(instance, step_index as isize - 1, env);
                effects.push(Self::persist_only(
                    &SagaAction::CompensationStepCompleted { workflow_id, step_index },
                    env,
                ));
                effects
            }

            event @ (SagaAction::WorkflowCompleted { .. }
            | SagaAction::WorkflowCompensated { .. }
            | SagaAction::ValidationFailed { .. }) => {
                if let SagaAction::ValidationFailed { error, .. } = &event {
                    state.last_error = Some(error.clone());
                }
                vec![Effect::None]
            }
        }
    }
}
