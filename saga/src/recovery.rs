//! Rebuilding in-memory saga state from the event store on restart
//! (spec.md §4.6 "Persistence": "On orchestrator restart, instances in
//! `IN_PROGRESS` or `COMPENSATING` are recovered and their timers re-armed
//! using the wall-clock deadline stored with the instance.").
//!
//! Every state-changing action the reducer handles is also appended,
//! bincode-encoded, to the shared `"saga"` stream by
//! [`crate::engine::SagaReducer::persist_only`]/`persist_and_publish`.
//! [`load`] replays that stream to reconstruct [`SagaState`], then
//! [`rearm`] re-issues the in-flight step call (or compensation call) and
//! re-arms both the per-step and the global workflow deadline for every
//! instance still short of a terminal status — the same
//! `execute_current_step`/`advance_compensation` helpers `reduce()` itself
//! uses, so recovery can never diverge from normal operation's behavior.

use std::sync::Arc;

use composable_rust_core::effect::Effect;
use composable_rust_core::environment::Clock;
use composable_rust_core::event_store::{EventStore, EventStoreError};
use composable_rust_core::stream::StreamId;
use composable_rust_core::{async_effect, delay};
use thiserror::Error;

use crate::engine::{SagaAction, SagaEnvironment, SagaReducer, RETRY_BACKOFFS, WORKFLOW_TIMEOUT};
use crate::types::{SagaContext, SagaState, SagaStatus, StepStatus};

/// Errors raised while replaying the saga stream on startup.
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// The event store could not be read.
    #[error("failed to load saga stream: {0}")]
    Store(#[from] EventStoreError),
    /// A stored event did not decode as a [`SagaAction`].
    #[error("corrupt saga event: {0}")]
    Decode(String),
}

/// Replay every event on the `"saga"` stream to reconstruct [`SagaState`].
///
/// Returns an empty state if the stream has never been written to (a fresh
/// deployment), exactly as [`EventStore::load_events`] documents.
///
/// # Errors
///
/// Returns [`RecoveryError`] if the stream cannot be read or a stored event
/// fails to decode.
pub async fn load(event_store: &Arc<dyn EventStore>, stream_id: &StreamId) -> Result<SagaState, RecoveryError> {
    let events = event_store.load_events(stream_id.clone(), None).await?;
    let mut state = SagaState::new();

    for event in events {
        let action: SagaAction =
            bincode::deserialize(&event.data).map_err(|e| RecoveryError::Decode(e.to_string()))?;
        apply(&mut state, action);
    }

    Ok(state)
}

/// The pure bookkeeping half of each persisted action, mirroring exactly
/// what `SagaReducer::reduce()` mutates on the happy path — recovery never
/// re-derives the retry/compensate decision differently than live traffic
/// would have. Unlike `reduce()`, this never produces effects: timers and
/// step calls are re-armed separately, once, in [`rearm`].
fn apply(state: &mut SagaState, action: SagaAction) {
    match action {
        SagaAction::StartWorkflow {
            workflow_id,
            workflow_type,
            event_id,
            seat_ids,
            booking_id,
            amount,
            correlation_id,
            user_id,
        } => {
            let Some(definition) = crate::workflow::WorkflowDefinition::by_type(&workflow_type) else {
                return;
            };
            let context = SagaContext {
                user_id: Some(user_id),
                event_id,
                seat_ids,
                booking_id,
                amount,
            };
            let instance = SagaState::new_instance(
                workflow_id,
                workflow_type,
                definition.steps,
                context,
                correlation_id.unwrap_or_else(ticketwire_domain::ids::CorrelationId::new),
                chrono::Utc::now(),
            );
            state.instances.insert(workflow_id, instance);
        }

        SagaAction::StepSucceeded { workflow_id, step_index } => {
            if let Some(instance) = state.instances.get_mut(&workflow_id) {
                if !instance.is_current_step(step_index) {
                    return;
                }
                instance.step_states[step_index].status = StepStatus::Succeeded;
                instance.current_step += 1;
                instance.last_error = None;
            }
        }

        SagaAction::StepFailed { workflow_id, step_index, reason } => {
            apply_step_failure(state, workflow_id, step_index, reason);
        }

        SagaAction::StepTimedOut { workflow_id, step_index } => {
            apply_step_failure(state, workflow_id, step_index, "step timed out".to_string());
        }

        SagaAction::WorkflowTimedOut { workflow_id } => {
            if let Some(instance) = state.instances.get_mut(&workflow_id) {
                if instance.status.is_terminal() {
                    return;
                }
                instance.last_error = Some("workflow timed out".to_string());
                let current = instance.current_step;
                if current < instance.step_states.len()
                    && instance.step_states[current].status == StepStatus::InFlight
                {
                    instance.step_states[current].status = StepStatus::Failed;
                }
                instance.status = SagaStatus::Compensating;
            }
        }

        SagaAction::CompensationStepCompleted { workflow_id, step_index } => {
            if let Some(instance) = state.instances.get_mut(&workflow_id) {
                instance.step_states[step_index].status = StepStatus::Compensated;
            }
        }

        SagaAction::WorkflowCompleted { workflow_id } => {
            if let Some(instance) = state.instances.get_mut(&workflow_id) {
                instance.status = SagaStatus::Completed;
            }
        }

        SagaAction::WorkflowCompensated { workflow_id } => {
            if let Some(instance) = state.instances.get_mut(&workflow_id) {
                instance.status = SagaStatus::Compensated;
            }
        }

        SagaAction::ValidationFailed { error, .. } => {
            state.last_error = Some(error);
        }

        SagaAction::RetryStep { .. } => {}
    }
}

/// Shared replay logic for `StepFailed`/`StepTimedOut`, mirroring
/// `SagaReducer::on_step_failure`'s attempts-vs-compensate decision.
fn apply_step_failure(
    state: &mut SagaState,
    workflow_id: ticketwire_domain::ids::WorkflowId,
    step_index: usize,
    reason: String,
) {
    let Some(instance) = state.instances.get_mut(&workflow_id) else {
        return;
    };
    if !instance.is_current_step(step_index) {
        return;
    }

    instance.last_error = Some(reason);
    let attempts = instance.step_states[step_index].attempts;

    if (attempts as usize) < RETRY_BACKOFFS.len() {
        instance.step_states[step_index].attempts += 1;
    } else {
        instance.step_states[step_index].status = StepStatus::Failed;
        instance.status = SagaStatus::Compensating;
    }
}

/// Re-arm every non-terminal instance after [`load`] has rebuilt state:
/// the in-flight step (or in-flight compensation) is re-issued against the
/// executor, and both the per-step and the global workflow deadline are
/// re-armed relative to the current clock, per spec.md §4.6's "timers
/// re-armed using the wall-clock deadline stored with the instance".
///
/// Returns the effects the caller must feed through the same `Store` that
/// owns `state` (recovery happens before the `Store` starts accepting
/// traffic, so there is no reducer round-trip to drive this through).
#[must_use]
pub fn rearm(state: &mut SagaState, env: &SagaEnvironment) -> Vec<Effect<SagaAction>> {
    let mut effects = Vec::new();
    let now = env.clock.now();

    for instance in state.instances.values_mut() {
        if instance.status.is_terminal() {
            continue;
        }

        match instance.status {
            SagaStatus::Running => {
                effects.extend(SagaReducer::execute_current_step(instance, env));
            }
            SagaStatus::Compensating => {
                let from = instance.current_step as isize - 1;
                effects.extend(SagaReducer::advance_compensation(instance, from, env));
            }
            SagaStatus::Completed | SagaStatus::Compensated => unreachable!("filtered above"),
        }

        let elapsed = now.signed_duration_since(instance.started_at);
        let remaining = WORKFLOW_TIMEOUT
            .checked_sub(elapsed.to_std().unwrap_or_default())
            .unwrap_or_default();
        let workflow_id = instance.workflow_id;
        if remaining.is_zero() {
            effects.push(async_effect! {
                Some(SagaAction::WorkflowTimedOut { workflow_id })
            });
        } else {
            effects.push(delay! {
                duration: remaining,
                action: SagaAction::WorkflowTimedOut { workflow_id }
            });
        }
    }

    effects
}

#[cfg(test)]
mod tests {
    use composable_rust_testing::mocks::{test_clock, FixedClock, InMemoryEventBus, InMemoryEventStore};
    use ticketwire_domain::ids::{EventId, UserId, WorkflowId};

    use super::*;
    use crate::executor::ScriptedStepExecutor;

    fn test_env(clock: Arc<dyn Clock>, event_store: Arc<dyn EventStore>) -> SagaEnvironment {
        SagaEnvironment::new(
            clock,
            event_store,
            Arc::new(InMemoryEventBus::default()),
            Arc::new(ScriptedStepExecutor::always_succeeds()),
        )
    }

    #[tokio::test]
    async fn empty_stream_recovers_empty_state() {
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let stream = StreamId::new("saga");
        let state = load(&event_store, &stream).await.expect("loads");
        assert!(state.instances.is_empty());
    }

    #[tokio::test]
    async fn replays_start_and_step_succeeded_into_advancing_instance() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(test_clock()));
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let env = test_env(Arc::clone(&clock), Arc::clone(&event_store));
        let stream = StreamId::new("saga");
        let workflow_id = WorkflowId::new();

        let reducer = SagaReducer::new();
        let mut state = SagaState::new();
        let start = SagaAction::StartWorkflow {
            workflow_id,
            workflow_type: "booking_creation".to_string(),
            user_id: UserId::new(),
            event_id: Some(EventId::new()),
            seat_ids: vec![],
            booking_id: None,
            amount: None,
            correlation_id: None,
        };
        let _ = reducer.reduce(&mut state, start, &env);
        let succeeded = SagaAction::StepSucceeded { workflow_id, step_index: 0 };
        let _ = reducer.reduce(&mut state, succeeded, &env);

        let recovered = load(&event_store, &stream).await.expect("loads");
        let instance = recovered.get(&workflow_id).expect("instance present");
        assert_eq!(instance.current_step, 1);
        assert_eq!(instance.status, SagaStatus::Running);
    }

    #[tokio::test]
    async fn replays_exhausted_retries_into_compensating() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(test_clock()));
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let env = test_env(Arc::clone(&clock), Arc::clone(&event_store));
        let stream = StreamId::new("saga");
        let workflow_id = WorkflowId::new();

        let reducer = SagaReducer::new();
        let mut state = SagaState::new();
        let start = SagaAction::StartWorkflow {
            workflow_id,
            workflow_type: "booking_creation".to_string(),
            user_id: UserId::new(),
            event_id: None,
            seat_ids: vec![],
            booking_id: None,
            amount: None,
            correlation_id: None,
        };
        let _ = reducer.reduce(&mut state, start, &env);

        for _ in 0..=RETRY_BACKOFFS.len() {
            let failed = SagaAction::StepFailed {
                workflow_id,
                step_index: 0,
                reason: "boom".to_string(),
            };
            let _ = reducer.reduce(&mut state, failed, &env);
        }

        let recovered = load(&event_store, &stream).await.expect("loads");
        let instance = recovered.get(&workflow_id).expect("instance present");
        assert_eq!(instance.status, SagaStatus::Compensating);
        assert_eq!(instance.step_states[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn rearm_reissues_the_current_step_for_a_running_instance() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(test_clock()));
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let env = test_env(Arc::clone(&clock), Arc::clone(&event_store));
        let stream = StreamId::new("saga");
        let workflow_id = WorkflowId::new();

        let reducer = SagaReducer::new();
        let mut state = SagaState::new();
        let start = SagaAction::StartWorkflow {
            workflow_id,
            workflow_type: "booking_creation".to_string(),
            user_id: UserId::new(),
            event_id: None,
            seat_ids: vec![],
            booking_id: None,
            amount: None,
            correlation_id: None,
        };
        let _ = reducer.reduce(&mut state, start, &env);

        let mut recovered = load(&event_store, &stream).await.expect("loads");
        let effects = rearm(&mut recovered, &env);

        assert!(!effects.is_empty());
        let instance = recovered.get(&workflow_id).expect("instance present");
        assert_eq!(instance.step_states[0].status, StepStatus::InFlight);
    }

    #[tokio::test]
    async fn rearm_skips_terminal_instances() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(test_clock()));
        let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let env = test_env(Arc::clone(&clock), Arc::clone(&event_store));
        let workflow_id = WorkflowId::new();

        let mut state = SagaState::new();
        let mut instance = SagaState::new_instance(
            workflow_id,
            "booking_creation".to_string(),
            crate::workflow::WorkflowDefinition::booking_creation().steps,
            SagaContext::default(),
            ticketwire_domain::ids::CorrelationId::new(),
            env.clock.now(),
        );
        instance.status = SagaStatus::Completed;
        state.instances.insert(workflow_id, instance);

        let effects = rearm(&mut state, &env);
        assert!(effects.is_empty());
    }
}
