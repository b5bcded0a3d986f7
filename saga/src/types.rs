//! Saga instance state: where each in-flight workflow sits, step by step.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketwire_domain::ids::{BookingId, CorrelationId, EventId, SeatId, UserId, WorkflowId};
use ticketwire_domain::money::Money;

/// Where a single step sits in its own lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// Not yet attempted.
    Pending,
    /// Forward command dispatched, awaiting a response.
    InFlight,
    /// Completed successfully.
    Succeeded,
    /// Failed after exhausting retries.
    Failed,
    /// Compensated after a later step failed.
    Compensated,
}

/// A single step's accumulated state within a [`SagaInstance`].
#[derive(Clone, Debug)]
pub struct StepState {
    /// Current lifecycle status.
    pub status: StepStatus,
    /// Attempts made so far (I-9: retries never advance `current_step`).
    pub attempts: u32,
}

impl StepState {
    const fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            attempts: 0,
        }
    }
}

/// Where the overall saga instance sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SagaStatus {
    /// Steps are being executed in order.
    Running,
    /// Every step succeeded.
    Completed,
    /// A step failed and compensation has not yet finished.
    Compensating,
    /// Every completed step was compensated; the saga is terminally failed.
    Compensated,
}

impl SagaStatus {
    /// Terminal statuses never transition again (I-9's "terminal status
    /// never re-emits").
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated)
    }
}

/// The business context a workflow carries between steps. Not every field
/// is populated at every point in the workflow — `CreateBooking` fills in
/// `booking_id`, `ProcessPayment` reads `amount`, and so on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SagaContext {
    /// The user this workflow is acting on behalf of.
    pub user_id: Option<UserId>,
    /// The event seats are being reserved against.
    pub event_id: Option<EventId>,
    /// The seats requested.
    pub seat_ids: Vec<SeatId>,
    /// The booking this workflow is creating or confirming.
    pub booking_id: Option<BookingId>,
    /// The amount to charge, once known.
    pub amount: Option<Money>,
}

/// One in-flight (or completed) workflow execution.
#[derive(Clone, Debug)]
pub struct SagaInstance {
    /// This instance's id.
    pub workflow_id: WorkflowId,
    /// Which [`crate::workflow::WorkflowDefinition`] this instance runs.
    pub workflow_type: String,
    /// The step list, snapshotted at start time.
    pub steps: Vec<crate::workflow::WorkflowStep>,
    /// Per-step accumulated state, same length and order as `steps`.
    pub step_states: Vec<StepState>,
    /// Index of the step currently executing (or about to execute).
    pub current_step: usize,
    /// Business context threaded between steps.
    pub context: SagaContext,
    /// Overall instance status.
    pub status: SagaStatus,
    /// Wall-clock deadline for the current step, re-armed on recovery.
    pub deadline: Option<DateTime<Utc>>,
    /// Correlation id for tracing this workflow end to end.
    pub correlation_id: CorrelationId,
    /// The last failure recorded against this instance, if any.
    pub last_error: Option<String>,
    /// When this instance was started.
    pub started_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Whether `step_index` is the instance's current step and the
    /// instance hasn't already moved past it. Event handlers for a given
    /// step must check this before mutating state, so a duplicate or
    /// stale event is a no-op (I-9: retries never advance the step
    /// pointer; a terminal status never re-emits).
    #[must_use]
    pub fn is_current_step(&self, step_index: usize) -> bool {
        !self.status.is_terminal() && self.current_step == step_index
    }
}

/// All saga instances known to this service instance.
#[derive(Clone, Debug, Default)]
pub struct SagaState {
    /// Live instances keyed by workflow id.
    pub instances: HashMap<WorkflowId, SagaInstance>,
    /// The last validation failure, surfaced to callers inspecting state.
    pub last_error: Option<String>,
}

impl SagaState {
    /// An empty saga state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an instance by id.
    #[must_use]
    pub fn get(&self, workflow_id: &WorkflowId) -> Option<&SagaInstance> {
        self.instances.get(workflow_id)
    }

    /// Construct a fresh instance, all steps `Pending`, ready to execute
    /// `current_step == 0`.
    #[must_use]
    pub fn new_instance(
        workflow_id: WorkflowId,
        workflow_type: String,
        steps: Vec<crate::workflow::WorkflowStep>,
        context: SagaContext,
        correlation_id: CorrelationId,
        started_at: DateTime<Utc>,
    ) -> SagaInstance {
        let step_states = steps.iter().map(|_| StepState::pending()).collect();
        SagaInstance {
            workflow_id,
            workflow_type,
            steps,
            step_states,
            current_step: 0,
            context,
            status: SagaStatus::Running,
            deadline: None,
            correlation_id,
            last_error: None,
            started_at,
        }
    }
}
