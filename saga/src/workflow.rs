//! Workflow definitions (spec.md §4.6): an ordered list of steps, each
//! naming the service that owns it, the forward command to run, and the
//! compensating command to run if a later step fails.
//!
//! The teacher's `examples/checkout-saga::CheckoutSaga` hardcodes its three
//! steps directly into `reduce()`'s match arms. Here the step list is data,
//! not code, so new workflow types are added without touching the reducer —
//! the generalization spec.md §4.6 calls for.

use std::time::Duration;

/// One step of a [`WorkflowDefinition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkflowStep {
    /// Human-readable step name, used in logs and in persisted events.
    pub name: &'static str,
    /// The service that executes this step.
    pub service: &'static str,
    /// The forward command name.
    pub command: &'static str,
    /// The compensating command, if this step can be undone.
    pub compensation_command: Option<&'static str>,
    /// Per-step timeout override. `None` means the engine's default
    /// (spec.md §4.6: "per-step default 30 s, overridable per step").
    pub timeout: Option<Duration>,
}

impl WorkflowStep {
    const fn new(
        name: &'static str,
        service: &'static str,
        command: &'static str,
        compensation_command: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            service,
            command,
            compensation_command,
            timeout: None,
        }
    }

    /// Override this step's timeout, replacing the engine's default.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A named, ordered sequence of steps a saga instance executes.
#[derive(Clone, Debug)]
pub struct WorkflowDefinition {
    /// The workflow type name (e.g. `"booking_creation"`).
    pub workflow_type: &'static str,
    /// Steps, in execution order.
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// Validate the user, reserve seats, create the booking record, then
    /// process payment. Restored from `examples/original_source/saga_orchestrator.py`'s
    /// `BookingTicketSaga._initialize_steps`, dropped by the distillation.
    #[must_use]
    pub fn booking_creation() -> Self {
        Self {
            workflow_type: "booking_creation",
            steps: vec![
                WorkflowStep::new("ValidateUser", "user-service", "VALIDATE_USER", None),
                WorkflowStep::new(
                    "ReserveSeats",
                    "event-service",
                    "RESERVE_SEATS",
                    Some("RELEASE_SEATS"),
                ),
                WorkflowStep::new(
                    "CreateBooking",
                    "booking-service",
                    "CREATE_BOOKING",
                    Some("CANCEL_BOOKING"),
                ),
                WorkflowStep::new(
                    "ProcessPayment",
                    "payment-service",
                    "PROCESS_PAYMENT",
                    Some("REFUND_PAYMENT"),
                ),
            ],
        }
    }

    /// Re-reserve seats, charge the payment, and send the confirmation
    /// notification, per spec.md §4.6.
    #[must_use]
    pub fn booking_confirmation() -> Self {
        Self {
            workflow_type: "booking_confirmation",
            steps: vec![
                WorkflowStep::new(
                    "ReserveSeats",
                    "event-service",
                    "RESERVE_SEATS",
                    Some("RELEASE_SEATS"),
                ),
                WorkflowStep::new(
                    "ProcessPayment",
                    "payment-service",
                    "PROCESS_PAYMENT",
                    Some("REFUND_PAYMENT"),
                ),
                WorkflowStep::new(
                    "SendConfirmation",
                    "notification-service",
                    "SEND_CONFIRMATION",
                    None,
                ),
            ],
        }
    }

    /// Look up a workflow definition by its type name.
    #[must_use]
    pub fn by_type(workflow_type: &str) -> Option<Self> {
        match workflow_type {
            "booking_creation" => Some(Self::booking_creation()),
            "booking_confirmation" => Some(Self::booking_confirmation()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_creation_has_four_steps_in_order() {
        let workflow = WorkflowDefinition::booking_creation();
        let names: Vec<_> = workflow.steps.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["ValidateUser", "ReserveSeats", "CreateBooking", "ProcessPayment"]
        );
    }

    #[test]
    fn validate_user_step_has_no_compensation() {
        let workflow = WorkflowDefinition::booking_creation();
        assert_eq!(workflow.steps[0].compensation_command, None);
    }

    #[test]
    fn send_confirmation_is_the_final_uncompensated_step() {
        let workflow = WorkflowDefinition::booking_confirmation();
        let last = workflow.steps.last().expect("non-empty");
        assert_eq!(last.name, "SendConfirmation");
        assert_eq!(last.compensation_command, None);
    }

    #[test]
    fn unknown_workflow_type_resolves_to_none() {
        assert!(WorkflowDefinition::by_type("unknown").is_none());
    }
}
