//! Step execution: turning a workflow step into an actual call against the
//! service that owns it.
//!
//! Modeled as an opaque capability, the same shape as
//! `payment_service::provider::PaymentProvider` — an object-safe
//! `Pin<Box<dyn Future>>` trait with a `reqwest`-backed production
//! implementation and a scripted test double, grounded in the teacher's
//! `examples/ticketing/src/payment_gateway.rs`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::types::SagaContext;
use crate::workflow::WorkflowStep;

/// Why a step's forward or compensating call failed.
#[derive(Clone, Debug)]
pub struct StepError {
    /// A human-readable reason.
    pub reason: String,
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for StepError {}

impl StepError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Runs a workflow step's forward command and, separately, its
/// compensating command.
pub trait StepExecutor: Send + Sync {
    /// Execute `step`'s forward command against its owning service.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] if the call fails or the service rejects it.
    fn execute(
        &self,
        step: WorkflowStep,
        context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;

    /// Run `step`'s compensating command, undoing its effect.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] if the call fails. Callers treat compensation
    /// failure as best-effort and continue compensating earlier steps.
    fn compensate(
        &self,
        step: WorkflowStep,
        context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;
}

/// How long a single forward or compensating call is allowed to take.
const STEP_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Production [`StepExecutor`]: each service's base URL is configured once,
/// and every step/compensation call becomes a `POST` against a fixed path
/// convention (`/internal/steps/{command}`). Individual services are free
/// to reject a step they don't recognize; the executor only shuttles the
/// request, it does not interpret business outcomes.
#[derive(Clone)]
pub struct HttpStepExecutor {
    client: reqwest::Client,
    base_urls: HashMap<&'static str, String>,
}

impl HttpStepExecutor {
    /// Build an executor over a fixed `service -> base URL` map (e.g.
    /// `"payment-service" -> "http://payment-service:8083"`).
    #[must_use]
    pub fn new(base_urls: HashMap<&'static str, String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(STEP_CALL_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_urls,
        }
    }

    async fn call(
        &self,
        step: &WorkflowStep,
        command: &str,
        context: &SagaContext,
    ) -> Result<(), StepError> {
        let base_url = self
            .base_urls
            .get(step.service)
            .ok_or_else(|| StepError::new(format!("no base URL configured for {}", step.service)))?;

        let url = format!("{base_url}/internal/steps/{command}");
        let response = self
            .client
            .post(&url)
            .json(&StepRequest { context })
            .send()
            .await
            .map_err(|error| StepError::new(error.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StepError::new(format!(
                "{} responded {}",
                step.service,
                response.status()
            )))
        }
    }
}

#[derive(serde::Serialize)]
struct StepRequest<'a> {
    context: &'a SagaContext,
}

impl StepExecutor for HttpStepExecutor {
    fn execute(
        &self,
        step: WorkflowStep,
        context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>> {
        let this = self.clone();
        Box::pin(async move { this.call(&step, step.command, &context).await })
    }

    fn compensate(
        &self,
        step: WorkflowStep,
        context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>> {
        let this = self.clone();
        Box::pin(async move {
            match step.compensation_command {
                Some(command) => this.call(&step, command, &context).await,
                None => Ok(()),
            }
        })
    }
}

/// A scripted [`StepExecutor`] for tests: every step named in `failing`
/// fails, every other step succeeds after a short simulated delay.
/// Grounded on `payment_service::provider::MockPaymentProvider`'s
/// always-succeeds-unless-told-otherwise shape.
#[derive(Clone, Debug, Default)]
pub struct ScriptedStepExecutor {
    failing: std::collections::HashSet<&'static str>,
}

impl ScriptedStepExecutor {
    /// An executor where every step succeeds.
    #[must_use]
    pub fn always_succeeds() -> Self {
        Self::default()
    }

    /// An executor where `step_name` fails (forward command only); every
    /// other step, and every compensation, succeeds.
    #[must_use]
    pub fn failing_at(step_name: &'static str) -> Self {
        Self {
            failing: std::iter::once(step_name).collect(),
        }
    }
}

impl StepExecutor for ScriptedStepExecutor {
    fn execute(
        &self,
        step: WorkflowStep,
        _context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>> {
        let fails = self.failing.contains(step.name);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if fails {
                Err(StepError::new(format!("{} was scripted to fail", step.name)))
            } else {
                Ok(())
            }
        })
    }

    fn compensate(
        &self,
        _step: WorkflowStep,
        _context: SagaContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        })
    }
}
