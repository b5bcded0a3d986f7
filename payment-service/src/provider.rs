//! The external payment provider, modeled as an opaque capability
//! (spec.md §4.5): `authorize`, `capture`, `refund`. Grounded on
//! `examples/ticketing/src/payment_gateway.rs`'s `PaymentGateway` trait —
//! same `Pin<Box<dyn Future>>` object-safe shape, same mock-always-succeeds
//! default implementation for development and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ticketwire_domain::ids::PaymentId;
use ticketwire_domain::money::Money;

/// Result of a successful authorize/capture call.
#[derive(Clone, Debug)]
pub struct Authorization {
    /// The provider's own reference for this charge.
    pub external_reference: String,
}

/// Result of a successful refund call.
#[derive(Clone, Debug)]
pub struct RefundReceipt {
    /// The provider's own reference for this refund.
    pub external_reference: String,
}

/// Why the provider declined or errored.
#[derive(Clone, Debug)]
pub struct ProviderError {
    /// A human-readable reason, suitable for `Payment::failure_reason`.
    pub reason: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ProviderError {}

/// An external payment provider (Stripe, PayPal, Apple Pay, ...) modeled as
/// an opaque capability. Idempotency keys are set to `payment_id` so a
/// retried `authorize`/`capture` call never double-charges.
pub trait PaymentProvider: Send + Sync {
    /// Authorize and capture a charge for `amount` against `payment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider declines or is unreachable.
    fn authorize_and_capture(
        &self,
        payment_id: PaymentId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<Authorization, ProviderError>> + Send>>;

    /// Refund a previously captured charge.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider rejects the refund.
    fn refund(
        &self,
        payment_id: PaymentId,
        external_reference: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<RefundReceipt, ProviderError>> + Send>>;
}

/// A provider that always succeeds after a short simulated delay, for
/// development and tests. Production deployments swap in a real gateway
/// client behind the same trait.
#[derive(Clone, Debug, Default)]
pub struct MockPaymentProvider;

impl MockPaymentProvider {
    /// Creates a new mock provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an `Arc`-wrapped instance for sharing across an environment.
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentProvider> {
        Arc::new(Self::new())
    }
}

impl PaymentProvider for MockPaymentProvider {
    fn authorize_and_capture(
        &self,
        payment_id: PaymentId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<Authorization, ProviderError>> + Send>> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let external_reference = format!("mock_charge_{}", uuid::Uuid::new_v4());
            tracing::info!(
                %payment_id,
                amount = %amount,
                %external_reference,
                "mock provider captured payment"
            );
            Ok(Authorization { external_reference })
        })
    }

    fn refund(
        &self,
        payment_id: PaymentId,
        external_reference: &str,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<RefundReceipt, ProviderError>> + Send>> {
        let external_reference = external_reference.to_string();
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            tracing::info!(
                %payment_id,
                %external_reference,
                amount = %amount,
                "mock provider refunded payment"
            );
            Ok(RefundReceipt {
                external_reference: format!("mock_refund_{}", uuid::Uuid::new_v4()),
            })
        })
    }
}
