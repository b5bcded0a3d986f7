//! Bus consumption: the pull-model entry point for payment creation.
//!
//! Subscribes to the `"booking"` topic and, for every `booking.initiated`
//! envelope observed, dispatches a `BookingInitiatedObserved` action into
//! the store. This races the HTTP push path (`POST /api/v1/payments`); both
//! converge on `PaymentReducer::initiate` and `PaymentState`'s dedup index,
//! grounded on `reservation-store/src/sweeper.rs`'s background-task shape.

use std::sync::Arc;

use composable_rust_core::event_bus::EventBus;
use composable_rust_runtime::Store;
use futures::StreamExt;
use ticketwire_domain::envelope::EventEnvelope;
use ticketwire_domain::events::BookingInitiated;

use crate::reducer::{PaymentAction, PaymentEnvironment, PaymentReducer};
use crate::types::PaymentState;

/// Subscribe to the booking domain's bus topic and feed `booking.initiated`
/// envelopes into `store` as they arrive. The returned handle is detached;
/// callers that want graceful shutdown should abort it themselves.
pub async fn spawn_consumer(
    event_bus: Arc<dyn EventBus>,
    store: Arc<Store<PaymentState, PaymentAction, PaymentEnvironment, PaymentReducer>>,
) -> Result<tokio::task::JoinHandle<()>, composable_rust_core::event_bus::EventBusError> {
    let mut stream = event_bus.subscribe(&["booking"]).await?;

    Ok(tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(serialized) if serialized.event_type == "booking.initiated" => {
                    match serde_json::from_slice::<EventEnvelope<BookingInitiated>>(
                        &serialized.data,
                    ) {
                        Ok(envelope) => {
                            let action = PaymentAction::BookingInitiatedObserved {
                                source_event_id: envelope.event_id.as_uuid(),
                                booking_id: envelope.data.booking_id,
                                user_id: envelope.data.user_id,
                                amount: envelope.data.amount,
                            };
                            let _handle = store.send(action).await;
                        }
                        Err(error) => {
                            tracing::warn!(%error, "failed to decode booking.initiated envelope");
                        }
                    }
                }
                Ok(_other) => {}
                Err(error) => {
                    tracing::error!(%error, "booking topic subscription error");
                }
            }
        }
    }))
}
