//! Bus consumption: the entry point that turns a `booking.initiated` event
//! into a new workflow instance.
//!
//! Spec.md places workflow creation on "the initiator service on HTTP
//! request" — booking-service's `POST /api/v1/bookings` handler, which
//! dispatches its own `CreateBooking` command and, on success, publishes
//! `booking.initiated`. This consumer is what turns that publish into the
//! saga's `StartWorkflow`, grounded on `booking-service/src/consumer.rs`'s
//! subscribe-and-dispatch shape.

use std::sync::Arc;

use composable_rust_core::event_bus::EventBus;
use composable_rust_runtime::Store;
use futures::StreamExt;
use ticketwire_domain::events::TicketingEvent;
use ticketwire_domain::ids::WorkflowId;

use crate::engine::{SagaAction, SagaEnvironment, SagaReducer};
use crate::types::SagaState;

/// Which [`crate::workflow::WorkflowDefinition`] a freshly-initiated
/// booking starts.
const BOOKING_CREATION_WORKFLOW: &str = "booking_creation";

/// Subscribe to the `"booking"` topic and start a `booking_creation`
/// workflow for every `booking.initiated` envelope observed. The returned
/// handle is detached; callers that want graceful shutdown should abort it
/// themselves.
pub async fn spawn_consumer(
    event_bus: Arc<dyn EventBus>,
    store: Arc<Store<SagaState, SagaAction, SagaEnvironment, SagaReducer>>,
) -> Result<tokio::task::JoinHandle<()>, composable_rust_core::event_bus::EventBusError> {
    let mut stream = event_bus.subscribe(&["booking"]).await?;

    Ok(tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(serialized) => {
                    let raw: serde_json::Value = match serde_json::from_slice(&serialized.data) {
                        Ok(value) => value,
                        Err(error) => {
                            tracing::warn!(%error, "failed to parse bus envelope as JSON");
                            continue;
                        }
                    };
                    match TicketingEvent::from_routing_key(&serialized.event_type, raw) {
                        Ok(TicketingEvent::BookingInitiated(envelope)) => {
                            let seat_ids = envelope.data.items.iter().map(|item| item.seat_id).collect();
                            let action = SagaAction::StartWorkflow {
                                workflow_id: WorkflowId::new(),
                                workflow_type: BOOKING_CREATION_WORKFLOW.to_string(),
                                user_id: envelope.data.user_id,
                                event_id: Some(envelope.data.event_id),
                                seat_ids,
                                booking_id: Some(envelope.data.booking_id),
                                amount: Some(envelope.data.total_amount),
                                correlation_id: Some(envelope.correlation_id),
                            };
                            let _handle = store.send(action).await;
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::warn!(
                                event_type = %serialized.event_type,
                                %error,
                                "failed to decode bus envelope"
                            );
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "booking topic subscription error");
                }
            }
        }
    }))
}
