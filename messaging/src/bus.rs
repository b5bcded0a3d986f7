//! AMQP-backed [`EventBus`] implementation.
//!
//! Grounded in `composable_rust_redpanda::RedpandaEventBus` (same trait,
//! same builder shape, same commit-after-forward delivery discipline) but
//! speaking AMQP over `lapin` against durable topic exchanges instead of
//! Kafka-compatible topics, per the broker substituted in this codebase
//! (see `DESIGN.md`).

use crate::topology::{self, EXCHANGES};
use crate::MessagingError;
use composable_rust_core::event::SerializedEvent;
use composable_rust_core::event_bus::{EventBus, EventBusError, EventStream};
use composable_rust_postgres::dead_letter_queue::DeadLetterQueue;
use composable_rust_runtime::retry::{retry_with_backoff, RetryPolicy};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Number of consecutive deserialization failures for the same message
/// before it is routed to the dead-letter queue instead of redelivered.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// AMQP event bus implementation over a durable topic-exchange topology.
///
/// One instance owns one AMQP channel, declares the four domain exchanges
/// and this service's own durable queue, and binds that queue per the
/// fixed service binding table in [`topology::bindings_for`].
pub struct AmqpEventBus {
    channel: Channel,
    service_name: String,
    queue_name: String,
    dlq: Option<Arc<DeadLetterQueue>>,
    delivery_attempts: Arc<Mutex<HashMap<String, u32>>>,
}

impl AmqpEventBus {
    /// Connect to the broker at `uri`, declaring this service's exchange
    /// and queue topology.
    ///
    /// Connection is attempted with exponential backoff (see
    /// [`composable_rust_runtime::retry`]) so a broker that is still
    /// starting up does not fail service startup outright.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Amqp`] if the connection or topology
    /// declaration ultimately fails after retries are exhausted.
    pub async fn connect(uri: &str, service_name: &str) -> Result<Self, MessagingError> {
        let policy = RetryPolicy::builder()
            .max_retries(5)
            .initial_delay(std::time::Duration::from_millis(200))
            .max_delay(std::time::Duration::from_secs(10))
            .build();

        let connection = retry_with_backoff(policy, || async {
            Connection::connect(uri, ConnectionProperties::default()).await
        })
        .await?;

        let channel = connection.create_channel().await?;
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;

        for exchange in EXCHANGES {
            channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        let queue_name = format!("{service_name}.queue");
        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        for (exchange, routing_key) in topology::bindings_for(service_name) {
            channel
                .queue_bind(
                    &queue_name,
                    exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;

            tracing::info!(
                queue = %queue_name,
                exchange = %exchange,
                routing_key = %routing_key,
                "bound queue to exchange"
            );
        }

        tracing::info!(service = %service_name, queue = %queue_name, "AMQP event bus connected");

        Ok(Self {
            channel,
            service_name: service_name.to_string(),
            queue_name,
            dlq: None,
            delivery_attempts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Attach a dead-letter queue that poison messages are persisted to
    /// after exhausting [`MAX_DELIVERY_ATTEMPTS`].
    #[must_use]
    pub fn with_dead_letter_queue(mut self, dlq: Arc<DeadLetterQueue>) -> Self {
        self.dlq = Some(dlq);
        self
    }

    /// The durable queue name this bus consumes from.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl EventBus for AmqpEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let routing_key = topic.to_string();
        let event = event.clone();
        let channel = self.channel.clone();

        Box::pin(async move {
            let exchange = topology::exchange_for_routing_key(&routing_key).map_err(|e| {
                EventBusError::InvalidTopic(format!("{routing_key}: {e}"))
            })?;

            let message_id = event
                .metadata
                .as_ref()
                .and_then(|m| m.get("event_id"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string);

            let mut properties = BasicProperties::default()
                .with_delivery_mode(2) // persistent
                .with_content_type("application/json".into());
            if let Some(message_id) = message_id {
                properties = properties.with_message_id(message_id.into());
            }

            channel
                .basic_publish(
                    exchange,
                    &routing_key,
                    BasicPublishOptions::default(),
                    &event.data,
                    properties,
                )
                .await
                .map_err(|e| EventBusError::PublishFailed {
                    topic: routing_key.clone(),
                    reason: e.to_string(),
                })?
                .await
                .map_err(|e| EventBusError::PublishFailed {
                    topic: routing_key.clone(),
                    reason: e.to_string(),
                })?;

            tracing::debug!(exchange = %exchange, routing_key = %routing_key, "event published");
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let channel = self.channel.clone();
        let queue_name = self.queue_name.clone();
        let service_name = self.service_name.clone();
        let dlq = self.dlq.clone();
        let delivery_attempts = Arc::clone(&self.delivery_attempts);

        Box::pin(async move {
            // Additional ad hoc bindings requested at subscribe time, on top
            // of the fixed per-service table bound at connect().
            for pattern in &topics {
                if let Ok(exchange) = topology::exchange_for_routing_key(pattern) {
                    channel
                        .queue_bind(
                            &queue_name,
                            exchange,
                            pattern,
                            QueueBindOptions::default(),
                            FieldTable::default(),
                        )
                        .await
                        .map_err(|e| EventBusError::SubscriptionFailed {
                            topics: topics.clone(),
                            reason: e.to_string(),
                        })?;
                }
            }

            let consumer = channel
                .basic_consume(
                    &queue_name,
                    &format!("{service_name}-consumer"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: e.to_string(),
                })?;

            tracing::info!(queue = %queue_name, topics = ?topics, "subscribed to queue");

            let (tx, rx) = tokio::sync::mpsc::channel(1000);

            tokio::spawn(async move {
                use futures::StreamExt;

                let mut consumer = consumer;
                while let Some(delivery_result) = consumer.next().await {
                    let Ok(delivery) = delivery_result else {
                        tracing::warn!("failed to receive delivery from broker");
                        continue;
                    };

                    let routing_key = delivery.routing_key.as_str().to_string();
                    let dedup_key = delivery
                        .properties
                        .message_id()
                        .clone()
                        .map_or_else(|| routing_key.clone(), |id| id.to_string());

                    match serde_json::from_slice::<serde_json::Value>(&delivery.data) {
                        Ok(_) => {
                            let event =
                                SerializedEvent::new(routing_key.clone(), delivery.data.clone(), None);

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }

                            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                tracing::warn!(error = %e, "failed to ack delivery");
                            }

                            delivery_attempts.lock().await.remove(&dedup_key);
                        }
                        Err(e) => {
                            let attempts = {
                                let mut attempts = delivery_attempts.lock().await;
                                let count = attempts.entry(dedup_key.clone()).or_insert(0);
                                *count += 1;
                                *count
                            };

                            tracing::warn!(
                                routing_key = %routing_key,
                                attempts,
                                error = %e,
                                "failed to deserialize delivery"
                            );

                            if attempts >= MAX_DELIVERY_ATTEMPTS {
                                if let Some(dlq) = &dlq {
                                    let poisoned = SerializedEvent::new(
                                        routing_key.clone(),
                                        delivery.data.clone(),
                                        None,
                                    );
                                    if let Err(dlq_err) = dlq
                                        .add_entry(
                                            &queue_name,
                                            &poisoned,
                                            chrono::Utc::now(),
                                            &e.to_string(),
                                            None,
                                            attempts as i32,
                                        )
                                        .await
                                    {
                                        tracing::error!(error = %dlq_err, "failed to persist to DLQ");
                                    }
                                }
                                delivery_attempts.lock().await.remove(&dedup_key);
                                if let Err(e) = delivery
                                    .nack(BasicNackOptions {
                                        requeue: false,
                                        ..BasicNackOptions::default()
                                    })
                                    .await
                                {
                                    tracing::warn!(error = %e, "failed to nack poison delivery");
                                }
                            } else if let Err(e) = delivery
                                .nack(BasicNackOptions {
                                    requeue: true,
                                    ..BasicNackOptions::default()
                                })
                                .await
                            {
                                tracing::warn!(error = %e, "failed to nack delivery for retry");
                            }
                        }
                    }
                }

                tracing::debug!("consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AmqpEventBus>();
        assert_sync::<AmqpEventBus>();
    }
}
