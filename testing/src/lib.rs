//! # Composable Rust Testing
//!
//! Testing utilities and helpers for the Composable Rust architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Test helpers and builders
//! - Property-based testing utilities
//! - Assertion helpers for reducers and stores
//!
//! ## Example
//!
//! ```ignore
//! use composable_rust_testing::test_clock;
//! use composable_rust_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_order_flow() {
//!     let env = test_environment();
//!     let store = OrderStore::new(OrderState::default(), OrderReducer, env);
//!
//!     store.send(OrderAction::PlaceOrder {
//!         customer_id: CustomerId::new(1),
//!         items: vec![],
//!     }).await;
//!
//!     let state = store.state(|s| s.clone()).await;
//!     assert_eq!(state.orders.len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use composable_rust_core::environment::Clock;

/// Mock implementations of Environment traits
///
/// Mock implementations for testing: `FixedClock` for deterministic time,
/// `InMemoryEventStore` and `InMemoryEventBus` for exercising reducers that
/// issue `Effect::EventStore`/`Effect::PublishEvent` without a real Postgres
/// or message broker.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use composable_rust_core::event::SerializedEvent;
    use composable_rust_core::event_bus::{EventBus, EventBusError, EventStream};
    use composable_rust_core::event_store::{EventStore, EventStoreError};
    use composable_rust_core::stream::{StreamId, Version};
    use futures::stream;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_rust_testing::mocks::FixedClock;
    /// use composable_rust_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    #[derive(Default)]
    struct EventStoreState {
        streams: HashMap<StreamId, Vec<SerializedEvent>>,
        snapshots: HashMap<StreamId, (Version, Vec<u8>)>,
    }

    /// In-memory [`EventStore`] for unit tests.
    ///
    /// Streams live only for the lifetime of the value; there is no
    /// persistence. Optimistic concurrency is enforced the same way a real
    /// store would: `expected_version` must match the stream's current
    /// version or the append is rejected.
    #[derive(Default)]
    pub struct InMemoryEventStore {
        state: Mutex<EventStoreState>,
    }

    impl InMemoryEventStore {
        /// Create an empty event store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl EventStore for InMemoryEventStore {
        fn append_events(
            &self,
            stream_id: StreamId,
            expected_version: Option<Version>,
            events: Vec<SerializedEvent>,
        ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
            Box::pin(async move {
                let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let stream = state.streams.entry(stream_id.clone()).or_default();
                let current_version = Version::new(stream.len() as u64);

                if let Some(expected) = expected_version {
                    if expected != current_version {
                        return Err(EventStoreError::ConcurrencyConflict {
                            stream_id,
                            expected,
                            actual: current_version,
                        });
                    }
                }

                stream.extend(events);
                Ok(Version::new(stream.len() as u64))
            })
        }

        fn load_events(
            &self,
            stream_id: StreamId,
            from_version: Option<Version>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
        {
            Box::pin(async move {
                let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let events = state.streams.get(&stream_id).cloned().unwrap_or_default();
                let from = from_version.map_or(0, |v| v.value() as usize);
                Ok(events.into_iter().skip(from).collect())
            })
        }

        fn save_snapshot(
            &self,
            stream_id: StreamId,
            version: Version,
            state_bytes: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventStoreError>> + Send + '_>> {
            Box::pin(async move {
                let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                state.snapshots.insert(stream_id, (version, state_bytes));
                Ok(())
            })
        }

        fn load_snapshot(
            &self,
            stream_id: StreamId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<(Version, Vec<u8>)>, EventStoreError>> + Send + '_>>
        {
            Box::pin(async move {
                let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                Ok(state.snapshots.get(&stream_id).cloned())
            })
        }
    }

    /// In-memory [`EventBus`] for unit tests, backed by a broadcast channel.
    ///
    /// Every subscriber sees every published event regardless of the
    /// requested topic filter being honored upstream; topic filtering
    /// happens client-side in `subscribe`, matching at-least-once,
    /// no-ordering-guarantee-across-topics semantics of the real bus.
    pub struct InMemoryEventBus {
        sender: broadcast::Sender<(String, SerializedEvent)>,
    }

    impl Default for InMemoryEventBus {
        fn default() -> Self {
            let (sender, _) = broadcast::channel(1024);
            Self { sender }
        }
    }

    impl InMemoryEventBus {
        /// Create a new in-memory event bus.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl EventBus for InMemoryEventBus {
        fn publish(
            &self,
            topic: &str,
            event: &SerializedEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
            let topic = topic.to_string();
            let event = event.clone();
            Box::pin(async move {
                // No subscribers is not an error: at-least-once delivery only
                // promises delivery to subscribers that exist at publish time.
                let _ = self.sender.send((topic, event));
                Ok(())
            })
        }

        fn subscribe(
            &self,
            topics: &[&str],
        ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
            let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
            let receiver = self.sender.subscribe();
            Box::pin(async move {
                let stream = stream::unfold(receiver, move |mut receiver| {
                    let topics = topics.clone();
                    async move {
                        loop {
                            match receiver.recv().await {
                                Ok((topic, event)) if topics.iter().any(|t| t == &topic) => {
                                    return Some((Ok(event), receiver));
                                },
                                Ok(_) => continue,
                                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                                Err(broadcast::error::RecvError::Closed) => return None,
                            }
                        }
                    }
                });
                Ok(Box::pin(stream) as EventStream)
            })
        }
    }
}

/// Test helpers and utilities
///
/// # Phase 1 Implementation
///
/// This module will contain:
/// - Builder patterns for common test scenarios
/// - Assertion helpers
/// - Test data generators
///
/// Test helpers and utilities.
pub mod helpers {
    // Placeholder for test helpers
}

/// Property-based testing utilities
///
/// # Phase 1 Implementation
///
/// This module will contain:
/// - proptest Arbitrary implementations
/// - Custom strategies for domain types
/// - Property test helpers
///
/// Property-based testing utilities using proptest.
pub mod properties {
    // Placeholder for property test utilities
}


/// In-memory `Projection`/`ProjectionStore`/`ProjectionCheckpoint` mocks.
pub mod projection_mocks;

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::ReducerTest;
pub use projection_mocks::{InMemoryProjectionCheckpoint, InMemoryProjectionStore, ProjectionTestHarness};

// Placeholder test module
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
