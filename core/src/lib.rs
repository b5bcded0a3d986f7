//! # Composable Rust Core
//!
//! Core traits and types for the Composable Rust architecture.
//!
//! This crate provides the fundamental abstractions for building event-driven,
//! functional backend systems using the Reducer pattern with CQRS and Event Sourcing.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature
//! - **Action**: All possible inputs to a reducer (commands, events, cross-aggregate events)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//! - Zero-Cost Abstractions
//!
//! ## Example
//!
//! ```ignore
//! use composable_rust_core::*;
//!
//! // Define your state
//! #[derive(Clone, Debug)]
//! struct OrderState {
//!     orders: HashMap<OrderId, Order>,
//! }
//!
//! // Define your actions
//! #[derive(Clone, Debug)]
//! enum OrderAction {
//!     PlaceOrder { customer_id: CustomerId, items: Vec<LineItem> },
//!     OrderPlaced { order_id: OrderId, timestamp: DateTime<Utc> },
//! }
//!
//! // Implement the reducer
//! impl Reducer for OrderReducer {
//!     type State = OrderState;
//!     type Action = OrderAction;
//!     type Environment = OrderEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut OrderState,
//!         action: OrderAction,
//!         env: &OrderEnvironment,
//!     ) -> Vec<Effect<OrderAction>> {
//!         // Business logic goes here
//!         vec![]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod composition;
pub mod event;
pub mod event_bus;
pub mod event_store;
mod effect_macros;
pub mod projection;
pub mod stream;

/// Action module - reserved for action-level trait helpers.
///
/// Actions represent all possible state transitions in the system.
/// They unify commands (requests to change state) and events (facts about what happened).
/// Concrete action types are plain enums defined by each service; this module
/// currently has nothing to add on top of that.
pub mod action {}

/// State module - reserved for state-level trait helpers.
///
/// State represents the current domain state of a feature.
/// It should be owned data, Clone-able, and avoid lifetimes where possible.
pub mod state {}

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for OrderReducer {
    ///     type State = OrderState;
    ///     type Action = OrderAction;
    ///     type Environment = OrderEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut OrderState,
    ///         action: OrderAction,
    ///         env: &OrderEnvironment,
    ///     ) -> Vec<Effect<OrderAction>> {
    ///         match action {
    ///             OrderAction::PlaceOrder { customer_id, items } => {
    ///                 // Business logic here
    ///                 vec![Effect::None]
    ///             }
    ///             _ => vec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// A vector of effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Vec<Effect<Self::Action>>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable: `None`/`Parallel`/`Sequential`
/// combine sub-effects, `Delay` schedules a future action, `Future` wraps arbitrary
/// async work, and `EventStore`/`PublishEvent` describe event-sourcing I/O that the
/// `composable-rust-runtime` `Store` executes on the reducer's behalf.
pub mod effect {
    use crate::event::SerializedEvent;
    use crate::event_bus::{EventBus, EventBusError};
    use crate::event_store::{EventStore, EventStoreError};
    use crate::stream::{StreamId, Version};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// A declarative request to append events to the event store.
    ///
    /// `on_success`/`on_error` translate the operation's result into an optional
    /// follow-up action, which the runtime feeds back into the reducer.
    #[allow(missing_docs)]
    pub enum EventStoreOperation<Action> {
        AppendEvents {
            event_store: Arc<dyn EventStore>,
            stream_id: StreamId,
            expected_version: Option<Version>,
            events: Vec<SerializedEvent>,
            on_success: Box<dyn FnOnce(Version) -> Option<Action> + Send>,
            on_error: Box<dyn FnOnce(EventStoreError) -> Option<Action> + Send>,
        },
        LoadEvents {
            event_store: Arc<dyn EventStore>,
            stream_id: StreamId,
            from_version: Option<Version>,
            on_success: Box<dyn FnOnce(Vec<SerializedEvent>) -> Option<Action> + Send>,
            on_error: Box<dyn FnOnce(EventStoreError) -> Option<Action> + Send>,
        },
        SaveSnapshot {
            event_store: Arc<dyn EventStore>,
            stream_id: StreamId,
            version: Version,
            state: Vec<u8>,
            on_success: Box<dyn FnOnce(()) -> Option<Action> + Send>,
            on_error: Box<dyn FnOnce(EventStoreError) -> Option<Action> + Send>,
        },
        LoadSnapshot {
            event_store: Arc<dyn EventStore>,
            stream_id: StreamId,
            on_success: Box<dyn FnOnce(Option<(Version, Vec<u8>)>) -> Option<Action> + Send>,
            on_error: Box<dyn FnOnce(EventStoreError) -> Option<Action> + Send>,
        },
    }

    /// A declarative request to publish an event onto the event bus.
    #[allow(missing_docs)]
    pub enum EventBusOperation<Action> {
        Publish {
            event_bus: Arc<dyn EventBus>,
            topic: String,
            event: SerializedEvent,
            on_success: Box<dyn FnOnce(()) -> Option<Action> + Send>,
            on_error: Box<dyn FnOnce(EventBusError) -> Option<Action> + Send>,
        },
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    #[allow(missing_docs)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, retries)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Event store operation (append/load events, save/load snapshots)
        EventStore(EventStoreOperation<Action>),

        /// Event bus publish operation
        PublishEvent(EventBusOperation<Action>),
    }

    // Manual Debug implementation since Future/EventStore/PublishEvent don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::EventStore(_) => write!(f, "Effect::EventStore(<operation>)"),
                Effect::PublishEvent(_) => write!(f, "Effect::PublishEvent(<operation>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Transform the action type of this effect
        ///
        /// This is useful for composing effects from different reducers or
        /// wrapping actions in a higher-level action type.
        ///
        /// # Type Parameters
        ///
        /// - `B`: The target action type
        /// - `F`: Function that transforms `Action` to `B`
        ///
        /// # Arguments
        ///
        /// - `f`: The transformation function
        ///
        /// # Returns
        ///
        /// A new effect that produces actions of type `B`
        ///
        /// # Examples
        ///
        /// ```rust,ignore
        /// // Transform counter actions to app-level actions
        /// let counter_effect: Effect<CounterAction> = Effect::Delay {
        ///     duration: Duration::from_secs(1),
        ///     action: Box::new(CounterAction::Increment),
        /// };
        ///
        /// let app_effect: Effect<AppAction> = counter_effect.map(|a| AppAction::Counter(a));
        /// ```
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            F: Fn(Action) -> B + Send + Sync + 'static + Clone,
            Action: 'static,
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    let mapped: Vec<Effect<B>> = effects
                        .into_iter()
                        .map(|e| {
                            let f_clone = f.clone();
                            map_effect(e, f_clone)
                        })
                        .collect();
                    Effect::Parallel(mapped)
                },
                Effect::Sequential(effects) => {
                    let mapped: Vec<Effect<B>> = effects
                        .into_iter()
                        .map(|e| {
                            let f_clone = f.clone();
                            map_effect(e, f_clone)
                        })
                        .collect();
                    Effect::Sequential(mapped)
                },
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => {
                    Effect::Future(Box::pin(async move { fut.await.map(f) }))
                },
                Effect::EventStore(op) => Effect::EventStore(map_event_store_op(op, f)),
                Effect::PublishEvent(op) => Effect::PublishEvent(map_event_bus_op(op, f)),
            }
        }
    }

    fn map_event_store_op<A, B, F>(op: EventStoreOperation<A>, f: F) -> EventStoreOperation<B>
    where
        F: Fn(A) -> B + Send + Sync + 'static + Clone,
        A: 'static,
        B: Send + 'static,
    {
        match op {
            EventStoreOperation::AppendEvents {
                event_store,
                stream_id,
                expected_version,
                events,
                on_success,
                on_error,
            } => {
                let f_success = f.clone();
                EventStoreOperation::AppendEvents {
                    event_store,
                    stream_id,
                    expected_version,
                    events,
                    on_success: Box::new(move |v| on_success(v).map(f_success)),
                    on_error: Box::new(move |e| on_error(e).map(f)),
                }
            },
            EventStoreOperation::LoadEvents {
                event_store,
                stream_id,
                from_version,
                on_success,
                on_error,
            } => {
                let f_success = f.clone();
                EventStoreOperation::LoadEvents {
                    event_store,
                    stream_id,
                    from_version,
                    on_success: Box::new(move |events| on_success(events).map(f_success)),
                    on_error: Box::new(move |e| on_error(e).map(f)),
                }
            },
            EventStoreOperation::SaveSnapshot {
                event_store,
                stream_id,
                version,
                state,
                on_success,
                on_error,
            } => {
                let f_success = f.clone();
                EventStoreOperation::SaveSnapshot {
                    event_store,
                    stream_id,
                    version,
                    state,
                    on_success: Box::new(move |()| on_success(()).map(f_success)),
                    on_error: Box::new(move |e| on_error(e).map(f)),
                }
            },
            EventStoreOperation::LoadSnapshot {
                event_store,
                stream_id,
                on_success,
                on_error,
            } => {
                let f_success = f.clone();
                EventStoreOperation::LoadSnapshot {
                    event_store,
                    stream_id,
                    on_success: Box::new(move |snapshot| on_success(snapshot).map(f_success)),
                    on_error: Box::new(move |e| on_error(e).map(f)),
                }
            },
        }
    }

    fn map_event_bus_op<A, B, F>(op: EventBusOperation<A>, f: F) -> EventBusOperation<B>
    where
        F: Fn(A) -> B + Send + Sync + 'static + Clone,
        A: 'static,
        B: Send + 'static,
    {
        match op {
            EventBusOperation::Publish {
                event_bus,
                topic,
                event,
                on_success,
                on_error,
            } => {
                let f_success = f.clone();
                EventBusOperation::Publish {
                    event_bus,
                    topic,
                    event,
                    on_success: Box::new(move |()| on_success(()).map(f_success)),
                    on_error: Box::new(move |e| on_error(e).map(f)),
                }
            },
        }
    }

    // Helper function to avoid recursion in type system
    fn map_effect<A, B, F>(effect: Effect<A>, f: F) -> Effect<B>
    where
        F: Fn(A) -> B + Send + Sync + 'static + Clone,
        A: 'static,
        B: Send + 'static,
    {
        match effect {
            Effect::None => Effect::None,
            Effect::Parallel(effects) => {
                let mapped: Vec<Effect<B>> = effects
                    .into_iter()
                    .map(|e| {
                        let f_clone = f.clone();
                        map_effect(e, f_clone)
                    })
                    .collect();
                Effect::Parallel(mapped)
            },
            Effect::Sequential(effects) => {
                let mapped: Vec<Effect<B>> = effects
                    .into_iter()
                    .map(|e| {
                        let f_clone = f.clone();
                        map_effect(e, f_clone)
                    })
                    .collect();
                Effect::Sequential(mapped)
            },
            Effect::Delay { duration, action } => Effect::Delay {
                duration,
                action: Box::new(f(*action)),
            },
            Effect::Future(fut) => {
                Effect::Future(Box::pin(async move { fut.await.map(f) }))
            },
            Effect::EventStore(op) => Effect::EventStore(map_event_store_op(op, f)),
            Effect::PublishEvent(op) => Effect::PublishEvent(map_event_bus_op(op, f)),
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter. `EventStore` and `EventBus` are injected
/// directly as `Arc<dyn _>` handles carried inside `Effect::EventStore`/
/// `Effect::PublishEvent` rather than through a separate trait here, since
/// the effect already owns the handle it needs to call.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         Utc::now()
    ///     }
    /// }
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }
}
