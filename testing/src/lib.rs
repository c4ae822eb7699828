//! # Eventide Testing
//!
//! Testing utilities and helpers for Eventide event dispatch.
//!
//! This crate provides:
//! - Recording listeners that log their invocation order
//! - Canned listeners (counting, stopping, failing)
//! - A fluent Given-When-Then harness for dispatch tests
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use eventide_testing::{CallLog, DispatchTest};
//!
//! let log = CallLog::new();
//!
//! DispatchTest::new()
//!     .given_listener("event1", 2, log.recorder("second"))
//!     .given_listener("event1", 1, log.recorder("first"))
//!     .when_triggered("event1")
//!     .then_result(|result| assert!(result.is_ok()))
//!     .run();
//!
//! assert_eq!(log.entries(), ["first", "second"]);
//! ```


pub use dispatch_test::DispatchTest;

/// Listener doubles for tests
///
/// Every listener here is a plain [`Callback`](eventide_core::Callback), so
/// it can be attached to either the core bus or the shared runtime bus.
pub mod listeners {
    use eventide_core::{Callback, Event, ListenerError};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Shared, ordered log of listener invocations.
    ///
    /// # Example
    ///
    /// ```
    /// use eventide_core::{EventBus, Params};
    /// use eventide_testing::CallLog;
    ///
    /// let log = CallLog::new();
    /// let mut bus = EventBus::new();
    /// bus.attach("event1", log.recorder("a"));
    /// bus.attach("event1", log.recorder("b"));
    ///
    /// bus.trigger("event1", None, Params::new()).unwrap();
    /// assert_eq!(log.entries(), ["a", "b"]);
    /// ```
    #[derive(Clone, Debug, Default)]
    pub struct CallLog {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl CallLog {
        /// Create an empty log.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry.
        pub fn push(&self, entry: impl Into<String>) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.into());
        }

        /// Copy of all entries, in invocation order.
        #[must_use]
        pub fn entries(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of entries.
        #[must_use]
        pub fn len(&self) -> usize {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether nothing was logged.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Forget all entries.
        pub fn clear(&self) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        /// Listener that logs `label` and returns it as a string value.
        #[must_use]
        pub fn recorder(&self, label: &str) -> Callback {
            let log = self.clone();
            let entry = label.to_string();
            Callback::new(move |_| {
                log.push(entry.clone());
                Ok(Value::String(entry.clone()))
            })
            .with_label(label)
        }

        /// Listener that logs `label`, then stops propagation.
        #[must_use]
        pub fn stopper(&self, label: &str) -> Callback {
            let log = self.clone();
            let entry = label.to_string();
            Callback::new(move |event| {
                log.push(entry.clone());
                event.stop_propagation();
                Ok(Value::String(entry.clone()))
            })
            .with_label(label)
        }

        /// Listener that logs `label`, then fails with `message`.
        #[must_use]
        pub fn failer(&self, label: &str, message: &str) -> Callback {
            let log = self.clone();
            let entry = label.to_string();
            let message = message.to_string();
            Callback::new(move |_| {
                log.push(entry.clone());
                Err(ListenerError::new(message.clone()))
            })
            .with_label(label)
        }
    }

    /// Listener that increments the integer param `key` (missing counts as
    /// zero) and returns the new value.
    #[must_use]
    pub fn counter_listener(key: &str) -> Callback {
        let key = key.to_string();
        Callback::new(move |event: &mut Event<'_>| {
            let next = event.param_or(&key, json!(0)).as_i64().unwrap_or(0) + 1;
            event.set_param(key.clone(), next);
            Ok(json!(next))
        })
        .with_label("counter")
    }

    /// Listener that returns `value` and does nothing else.
    #[must_use]
    pub fn returning(value: Value) -> Callback {
        Callback::new(move |_| Ok(value.clone()))
    }
}

/// Test helpers and utilities
pub mod helpers {
    use eventide_core::Params;
    use serde_json::Value;

    /// Build a [`Params`] map from key/value pairs, keeping their order.
    ///
    /// # Example
    ///
    /// ```
    /// use eventide_testing::helpers::params;
    /// use serde_json::json;
    ///
    /// let params = params([("count", json!(0)), ("user", json!("ada"))]);
    /// assert_eq!(params.keys().collect::<Vec<_>>(), ["count", "user"]);
    /// ```
    pub fn params<K, I>(pairs: I) -> Params
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
    }

    /// Install a `tracing` subscriber for tests, honouring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Priorities for a set of listeners on one channel.
    ///
    /// Narrow range so that collisions (shared buckets) are common.
    pub fn priority_sets() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(-8i32..8, 1..24)
    }

    /// A listener set plus the index of the one that stops propagation.
    pub fn priorities_with_stopper() -> impl Strategy<Value = (Vec<i32>, usize)> {
        priority_sets().prop_flat_map(|priorities| {
            let len = priorities.len();
            (Just(priorities), 0..len)
        })
    }

    /// Expected dispatch order for listeners registered in order with the
    /// given priorities: indices sorted by priority, ties kept in
    /// registration order.
    #[must_use]
    pub fn expected_order(priorities: &[i32]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..priorities.len()).collect();
        // Stable sort keeps registration order within a bucket
        order.sort_by_key(|&index| priorities[index]);
        order
    }
}

// Re-export commonly used items
pub use listeners::{CallLog, counter_listener, returning};
