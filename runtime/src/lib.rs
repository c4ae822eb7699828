//! # Eventide Runtime
//!
//! Thread-safe, re-entrant wrapper around the core event bus.
//!
//! The core [`EventBus`] needs `&mut self` to register listeners, so it
//! cannot be shared between threads or reached from inside its own
//! listeners. [`SharedEventBus`] puts it behind a read-write lock and keeps
//! the lock out of the way of listeners:
//!
//! - **Registration** (`attach`, `detach`, `clear_listeners`) takes the write
//!   lock for the duration of the registry update.
//! - **Dispatch** takes the read lock only long enough to snapshot the
//!   channel's listeners, then runs them with no lock held. A listener can
//!   therefore trigger, attach or detach on the same bus; a nested trigger
//!   runs to completion before the outer dispatch continues.
//!
//! Every dispatch is traced with `tracing` and, unless disabled in
//! [`DispatchConfig`], recorded through the `metrics` facade.
//!
//! ## Example
//!
//! ```
//! use eventide_core::{Callback, Event, Params};
//! use eventide_runtime::SharedEventBus;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), eventide_core::EventError> {
//! let bus = SharedEventBus::new();
//!
//! // A listener that re-enters the bus it is attached to
//! let inner = bus.clone();
//! bus.attach_with_priority(
//!     "dispatch",
//!     Callback::new(move |event: &mut Event<'_>| {
//!         let rendered = inner.trigger("render", None, Params::new())?;
//!         event.set_param("rendered", rendered.unwrap_or_default());
//!         Ok(json!("dispatched"))
//!     }),
//!     0,
//! );
//! bus.attach("render", Callback::new(|_: &mut Event<'_>| Ok(json!("<html>"))));
//!
//! let mut event = Event::new("dispatch");
//! bus.dispatch(&mut event)?;
//! assert_eq!(event.param("rendered"), Some(&json!("<html>")));
//! # Ok(())
//! # }
//! ```

use eventide_core::{
    Callback, Dispatch, DispatchObserver, EventBus, ListenerAggregate, ListenerEntry,
    ListenerError, ListenerSink, ListenerSnapshot, Params, Target,
    error::Result,
    event::Event,
    event_bus::dispatch_listeners,
};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Dispatch configuration
pub mod config;

/// Prometheus metrics for observability
pub mod metrics;

pub use config::{DispatchConfig, DispatchConfigBuilder};

use crate::metrics::DispatchMetrics;

/// Cloneable, thread-safe handle to an event bus.
///
/// Clones share the same registry. The bus itself holds no lock while
/// listeners run.
#[derive(Clone, Default)]
pub struct SharedEventBus {
    inner: Arc<RwLock<EventBus>>,
    config: Arc<DispatchConfig>,
}

impl SharedEventBus {
    /// Create an empty bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bus with the given configuration.
    #[must_use]
    pub fn with_config(config: DispatchConfig) -> Self {
        Self::from_bus(EventBus::new(), config)
    }

    /// Share an existing bus, keeping its listeners.
    #[must_use]
    pub fn from_bus(bus: EventBus, config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(bus)),
            config: Arc::new(config),
        }
    }

    /// The configuration this bus was built with.
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Listeners never run under the lock, so a poisoned lock only means a
    /// panic happened elsewhere while holding it; the registry is intact.
    fn read(&self) -> RwLockReadGuard<'_, EventBus> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EventBus> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a listener at the configured default priority.
    ///
    /// Returns `false` if the callback is not invocable.
    pub fn attach(&self, event: &str, callback: Callback) -> bool {
        self.attach_with_priority(event, callback, self.config.default_priority)
    }

    /// Attach a listener to `event` in the given priority bucket.
    ///
    /// Returns `false` if the callback is not invocable.
    pub fn attach_with_priority(&self, event: &str, callback: Callback, priority: i32) -> bool {
        let mut bus = self.write();
        let attached = bus.attach_with_priority(event, callback, priority);
        if attached {
            // Gauge is set while the write lock is held
            self.record_registered(event, bus.listener_count(event));
        }
        attached
    }

    /// Detach every registration of `callback` from `event`.
    ///
    /// Returns `true` if at least one entry was removed.
    pub fn detach(&self, event: &str, callback: &Callback) -> bool {
        let mut bus = self.write();
        let detached = bus.detach(event, callback);
        if detached {
            self.record_registered(event, bus.listener_count(event));
        }
        detached
    }

    /// Remove every listener of `event`. No-op if the channel is unknown.
    pub fn clear_listeners(&self, event: &str) {
        let mut bus = self.write();
        if bus.has_listeners(event) {
            bus.clear_listeners(event);
            self.record_registered(event, 0);
        }
    }

    /// Remove every listener of `event` whose receiver was dropped.
    ///
    /// Returns how many entries were removed.
    pub fn prune_dead(&self, event: &str) -> usize {
        let mut bus = self.write();
        let removed = bus.prune_dead(event);
        if removed > 0 {
            self.record_registered(event, bus.listener_count(event));
        }
        removed
    }

    /// Let an aggregate attach its listeners.
    pub fn attach_aggregate(&self, aggregate: &dyn ListenerAggregate) {
        let mut sink = self.clone();
        aggregate.attach(&mut sink);
    }

    /// Let an aggregate detach its listeners.
    pub fn detach_aggregate(&self, aggregate: &dyn ListenerAggregate) {
        let mut sink = self.clone();
        aggregate.detach(&mut sink);
    }

    /// Whether `event` has any listener.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.read().has_listeners(event)
    }

    /// Number of listener entries registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.read().listener_count(event)
    }

    /// Names of all channels that have listeners, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.read()
            .channels()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Priority buckets in use for `event`, ascending.
    #[must_use]
    pub fn priorities(&self, event: &str) -> Vec<i32> {
        self.read().priorities(event)
    }

    /// `event`'s listeners in dispatch order.
    #[must_use]
    pub fn listeners(&self, event: &str) -> ListenerSnapshot {
        self.read().listeners(event)
    }

    /// Trigger `event` with a fresh [`Event`].
    ///
    /// Returns the value of the last listener invoked, or `None` when no
    /// listener ran.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`](eventide_core::EventError::ListenerFailed) if a listener fails; the
    /// remaining listeners are not run.
    pub fn trigger<'t>(
        &self,
        event: &str,
        target: Option<Target<'t>>,
        params: Params,
    ) -> Result<Option<Value>> {
        let mut event = Event::new(event).with_params(params);
        event.set_target(target);
        self.dispatch(&mut event).map(|dispatch| dispatch.last_result)
    }

    /// Re-trigger an existing [`Event`], overwriting its target and params.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`](eventide_core::EventError::ListenerFailed) if a listener fails.
    pub fn trigger_event<'t>(
        &self,
        event: &mut Event<'t>,
        target: Option<Target<'t>>,
        params: Params,
    ) -> Result<Option<Value>> {
        event.set_target(target);
        event.set_params(params);
        self.dispatch(event).map(|dispatch| dispatch.last_result)
    }

    /// Dispatch `event` as-is and report how the dispatch went.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`](eventide_core::EventError::ListenerFailed) if a listener fails.
    #[tracing::instrument(skip(self, event), fields(channel = %event.name()), name = "event_dispatch")]
    pub fn dispatch(&self, event: &mut Event<'_>) -> Result<Dispatch> {
        let channel = event.name().to_string();
        let snapshot = self.read().listeners(&channel);
        // Read lock released: listeners may re-enter the bus

        tracing::trace!(listeners = snapshot.len(), "Dispatching event");

        let started = Instant::now();
        let mut observer = SlowListenerObserver::new(&self.config);
        let result = dispatch_listeners(&channel, &snapshot, event, &mut observer);
        let elapsed = started.elapsed();

        match &result {
            Ok(dispatch) => {
                tracing::debug!(
                    invoked = dispatch.invoked,
                    outcome = ?dispatch.outcome,
                    ?elapsed,
                    "Dispatch finished"
                );
                if self.config.record_metrics {
                    DispatchMetrics::record_dispatch(&channel, dispatch, elapsed);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "Dispatch aborted by listener");
                if self.config.record_metrics {
                    DispatchMetrics::record_failure(&channel, elapsed);
                }
            }
        }

        result
    }

    fn record_registered(&self, event: &str, count: usize) {
        if self.config.record_metrics {
            DispatchMetrics::record_registered(event, count);
        }
    }
}

impl std::fmt::Debug for SharedEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEventBus")
            .field("channels", &self.channels())
            .field("config", &self.config)
            .finish()
    }
}

impl ListenerSink for SharedEventBus {
    fn attach_listener(&mut self, event: &str, callback: Callback, priority: i32) -> bool {
        self.attach_with_priority(event, callback, priority)
    }

    fn detach_listener(&mut self, event: &str, callback: &Callback) -> bool {
        self.detach(event, callback)
    }
}

/// Times each listener and warns about those over the configured threshold.
struct SlowListenerObserver<'a> {
    config: &'a DispatchConfig,
    started: Option<Instant>,
}

impl<'a> SlowListenerObserver<'a> {
    const fn new(config: &'a DispatchConfig) -> Self {
        Self {
            config,
            started: None,
        }
    }
}

impl DispatchObserver for SlowListenerObserver<'_> {
    fn before_listener(&mut self, _channel: &str, _entry: &ListenerEntry) {
        if self.config.slow_listener_threshold.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn after_listener(&mut self, channel: &str, entry: &ListenerEntry, failed: bool) {
        let Some(started) = self.started.take() else {
            return;
        };
        let elapsed: Duration = started.elapsed();
        if self.config.is_slow(elapsed) {
            tracing::warn!(
                channel,
                priority = entry.priority,
                listener = entry.callback.label(),
                ?elapsed,
                failed,
                "Slow event listener"
            );
        }
    }
}

/// Build a [`ListenerError`] from any error, keeping it as the source.
///
/// Handy for listeners calling fallible code:
/// `do_work().map_err(listener_error("work failed"))?`.
pub fn listener_error<E>(message: &'static str) -> impl FnOnce(E) -> ListenerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |source| ListenerError::with_source(message, source)
}
