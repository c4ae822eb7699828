//! Priority-ordered, stoppable event dispatch.
//!
//! This module provides the [`EventBus`]: named channels, each holding
//! listeners grouped into priority buckets. Triggering a channel hands one
//! shared, mutable [`Event`] to each listener in turn.
//!
//! # Dispatch Rules
//!
//! - **Ascending priority**: lower numbers run first. Priority is a
//!   sequencing rank, not an importance weight.
//! - **Registration order** within a bucket.
//! - **Snapshot**: the listener list is resolved from the event's name when
//!   the dispatch starts. Renaming the event, or attaching and detaching
//!   listeners from inside a listener, does not change the running dispatch.
//! - **Cooperative stop**: after each listener the bus checks
//!   [`Event::is_propagation_stopped`] and halts if it is set.
//! - **Fail-fast**: a listener error aborts the dispatch and is returned to
//!   the caller as [`EventError::ListenerFailed`].
//!
//! ```text
//!  trigger("route")
//!        │
//!        ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ priority -10 │──▶│ priority 0   │──▶│ priority 50  │
//!  │ L1 → L2      │   │ L3           │   │ L4 → L5      │
//!  └──────────────┘   └──────────────┘   └──────────────┘
//!           stop_propagation() or Err(..) ends the walk early
//! ```
//!
//! # Example
//!
//! ```
//! use eventide_core::event::{Event, Params};
//! use eventide_core::event_bus::EventBus;
//! use eventide_core::listener::{Callback, ListenerResult};
//! use serde_json::json;
//!
//! fn increment(event: &mut Event<'_>) -> ListenerResult {
//!     let count = event.param_or("count", json!(0)).as_i64().unwrap_or(0) + 1;
//!     event.set_param("count", count);
//!     Ok(json!(count))
//! }
//!
//! # fn main() -> Result<(), eventide_core::error::EventError> {
//! let mut bus = EventBus::new();
//! bus.attach_with_priority("event1", Callback::new(increment), 1);
//! bus.attach_with_priority("event1", Callback::new(increment), 2);
//!
//! let mut params = Params::new();
//! params.insert("count".to_string(), json!(0));
//!
//! let last = bus.trigger("event1", None, params)?;
//! assert_eq!(last, Some(json!(2)));
//! # Ok(())
//! # }
//! ```

use crate::aggregate::{ListenerAggregate, ListenerSink};
use crate::error::{EventError, Result};
use crate::event::{Event, Params, Target};
use crate::listener::Callback;
use crate::registry::{ListenerEntry, ListenerRegistry, ListenerSnapshot};
use serde_json::Value;

/// Priority used by [`EventBus::attach`].
pub const DEFAULT_PRIORITY: i32 = 0;

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every listener in the snapshot ran (or was skipped as not invocable).
    Completed,

    /// A listener stopped propagation, or the event was already stopped
    /// when the dispatch began.
    Stopped,
}

impl DispatchOutcome {
    /// Check if the dispatch was cut short
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Summary of one successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// How the dispatch ended
    pub outcome: DispatchOutcome,
    /// Number of listeners actually invoked
    pub invoked: usize,
    /// Return value of the last listener invoked, `None` if none ran
    pub last_result: Option<Value>,
}

/// Hooks around each listener invocation.
///
/// Used by wrappers that need per-listener timing or logging without
/// re-implementing the dispatch loop. The unit type is the no-op observer.
pub trait DispatchObserver {
    /// Called right before a listener is invoked.
    fn before_listener(&mut self, _channel: &str, _entry: &ListenerEntry) {}

    /// Called right after a listener returned, successfully or not.
    fn after_listener(&mut self, _channel: &str, _entry: &ListenerEntry, _failed: bool) {}
}

impl DispatchObserver for () {}

/// Run `listeners` against `event`, in order.
///
/// This is the dispatch loop shared by [`EventBus`] and by wrappers that
/// take their snapshot under a lock and release it before running
/// listeners. `channel` names the snapshot's channel for logs and errors;
/// it is captured by the caller before the first listener can rename the
/// event.
///
/// # Errors
///
/// Returns [`EventError::ListenerFailed`] as soon as a listener fails. No
/// further listener is invoked.
pub fn dispatch_listeners<O>(
    channel: &str,
    listeners: &[ListenerEntry],
    event: &mut Event<'_>,
    observer: &mut O,
) -> Result<Dispatch>
where
    O: DispatchObserver + ?Sized,
{
    let mut dispatch = Dispatch {
        outcome: DispatchOutcome::Completed,
        invoked: 0,
        last_result: None,
    };

    if event.is_propagation_stopped() {
        tracing::trace!(channel, "Event already stopped, skipping dispatch");
        dispatch.outcome = DispatchOutcome::Stopped;
        return Ok(dispatch);
    }

    for entry in listeners {
        if !entry.callback.is_invocable() {
            tracing::debug!(
                channel,
                priority = entry.priority,
                listener = entry.callback.label(),
                "Skipping listener whose receiver was dropped"
            );
            continue;
        }

        observer.before_listener(channel, entry);
        let Some(result) = entry.callback.call(event) else {
            // Receiver dropped between the check above and the call
            observer.after_listener(channel, entry, false);
            continue;
        };
        observer.after_listener(channel, entry, result.is_err());

        dispatch.invoked += 1;
        match result {
            Ok(value) => dispatch.last_result = Some(value),
            Err(source) => {
                tracing::debug!(
                    channel,
                    priority = entry.priority,
                    listener = entry.callback.label(),
                    error = %source,
                    "Listener failed, aborting dispatch"
                );
                return Err(EventError::ListenerFailed {
                    event: channel.to_string(),
                    priority: entry.priority,
                    listener: entry.callback.label().map(str::to_string),
                    source,
                });
            }
        }

        if event.is_propagation_stopped() {
            tracing::trace!(
                channel,
                priority = entry.priority,
                invoked = dispatch.invoked,
                "Propagation stopped"
            );
            dispatch.outcome = DispatchOutcome::Stopped;
            break;
        }
    }

    Ok(dispatch)
}

/// Event bus holding named channels of prioritised listeners.
///
/// Mutation (`attach`, `detach`, `clear_listeners`) needs `&mut self`, while
/// dispatch only needs `&self`; callers that must register and dispatch from
/// several threads, or from inside listeners, wrap the bus in a lock. The
/// runtime crate's `SharedEventBus` does exactly that.
#[derive(Clone, Debug, Default)]
pub struct EventBus {
    registry: ListenerRegistry,
}

impl EventBus {
    /// Create a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener at [`DEFAULT_PRIORITY`].
    ///
    /// See [`attach_with_priority`](Self::attach_with_priority).
    pub fn attach(&mut self, event: impl Into<String>, callback: Callback) -> bool {
        self.attach_with_priority(event, callback, DEFAULT_PRIORITY)
    }

    /// Attach a listener to `event` in the given priority bucket.
    ///
    /// The listener goes to the end of its bucket. Attaching the same
    /// callback twice registers it twice.
    ///
    /// Returns `false`, without registering anything, if the callback is
    /// not invocable (a bound method whose receiver is gone).
    pub fn attach_with_priority(
        &mut self,
        event: impl Into<String>,
        callback: Callback,
        priority: i32,
    ) -> bool {
        let event = event.into();
        if !callback.is_invocable() {
            tracing::debug!(event = %event, "Refusing to attach a listener that is not invocable");
            return false;
        }

        tracing::trace!(event = %event, priority, listener = callback.label(), "Attaching listener");
        self.registry.insert(event, priority, callback);
        true
    }

    /// Detach every registration of `callback` from `event`, in all
    /// priority buckets.
    ///
    /// Matching is by identity (see [`Callback::same_as`]). Returns `true`
    /// if at least one entry was removed; `false` if the channel does not
    /// exist, nothing matched, or the callback is not invocable.
    pub fn detach(&mut self, event: &str, callback: &Callback) -> bool {
        if !callback.is_invocable() {
            return false;
        }

        let removed = self.registry.remove(event, callback);
        if removed > 0 {
            tracing::trace!(event, removed, "Detached listener");
        }
        removed > 0
    }

    /// Remove every listener of `event`. No-op if the channel is unknown.
    pub fn clear_listeners(&mut self, event: &str) {
        let removed = self.registry.clear(event);
        if removed > 0 {
            tracing::trace!(event, removed, "Cleared listeners");
        }
    }

    /// Remove every listener of `event` that is no longer invocable.
    ///
    /// Bound methods whose receiver was dropped stay registered until they
    /// are pruned or their channel is cleared. Returns how many entries
    /// were removed.
    pub fn prune_dead(&mut self, event: &str) -> usize {
        let removed = self.registry.retain_invocable(event);
        if removed > 0 {
            tracing::debug!(event, removed, "Pruned listeners whose receiver was dropped");
        }
        removed
    }

    /// Let an aggregate attach its listeners.
    pub fn attach_aggregate(&mut self, aggregate: &dyn ListenerAggregate) {
        aggregate.attach(self);
    }

    /// Let an aggregate detach its listeners.
    pub fn detach_aggregate(&mut self, aggregate: &dyn ListenerAggregate) {
        aggregate.detach(self);
    }

    /// Trigger `event` with a fresh [`Event`].
    ///
    /// Returns the value of the last listener invoked, or `None` when the
    /// channel has no listeners.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`] if a listener fails; the
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

    /// Re-trigger an existing [`Event`].
    ///
    /// The event's target and params are overwritten (not merged) and its
    /// current name selects the channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`] if a listener fails.
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
    /// Returns [`EventError::ListenerFailed`] if a listener fails.
    pub fn dispatch(&self, event: &mut Event<'_>) -> Result<Dispatch> {
        let channel = event.name().to_string();
        let snapshot = self.registry.snapshot(&channel);
        dispatch_listeners(&channel, &snapshot, event, &mut ())
    }

    /// Whether `event` has any listener.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.registry.has_channel(event)
    }

    /// Number of listener entries registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.len(event)
    }

    /// Names of all channels that have listeners, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<&str> {
        self.registry.channels()
    }

    /// Priority buckets in use for `event`, ascending.
    #[must_use]
    pub fn priorities(&self, event: &str) -> Vec<i32> {
        self.registry.priorities(event)
    }

    /// `event`'s listeners in dispatch order.
    #[must_use]
    pub fn listeners(&self, event: &str) -> ListenerSnapshot {
        self.registry.snapshot(event)
    }

    /// Read-only access to the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }
}

impl ListenerSink for EventBus {
    fn attach_listener(&mut self, event: &str, callback: Callback, priority: i32) -> bool {
        self.attach_with_priority(event, callback, priority)
    }

    fn detach_listener(&mut self, event: &str, callback: &Callback) -> bool {
        self.detach(event, callback)
    }
}
