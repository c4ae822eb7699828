//! Listener aggregates: objects that register a bundle of related listeners.
//!
//! A dispatch pipeline usually wires several listeners at once (routing,
//! access checks, view rendering). A [`ListenerAggregate`] owns those
//! [`Callback`] handles and attaches or detaches them as a unit through any
//! [`ListenerSink`], which is implemented by both the plain event bus and the
//! runtime's shared bus.
//!
//! # Example
//!
//! ```
//! use eventide_core::aggregate::{ListenerAggregate, ListenerSink};
//! use eventide_core::event_bus::EventBus;
//! use eventide_core::listener::Callback;
//! use serde_json::Value;
//!
//! struct RouteListeners {
//!     route: Callback,
//! }
//!
//! impl ListenerAggregate for RouteListeners {
//!     fn attach(&self, events: &mut dyn ListenerSink) {
//!         events.attach_listener("route", self.route.clone(), -10);
//!     }
//!
//!     fn detach(&self, events: &mut dyn ListenerSink) {
//!         events.detach_listener("route", &self.route);
//!     }
//! }
//!
//! let aggregate = RouteListeners {
//!     route: Callback::new(|_| Ok(Value::Null)),
//! };
//! let mut bus = EventBus::new();
//! bus.attach_aggregate(&aggregate);
//! assert!(bus.has_listeners("route"));
//!
//! bus.detach_aggregate(&aggregate);
//! assert!(!bus.has_listeners("route"));
//! ```

use crate::listener::Callback;

/// Anything listeners can be attached to and detached from.
pub trait ListenerSink {
    /// Attach `callback` to `event` at `priority`.
    ///
    /// Returns `false` if the callback is not invocable.
    fn attach_listener(&mut self, event: &str, callback: Callback, priority: i32) -> bool;

    /// Detach every registration of `callback` from `event`.
    ///
    /// Returns `true` if at least one entry was removed.
    fn detach_listener(&mut self, event: &str, callback: &Callback) -> bool;
}

/// A bundle of listeners attached and detached together.
pub trait ListenerAggregate {
    /// Attach all listeners of this aggregate.
    fn attach(&self, events: &mut dyn ListenerSink);

    /// Detach the listeners previously attached by [`attach`](Self::attach).
    fn detach(&self, events: &mut dyn ListenerSink);
}
