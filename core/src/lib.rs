//! # Eventide Core
//!
//! Core types for priority-ordered, stoppable, in-process event dispatch.
//!
//! This crate provides the event/listener engine that a request dispatch
//! pipeline is built around: controllers, routers and access checks attach
//! listeners to named channels, and the pipeline triggers those channels
//! (`"route"`, `"preDispatch"`, `"postDispatch"`, ...) with the current
//! request as target.
//!
//! ## Core Concepts
//!
//! - **Event**: name, borrowed target, ordered mutable params, stop flag
//! - **Callback**: cloneable listener handle compared by identity
//! - **Channel**: listeners selected by the event's name at trigger time
//! - **Priority bucket**: listeners sharing a rank, run in registration order
//! - **Aggregate**: an object attaching a bundle of listeners at once
//!
//! ## Dispatch Guarantees
//!
//! - Ascending priority, then registration order
//! - Every listener of a dispatch sees the same `&mut Event`
//! - `stop_propagation()` halts the walk after the current listener
//! - Listener errors are returned to the caller, never swallowed
//!
//! ## Example
//!
//! ```
//! use eventide_core::{Callback, Event, EventBus, Params};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), eventide_core::EventError> {
//! let mut bus = EventBus::new();
//!
//! let guard = Callback::new(|event: &mut Event<'_>| {
//!     if event.param("user").is_none() {
//!         event.set_param("redirect", "/login");
//!         event.stop_propagation();
//!     }
//!     Ok(json!("guard"))
//! });
//! let render = Callback::new(|_: &mut Event<'_>| Ok(json!("rendered")));
//!
//! bus.attach_with_priority("preDispatch", guard, -100);
//! bus.attach("preDispatch", render);
//!
//! let last = bus.trigger("preDispatch", None, Params::new())?;
//! assert_eq!(last, Some(json!("guard")));
//! # Ok(())
//! # }
//! ```

/// Error types for listeners and dispatch
pub mod error;

/// The event object threaded through a dispatch
pub mod event;

/// Listener callbacks and their identity
pub mod listener;

/// Listener storage by channel and priority
pub mod registry;

/// The event bus and its dispatch loop
pub mod event_bus;

/// Bundles of listeners attached together
pub mod aggregate;

// Re-export commonly used types
pub use aggregate::{ListenerAggregate, ListenerSink};
pub use error::{EventError, ListenerError};
pub use event::{Event, Params, Target};
pub use event_bus::{DEFAULT_PRIORITY, Dispatch, DispatchObserver, DispatchOutcome, EventBus};
pub use listener::{Callback, ListenerResult};
pub use registry::{ListenerEntry, ListenerRegistry, ListenerSnapshot};
pub use serde_json::{Value, json};
