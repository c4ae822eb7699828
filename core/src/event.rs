//! The event object threaded through a dispatch.
//!
//! An [`Event`] carries the channel name, an optional borrowed target (the
//! object that raised the event), a mutable ordered parameter map, and the
//! propagation flag. A single `&mut Event` is handed to every listener of a
//! dispatch in turn, so a listener always sees the mutations made by the
//! listeners that ran before it.
//!
//! # Example
//!
//! ```
//! use eventide_core::event::{Event, Params};
//! use serde_json::json;
//!
//! struct Request {
//!     path: &'static str,
//! }
//!
//! let request = Request { path: "/orders" };
//! let mut event = Event::new("preDispatch").with_target(&request);
//! event.set_param("attempt", 1);
//!
//! assert_eq!(event.target_as::<Request>().map(|r| r.path), Some("/orders"));
//! assert_eq!(event.param("attempt"), Some(&json!(1)));
//!
//! event.stop_propagation();
//! assert!(event.is_propagation_stopped());
//! ```

use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Ordered parameter map carried by an event.
///
/// Keys keep their insertion order.
pub type Params = serde_json::Map<String, Value>;

/// Borrowed reference to whatever raised the event.
///
/// The lifetime ties the target to the triggering caller's scope, so a
/// listener cannot keep it beyond the dispatch. No `Send` or `Sync` bound:
/// dispatch runs on the triggering thread.
pub type Target<'t> = &'t dyn Any;

/// An in-flight event.
///
/// `'t` is the lifetime of the borrowed target.
pub struct Event<'t> {
    name: String,
    target: Option<Target<'t>>,
    params: Params,
    stopped: bool,
}

impl<'t> Event<'t> {
    /// Create an event for the given channel with no target and no params.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            params: Params::new(),
            stopped: false,
        }
    }

    /// Set the target (builder style).
    #[must_use]
    pub fn with_target(mut self, target: Target<'t>) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the params (builder style).
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// The channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the event.
    ///
    /// Renaming inside a listener does not redirect the dispatch that is
    /// currently running; it only changes what later listeners and the caller
    /// observe.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The target, if any.
    #[must_use]
    pub fn target(&self) -> Option<Target<'t>> {
        self.target
    }

    /// Replace the target.
    pub fn set_target(&mut self, target: Option<Target<'t>>) {
        self.target = target;
    }

    /// Downcast the target to a concrete type.
    ///
    /// Returns `None` when there is no target or it is of another type.
    #[must_use]
    pub fn target_as<T: Any>(&self) -> Option<&'t T> {
        self.target.and_then(|target| target.downcast_ref::<T>())
    }

    /// All params.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Mutable access to all params.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Replace all params. The previous map is dropped, not merged.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// A single param.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// A single param, or `default` when the key is absent.
    #[must_use]
    pub fn param_or(&self, key: &str, default: Value) -> Value {
        self.params.get(key).cloned().unwrap_or(default)
    }

    /// Insert or overwrite a single param.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Stop propagation: no further listener runs once the current one
    /// returns. There is no way to resume.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    /// Whether a listener has stopped propagation.
    #[must_use]
    pub const fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("has_target", &self.target.is_some())
            .field("params", &self.params)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {{ name: {}, params: {} }}",
            self.name,
            self.params.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Controller {
        action: String,
    }

    #[test]
    fn new_event_is_empty_and_running() {
        let event = Event::new("event1");
        assert_eq!(event.name(), "event1");
        assert!(event.target().is_none());
        assert!(event.params().is_empty());
        assert!(!event.is_propagation_stopped());
    }

    #[test]
    fn target_downcasts_to_concrete_type() {
        let controller = Controller {
            action: "index".to_string(),
        };
        let event = Event::new("preDispatch").with_target(&controller);

        assert_eq!(event.target_as::<Controller>(), Some(&controller));
        assert!(event.target_as::<String>().is_none());
    }

    #[test]
    fn target_may_be_thread_bound() {
        let shared = std::rc::Rc::new(std::cell::RefCell::new(0_u32));
        let event = Event::new("render").with_target(&shared);

        let target = event.target_as::<std::rc::Rc<std::cell::RefCell<u32>>>();
        if let Some(cell) = target {
            *cell.borrow_mut() += 1;
        }
        assert!(target.is_some());
        assert_eq!(*shared.borrow(), 1);
    }

    #[test]
    fn param_or_falls_back_to_default() {
        let mut event = Event::new("event1");
        assert_eq!(event.param_or("count", json!(0)), json!(0));

        event.set_param("count", 3);
        assert_eq!(event.param_or("count", json!(0)), json!(3));
    }

    #[test]
    fn params_keep_insertion_order() {
        let mut event = Event::new("event1");
        event.set_param("zeta", 1);
        event.set_param("alpha", 2);
        event.set_param("mid", 3);

        let keys: Vec<&str> = event.params().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn set_params_replaces_instead_of_merging() {
        let mut first = Params::new();
        first.insert("a".to_string(), json!(1));
        let mut second = Params::new();
        second.insert("b".to_string(), json!(2));

        let mut event = Event::new("event1").with_params(first);
        event.set_params(second);

        assert!(event.param("a").is_none());
        assert_eq!(event.param("b"), Some(&json!(2)));
    }

    #[test]
    fn stop_is_sticky() {
        let mut event = Event::new("event1");
        event.stop_propagation();
        event.stop_propagation();
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn display_shows_name_and_param_count() {
        let mut event = Event::new("postDispatch");
        event.set_param("status", 200);
        let display = format!("{event}");
        assert!(display.contains("postDispatch"));
        assert!(display.contains("params: 1"));
    }
}
