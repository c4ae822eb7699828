//! Listener callbacks and their identity.
//!
//! A [`Callback`] is a cheap, cloneable handle to something that can be
//! invoked with an [`Event`]: a closure, a function pointer, or a method bound
//! to a shared receiver. Identity is the handle's allocation: clones of one
//! `Callback` are the same listener, while wrapping the same closure twice
//! produces two different listeners. [`EventBus::detach`] matches on that
//! identity.
//!
//! Bound methods hold only a weak reference to their receiver. Once the
//! receiver is dropped the callback is no longer invocable: attaching it is
//! refused, and a dispatch that meets it skips it.
//!
//! [`EventBus::detach`]: crate::event_bus::EventBus::detach
//!
//! # Example
//!
//! ```
//! use eventide_core::event::Event;
//! use eventide_core::listener::{Callback, ListenerResult};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! struct Auditor;
//!
//! impl Auditor {
//!     fn on_dispatch(&self, event: &mut Event<'_>) -> ListenerResult {
//!         Ok(Value::from(event.name()))
//!     }
//! }
//!
//! let auditor = Arc::new(Auditor);
//! let bound = Callback::bound(&auditor, Auditor::on_dispatch);
//! assert!(bound.is_invocable());
//!
//! drop(auditor);
//! assert!(!bound.is_invocable());
//! ```

use crate::error::ListenerError;
use crate::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// What a listener returns: a value, or an error that aborts the dispatch.
pub type ListenerResult = Result<Value, ListenerError>;

/// Uniform call interface behind every [`Callback`].
trait Invoke: Send + Sync {
    /// Run the listener. `None` means the callback is no longer invocable.
    fn invoke(&self, event: &mut Event<'_>) -> Option<ListenerResult>;

    fn is_invocable(&self) -> bool;
}

struct Function<F>(F);

impl<F> Invoke for Function<F>
where
    F: Fn(&mut Event<'_>) -> ListenerResult + Send + Sync,
{
    fn invoke(&self, event: &mut Event<'_>) -> Option<ListenerResult> {
        Some((self.0)(event))
    }

    fn is_invocable(&self) -> bool {
        true
    }
}

struct BoundMethod<T> {
    receiver: Weak<T>,
    method: fn(&T, &mut Event<'_>) -> ListenerResult,
}

impl<T: Send + Sync> Invoke for BoundMethod<T> {
    fn invoke(&self, event: &mut Event<'_>) -> Option<ListenerResult> {
        let receiver = self.receiver.upgrade()?;
        Some((self.method)(&*receiver, event))
    }

    fn is_invocable(&self) -> bool {
        self.receiver.strong_count() > 0
    }
}

/// Handle to a listener.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<dyn Invoke>,
    label: Option<Arc<str>>,
}

impl Callback {
    /// Wrap a closure or function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Event<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Function(f)),
            label: None,
        }
    }

    /// Bind a method to a shared receiver.
    ///
    /// Only a weak reference is kept; the callback stops being invocable
    /// when the last `Arc` to the receiver is dropped.
    ///
    /// A dead callback is skipped by dispatch but stays registered, and
    /// `detach` refuses it. Remove such entries with
    /// [`EventBus::prune_dead`](crate::event_bus::EventBus::prune_dead) or
    /// by clearing the channel.
    pub fn bound<T>(receiver: &Arc<T>, method: fn(&T, &mut Event<'_>) -> ListenerResult) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(BoundMethod {
                receiver: Arc::downgrade(receiver),
                method,
            }),
            label: None,
        }
    }

    /// Attach a label used in logs and errors.
    ///
    /// The label is cosmetic. It is shared with clones made afterwards and
    /// plays no part in identity.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, if one was set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the callback can still be invoked.
    #[must_use]
    pub fn is_invocable(&self) -> bool {
        self.inner.is_invocable()
    }

    /// Whether two handles refer to the same listener.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Invoke the listener. Returns `None` if it is no longer invocable.
    pub fn call(&self, event: &mut Event<'_>) -> Option<ListenerResult> {
        self.inner.invoke(event)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("label", &self.label)
            .field("invocable", &self.is_invocable())
            .finish_non_exhaustive()
    }
}
