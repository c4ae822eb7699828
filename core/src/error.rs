//! Error types for listeners and dispatch.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error type accepted as the cause of a listener failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by a listener.
///
/// Listeners return this from their callback to abort the dispatch. The bus
/// never swallows it: it surfaces to the `trigger` caller wrapped in
/// [`EventError::ListenerFailed`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ListenerError {
    /// Create a listener error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a listener error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<EventError> for ListenerError {
    /// A nested dispatch failed inside a listener.
    fn from(error: EventError) -> Self {
        Self::with_source(format!("Nested dispatch of '{}' failed", error.event()), error)
    }
}

/// Errors returned by dispatch operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// A listener returned an error; the remaining listeners were not run.
    #[error("Listener {} failed on event '{event}' (priority {priority}): {source}", .listener.as_deref().unwrap_or("<anonymous>"))]
    ListenerFailed {
        /// Channel that was being dispatched
        event: String,
        /// Priority bucket of the failing listener
        priority: i32,
        /// Label of the failing listener, if it has one
        listener: Option<String>,
        /// The listener's error
        source: ListenerError,
    },
}

impl EventError {
    /// The channel whose dispatch failed.
    #[must_use]
    pub fn event(&self) -> &str {
        match self {
            Self::ListenerFailed { event, .. } => event,
        }
    }
}

/// Convenience alias for dispatch results.
pub type Result<T> = std::result::Result<T, EventError>;
