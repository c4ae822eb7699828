//! Configuration for the shared event bus.
//!
//! # Example
//!
//! ```rust
//! use eventide_runtime::config::DispatchConfig;
//! use std::time::Duration;
//!
//! let config = DispatchConfig::builder()
//!     .default_priority(10)
//!     .slow_listener_threshold(Duration::from_millis(50))
//!     .record_metrics(false)
//!     .build();
//!
//! assert_eq!(config.default_priority, 10);
//! ```

use eventide_core::DEFAULT_PRIORITY;
use serde::Deserialize;
use std::time::Duration;

/// Dispatch configuration.
///
/// # Default Values
///
/// - `default_priority`: 0
/// - `slow_listener_threshold`: none (no slow-listener warnings)
/// - `record_metrics`: true
///
/// The threshold only produces a warning in the logs. It never interrupts a
/// listener.
///
/// Deserializes from configuration files with every field optional; the
/// threshold is given in milliseconds as `slow_listener_threshold_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDispatchConfig")]
pub struct DispatchConfig {
    /// Priority used by `attach` when none is given
    pub default_priority: i32,
    /// Warn when a single listener runs longer than this
    pub slow_listener_threshold: Option<Duration>,
    /// Emit dispatch metrics through the `metrics` facade
    pub record_metrics: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            slow_listener_threshold: None,
            record_metrics: true,
        }
    }
}

impl DispatchConfig {
    /// Create a new config builder.
    #[must_use]
    pub const fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder {
            default_priority: None,
            slow_listener_threshold: None,
            record_metrics: None,
        }
    }

    /// Whether `elapsed` exceeds the slow-listener threshold.
    #[must_use]
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_listener_threshold
            .is_some_and(|threshold| elapsed > threshold)
    }
}

/// On-disk shape of [`DispatchConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDispatchConfig {
    default_priority: Option<i32>,
    slow_listener_threshold_ms: Option<u64>,
    record_metrics: Option<bool>,
}

impl From<RawDispatchConfig> for DispatchConfig {
    fn from(raw: RawDispatchConfig) -> Self {
        let defaults = Self::default();
        Self {
            default_priority: raw.default_priority.unwrap_or(defaults.default_priority),
            slow_listener_threshold: raw
                .slow_listener_threshold_ms
                .map(Duration::from_millis),
            record_metrics: raw.record_metrics.unwrap_or(defaults.record_metrics),
        }
    }
}

/// Builder for [`DispatchConfig`].
#[derive(Debug, Clone)]
pub struct DispatchConfigBuilder {
    default_priority: Option<i32>,
    slow_listener_threshold: Option<Duration>,
    record_metrics: Option<bool>,
}

impl DispatchConfigBuilder {
    /// Set the priority used by `attach`.
    #[must_use]
    pub const fn default_priority(mut self, priority: i32) -> Self {
        self.default_priority = Some(priority);
        self
    }

    /// Warn about listeners running longer than `threshold`.
    #[must_use]
    pub const fn slow_listener_threshold(mut self, threshold: Duration) -> Self {
        self.slow_listener_threshold = Some(threshold);
        self
    }

    /// Enable or disable dispatch metrics.
    #[must_use]
    pub const fn record_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = Some(enabled);
        self
    }

    /// Build the config, filling unset fields with defaults.
    #[must_use]
    pub fn build(self) -> DispatchConfig {
        let defaults = DispatchConfig::default();
        DispatchConfig {
            default_priority: self.default_priority.unwrap_or(defaults.default_priority),
            slow_listener_threshold: self.slow_listener_threshold,
            record_metrics: self.record_metrics.unwrap_or(defaults.record_metrics),
        }
    }
}
