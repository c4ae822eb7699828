//! Prometheus metrics for event dispatch.
//!
//! The shared bus records, per channel:
//! - Dispatches started, stopped early, and failed
//! - Listeners invoked
//! - Dispatch latency
//! - Listeners currently registered
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, for example with [`MetricsExporter::start`].
//!
//! # Example
//!
//! ```rust,no_run
//! use eventide_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.start()?;
//!
//! // Scrape output for an HTTP handler of your choice
//! let body = exporter.render();
//! # Ok(())
//! # }
//! ```

use eventide_core::Dispatch;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for dispatch metrics.
///
/// Installs a global recorder and renders the Prometheus text format on
/// demand; serving it over HTTP is left to the embedding application.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe the dispatch metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Dispatch metrics recorder installed");
                Ok(())
            }
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                // Another recorder (or an earlier exporter) is already installed
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(())
            }
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the exporter hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "event_dispatch_total",
        "Total number of event dispatches started"
    );
    describe_counter!(
        "event_listeners_invoked_total",
        "Total number of listener invocations"
    );
    describe_counter!(
        "event_dispatch_stopped_total",
        "Total number of dispatches ended by stop_propagation"
    );
    describe_counter!(
        "event_listener_failures_total",
        "Total number of dispatches aborted by a listener error"
    );
    describe_histogram!(
        "event_dispatch_duration_seconds",
        "Time taken to run all listeners of a dispatch"
    );
    describe_gauge!(
        "event_listeners_registered",
        "Number of listeners currently registered per channel"
    );
}

/// Dispatch metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a completed or stopped dispatch.
    pub fn record_dispatch(channel: &str, dispatch: &Dispatch, duration: Duration) {
        let channel = channel.to_string();
        counter!("event_dispatch_total", "channel" => channel.clone()).increment(1);
        counter!("event_listeners_invoked_total", "channel" => channel.clone())
            .increment(dispatch.invoked as u64);
        if dispatch.outcome.is_stopped() {
            counter!("event_dispatch_stopped_total", "channel" => channel.clone()).increment(1);
        }
        histogram!("event_dispatch_duration_seconds", "channel" => channel)
            .record(duration.as_secs_f64());
    }

    /// Record a dispatch aborted by a listener error.
    pub fn record_failure(channel: &str, duration: Duration) {
        let channel = channel.to_string();
        counter!("event_dispatch_total", "channel" => channel.clone()).increment(1);
        counter!("event_listener_failures_total", "channel" => channel.clone()).increment(1);
        histogram!("event_dispatch_duration_seconds", "channel" => channel)
            .record(duration.as_secs_f64());
    }

    /// Record the number of listeners registered on a channel.
    #[allow(clippy::cast_precision_loss)] // Listener counts stay far below 2^52
    pub fn record_registered(channel: &str, count: usize) {
        gauge!("event_listeners_registered", "channel" => channel.to_string()).set(count as f64);
    }
}
