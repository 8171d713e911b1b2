//! Prometheus metrics for observability and monitoring.
//!
//! The store reports through the `metrics` facade; nothing is recorded
//! unless a recorder is installed. [`PrometheusRecorder`] installs the
//! Prometheus one and renders the text exposition format on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use unistore_runtime::metrics::PrometheusRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = PrometheusRecorder::install()?;
//!
//! // ... dispatch some actions ...
//!
//! println!("{}", recorder.render());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Actions dispatched, labelled by store and action tag
pub const DISPATCH_TOTAL: &str = "unistore_dispatch_total";
/// `action` label value for tags outside the reducer's vocabulary
pub const UNRECOGNIZED_ACTION: &str = "unrecognized";
/// Dispatches that returned an error, labelled by store and reason
pub const DISPATCH_FAILED_TOTAL: &str = "unistore_dispatch_failed_total";
/// Reentrant dispatches that were queued
pub const DISPATCH_QUEUED_TOTAL: &str = "unistore_dispatch_queued_total";
/// Reductions that produced a new state
pub const STATE_COMMITTED_TOTAL: &str = "unistore_state_committed_total";
/// Time spent inside the reducer
pub const REDUCE_DURATION_SECONDS: &str = "unistore_reduce_duration_seconds";
/// Registered observers
pub const OBSERVERS: &str = "unistore_observers";
/// Stores disposed
pub const DISPOSED_TOTAL: &str = "unistore_disposed_total";
/// Entries in the dead letter queue, labelled by store
pub const DLQ_SIZE: &str = "unistore_dlq_size";
/// Entries pushed to the dead letter queue
pub const DLQ_PUSHED_TOTAL: &str = "unistore_dlq_pushed_total";
/// Entries evicted from a full dead letter queue
pub const DLQ_DROPPED_TOTAL: &str = "unistore_dlq_dropped_total";

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

/// Installed Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusRecorder {
    handle: PrometheusHandle,
}

impl std::fmt::Debug for PrometheusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRecorder").finish_non_exhaustive()
    }
}

impl PrometheusRecorder {
    /// Describe all store metrics and install the Prometheus recorder globally.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a recorder is
    /// already installed in this process.
    pub fn install() -> Result<Self, MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005,
                    0.01, 0.05,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = builder
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        // Descriptions are only kept by a recorder, so register after installing.
        register_metrics();
        tracing::info!("Prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(DISPATCH_TOTAL, "Total number of actions dispatched to a store");
    describe_counter!(
        DISPATCH_FAILED_TOTAL,
        "Total number of dispatches that returned an error"
    );
    describe_counter!(
        DISPATCH_QUEUED_TOTAL,
        "Total number of reentrant dispatches queued behind the current one"
    );
    describe_counter!(
        STATE_COMMITTED_TOTAL,
        "Total number of reductions that replaced the state"
    );
    describe_histogram!(
        REDUCE_DURATION_SECONDS,
        Unit::Seconds,
        "Time spent running the reducer"
    );
    describe_gauge!(OBSERVERS, "Number of observers currently registered");
    describe_counter!(DISPOSED_TOTAL, "Total number of stores disposed");
    describe_gauge!(DLQ_SIZE, "Number of entries in the dead letter queue");
    describe_counter!(DLQ_PUSHED_TOTAL, "Total number of dead letters recorded");
    describe_counter!(
        DLQ_DROPPED_TOTAL,
        "Total number of dead letters evicted from a full queue"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_debug_hides_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let recorder = PrometheusRecorder { handle };

        assert_eq!(format!("{recorder:?}"), "PrometheusRecorder { .. }");
        assert_eq!(format!("{:?}", recorder.clone()), "PrometheusRecorder { .. }");
    }
}
