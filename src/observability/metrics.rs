//! Metrics collection and exposition.
//!
//! # Metrics
//! - `doc_operations_total` (counter): operations by service, operation, status_type
//! - `doc_operation_duration_seconds` (histogram): latency by service, operation
//!
//! # Design Decisions
//! - The registry owns its Prometheus recorder instead of installing a global
//!   one; records go through `metrics::with_local_recorder`
//! - Updates are atomic increments, safe from any number of workers
//! - Histogram buckets tuned for object store round trips

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

use crate::operation::{OperationKind, StatusClass};

pub const OPERATIONS_TOTAL: &str = "doc_operations_total";
pub const OPERATION_DURATION_SECONDS: &str = "doc_operation_duration_seconds";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Counters and duration histograms for document operations.
pub struct MetricsRegistry {
    service: String,
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn new(service: &str) -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(OPERATION_DURATION_SECONDS.to_string()),
                DURATION_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            service: service.to_string(),
            recorder,
            handle,
        })
    }

    /// Count one finished operation.
    pub fn increment_counter(&self, operation: OperationKind, status: StatusClass) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(
                OPERATIONS_TOTAL,
                "service" => self.service.clone(),
                "operation" => operation.as_str(),
                "status_type" => status.as_str()
            )
            .increment(1);
        });
    }

    /// Record how long one operation took.
    pub fn observe_duration(&self, operation: OperationKind, seconds: f64) {
        metrics::with_local_recorder(&self.recorder, || {
            histogram!(
                OPERATION_DURATION_SECONDS,
                "service" => self.service.clone(),
                "operation" => operation.as_str()
            )
            .record(seconds);
        });
    }

    /// Record the terminal pair for an operation: one duration, one count.
    pub fn record_operation(&self, operation: OperationKind, status: StatusClass, elapsed: Duration) {
        self.observe_duration(operation, elapsed.as_secs_f64());
        self.increment_counter(operation, status);
    }

    /// Render the current state in Prometheus text format.
    pub fn exposition(&self) -> String {
        self.handle.render()
    }
}

/// Find a sample in exposition text by name and label pairs.
///
/// Used by the tests; scrapers parse the text themselves.
pub fn sample_value(exposition: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    exposition
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.starts_with(&format!("{}{{", name)) || line.starts_with(&format!("{} ", name)))
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .and_then(|line| line.rsplit_once(' '))
        .and_then(|(_, value)| value.trim().parse().ok())
}
