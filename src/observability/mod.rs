//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! operation::executor produces, per operation:
//!     → tracing.rs (root span + storage child span → OTel batch processor → OTLP/HTTP)
//!     → logging.rs (correlated log events → local subscriber + queued Loki push)
//!     → metrics.rs (one counter + one duration observation)
//!     → push.rs (optional Pushgateway forward, on the background pool)
//!
//! Consumers:
//!     → Trace collector (optional, e.g. Tempo)
//!     → Log aggregator (optional, e.g. Loki)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every channel is built once at startup and handed to the executor
//! - Remote sinks are best-effort: failures become local warnings
//! - No channel ever fails the operation it instruments

pub mod logging;
pub mod metrics;
pub mod push;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ObservabilityConfig;

pub use self::logging::{LogCorrelator, LogEvent, LogLabels, LogLevel, LogSink, LokiSink};
pub use self::metrics::MetricsRegistry;
pub use self::push::MetricsPusher;
pub use self::tracing::{SpanGuard, TraceExporter, TraceSetupError, TracingEmitter};

/// Failure talking to a remote observability backend.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// The process-wide observability handles.
///
/// Created once by `lifecycle::startup` and cloned into the request path.
#[derive(Clone)]
pub struct Telemetry {
    pub tracer: TracingEmitter,
    pub logs: LogCorrelator,
    pub metrics: Arc<MetricsRegistry>,
    pub pusher: MetricsPusher,
}

impl Telemetry {
    /// Build all channels from configuration.
    ///
    /// Returns the trace pipeline when a trace endpoint is set; the caller
    /// shuts it down last so queued spans are flushed. Must run inside a
    /// Tokio runtime.
    pub fn from_config(
        config: &ObservabilityConfig,
    ) -> Result<(Self, Option<TraceExporter>), TelemetryError> {
        let metrics = Arc::new(MetricsRegistry::new(&config.service_name)?);

        let (tracer, exporter) = match &config.trace_endpoint {
            Some(base) => {
                let exporter = TraceExporter::otlp(
                    &self::tracing::otlp_endpoint(base),
                    &config.service_name,
                    Duration::from_millis(config.trace_export_timeout_ms),
                    config.trace_batch_size,
                    Duration::from_millis(config.trace_flush_interval_ms),
                )?;
                ::tracing::info!(endpoint = %exporter.endpoint(), "Configured trace exporter");
                (exporter.emitter(), Some(exporter))
            }
            None => {
                ::tracing::info!("No trace endpoint configured, spans are not exported");
                (TracingEmitter::disabled(), None)
            }
        };

        let logs = match &config.log_endpoint {
            Some(base) => {
                let sink = LokiSink::new(base, Duration::from_millis(config.log_push_timeout_ms))?;
                ::tracing::info!(endpoint = %sink.push_url(), "Configured log push");
                LogCorrelator::new(&config.service_name, Arc::new(sink))
            }
            None => LogCorrelator::local_only(&config.service_name),
        };

        let pusher = match &config.metrics_push_url {
            Some(base) => MetricsPusher::new(
                base,
                &config.service_name,
                Duration::from_millis(config.metrics_push_timeout_ms),
            )?,
            None => MetricsPusher::disabled(),
        };

        Ok((
            Self {
                tracer,
                logs,
                metrics,
                pusher,
            },
            exporter,
        ))
    }
}

/// Error building the observability channels.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("metrics registry: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("remote sink: {0}")]
    Sink(#[from] SinkError),

    #[error("trace pipeline: {0}")]
    Trace(#[from] TraceSetupError),
}
