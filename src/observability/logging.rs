//! Structured, correlated logging.
//!
//! # Responsibilities
//! - Initialize the local `tracing` subscriber
//! - Emit leveled log events labeled with the operation's correlation id
//! - Forward each event to a Loki-compatible aggregator, best effort
//!
//! # Design Decisions
//! - The local subscriber is the durability floor; it always sees the event
//! - Remote push is at-most-once with a bounded timeout
//! - Pushes are queued and sent in order by one background task; emitting
//!   never waits on the network and a full queue drops the remote copy
//! - Push failures are downgraded to local warnings, never propagated

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::SinkError;
use crate::operation::OperationKind;

/// Initialize the process-wide `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "doc_storage_gateway={level},doc_gateway={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    }
}

/// Severity of a correlated log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Label value used on the remote stream.
    pub fn as_label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Labels tying an event to its operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLabels {
    pub correlation_id: String,
    pub operation: Option<OperationKind>,
    pub doc_key: Option<String>,
}

/// A single correlated log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub labels: LogLabels,
    pub timestamp_unix_nanos: u128,
}

/// Remote destination for log events.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn push(&self, service: &str, event: &LogEvent) -> Result<(), SinkError>;
}

/// Pushes events to a Loki `/loki/api/v1/push` endpoint.
pub struct LokiSink {
    client: reqwest::Client,
    push_url: String,
}

impl LokiSink {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            push_url: format!("{}/loki/api/v1/push", base.trim_end_matches('/')),
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Build the push body for one event.
    pub fn payload(service: &str, event: &LogEvent) -> Value {
        let mut stream = json!({
            "service": service,
            "level": event.level.as_label(),
            "request_id": event.labels.correlation_id,
        });
        if let Some(operation) = event.labels.operation {
            stream["operation"] = json!(operation.as_str());
        }
        if let Some(doc_key) = &event.labels.doc_key {
            stream["doc_key"] = json!(doc_key);
        }
        json!({
            "streams": [{
                "stream": stream,
                "values": [[event.timestamp_unix_nanos.to_string(), event.message]],
            }]
        })
    }
}

#[async_trait]
impl LogSink for LokiSink {
    async fn push(&self, service: &str, event: &LogEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.push_url)
            .json(&Self::payload(service, event))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(SinkError::Status(response.status()))
        }
    }
}

macro_rules! local_event {
    ($level:expr, $event:expr) => {
        tracing::event!(
            $level,
            request_id = %$event.labels.correlation_id,
            operation = $event.labels.operation.map(|op| op.as_str()).unwrap_or("-"),
            doc_key = $event.labels.doc_key.as_deref().unwrap_or("-"),
            "{}",
            $event.message
        )
    };
}

const LOG_QUEUE_CAPACITY: usize = 1024;

enum Shipment {
    Event(LogEvent),
    Flush(oneshot::Sender<()>),
}

/// Writes correlated events locally and queues them for the remote sink.
#[derive(Clone)]
pub struct LogCorrelator {
    service: Arc<str>,
    queue: Option<mpsc::Sender<Shipment>>,
}

impl LogCorrelator {
    /// Correlator pushing to `sink` from a background task. Must run inside
    /// a Tokio runtime.
    pub fn new(service: &str, sink: Arc<dyn LogSink>) -> Self {
        let service: Arc<str> = Arc::from(service);
        let (tx, rx) = mpsc::channel(LOG_QUEUE_CAPACITY);
        tokio::spawn(ship(service.clone(), sink, rx));
        Self {
            service,
            queue: Some(tx),
        }
    }

    /// Correlator without a remote sink.
    pub fn local_only(service: &str) -> Self {
        Self {
            service: Arc::from(service),
            queue: None,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Emit one event. Never fails and never waits.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, labels: LogLabels) {
        let event = LogEvent {
            level,
            message: message.into(),
            labels,
            timestamp_unix_nanos: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
        };

        match event.level {
            LogLevel::Debug => local_event!(tracing::Level::DEBUG, event),
            LogLevel::Info => local_event!(tracing::Level::INFO, event),
            LogLevel::Warning => local_event!(tracing::Level::WARN, event),
            LogLevel::Error => local_event!(tracing::Level::ERROR, event),
        }

        if let Some(queue) = &self.queue {
            if let Err(e) = queue.try_send(Shipment::Event(event)) {
                tracing::warn!(error = %e, "Log push queue unavailable, dropping remote copy");
            }
        }
    }

    /// Wait until every event emitted so far has been pushed (or failed).
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if queue.send(Shipment::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// A logger bound to one operation's correlation id.
    pub fn scoped<'a>(&'a self, correlation_id: &'a str, operation: OperationKind) -> ScopedLogger<'a> {
        ScopedLogger {
            correlator: self,
            correlation_id,
            operation,
        }
    }
}

/// Per-operation logger; prefixes messages with the correlation id.
pub struct ScopedLogger<'a> {
    correlator: &'a LogCorrelator,
    correlation_id: &'a str,
    operation: OperationKind,
}

impl ScopedLogger<'_> {
    pub fn info(&self, message: impl AsRef<str>, doc_key: Option<&str>) {
        self.emit(LogLevel::Info, message.as_ref(), doc_key);
    }

    pub fn warn(&self, message: impl AsRef<str>, doc_key: Option<&str>) {
        self.emit(LogLevel::Warning, message.as_ref(), doc_key);
    }

    pub fn error(&self, message: impl AsRef<str>, doc_key: Option<&str>) {
        self.emit(LogLevel::Error, message.as_ref(), doc_key);
    }

    fn emit(&self, level: LogLevel, message: &str, doc_key: Option<&str>) {
        let labels = LogLabels {
            correlation_id: self.correlation_id.to_string(),
            operation: Some(self.operation),
            doc_key: doc_key.map(str::to_string),
        };
        self.correlator
            .emit(level, format!("[{}] {}", self.correlation_id, message), labels);
    }
}

/// Push queued events one at a time, in order.
async fn ship(service: Arc<str>, sink: Arc<dyn LogSink>, mut rx: mpsc::Receiver<Shipment>) {
    while let Some(shipment) = rx.recv().await {
        match shipment {
            Shipment::Event(event) => {
                if let Err(e) = sink.push(&service, &event).await {
                    tracing::warn!(
                        request_id = %event.labels.correlation_id,
                        error = %e,
                        "Failed to push log event"
                    );
                }
            }
            Shipment::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
