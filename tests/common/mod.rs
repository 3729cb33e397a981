//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;

use doc_storage_gateway::config::{GatewayConfig, StorageBackend};
use doc_storage_gateway::observability::metrics::{sample_value, OPERATIONS_TOTAL};
use doc_storage_gateway::observability::{
    LogCorrelator, LogEvent, LogSink, MetricsPusher, MetricsRegistry, SinkError, Telemetry,
    TracingEmitter,
};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use doc_storage_gateway::storage::{DocumentStore, ObjectStore, StorageError};
use doc_storage_gateway::{Gateway, Shutdown};

pub const SERVICE: &str = "DocStorageService";

/// Log sink that keeps every pushed event.
#[derive(Default)]
pub struct RecordingLogSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn for_request(&self, correlation_id: &str) -> Vec<LogEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.labels.correlation_id == correlation_id)
            .collect()
    }
}

#[async_trait]
impl LogSink for RecordingLogSink {
    async fn push(&self, _service: &str, event: &LogEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Store whose backend is always unreachable.
pub struct UnreachableStore;

#[async_trait]
impl DocumentStore for UnreachableStore {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, _key: &str, _body: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("dispatch failure: connection refused".into()))
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Backend("dispatch failure: connection refused".into()))
    }
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub logs: Arc<RecordingLogSink>,
    pub correlator: LogCorrelator,
    pub spans: InMemorySpanExporter,
    provider: TracerProvider,
    pub metrics: Arc<MetricsRegistry>,
    pub client: reqwest::Client,
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.storage.backend = StorageBackend::Memory;
    config
}

impl TestGateway {
    /// Gateway over an in-memory store with recording sinks.
    pub async fn start() -> Self {
        Self::start_with_store(Arc::new(ObjectStore::memory().unwrap())).await
    }

    /// Gateway over `store` with recording sinks.
    pub async fn start_with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::start_with(store, MetricsPusher::disabled()).await
    }

    pub async fn start_with(store: Arc<dyn DocumentStore>, pusher: MetricsPusher) -> Self {
        Self::start_configured(test_config(), store, pusher).await
    }

    pub async fn start_configured(
        config: GatewayConfig,
        store: Arc<dyn DocumentStore>,
        pusher: MetricsPusher,
    ) -> Self {
        let logs = Arc::new(RecordingLogSink::default());
        let spans = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(spans.clone())
            .build();
        let metrics = Arc::new(MetricsRegistry::new(SERVICE).unwrap());
        let correlator = LogCorrelator::new(SERVICE, logs.clone());
        let telemetry = Telemetry {
            tracer: TracingEmitter::new(&provider),
            logs: correlator.clone(),
            metrics: metrics.clone(),
            pusher,
        };

        let shutdown = Shutdown::new();
        let gateway = Gateway::assemble(config, store, telemetry, shutdown.clone(), None);
        let addr = serve(gateway).await;

        Self {
            addr,
            shutdown,
            logs,
            correlator,
            spans,
            provider,
            metrics,
            client: client(),
        }
    }

    /// Every event pushed so far, after draining the push queue.
    pub async fn events(&self) -> Vec<LogEvent> {
        self.correlator.flush().await;
        self.logs.events()
    }

    /// Events for one request, after draining the push queue.
    pub async fn logged(&self, correlation_id: &str) -> Vec<LogEvent> {
        self.correlator.flush().await;
        self.logs.for_request(correlation_id)
    }

    /// Every span ended so far.
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Counter value for (operation, status_type), if ever incremented.
    pub fn count(&self, operation: &str, status: &str) -> Option<f64> {
        sample_value(
            &self.metrics.exposition(),
            OPERATIONS_TOTAL,
            &[("operation", operation), ("status_type", status)],
        )
    }

    /// Number of duration observations for an operation.
    pub fn observations(&self, operation: &str) -> Option<f64> {
        sample_value(
            &self.metrics.exposition(),
            "doc_operation_duration_seconds_count",
            &[("operation", operation)],
        )
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind an ephemeral port and run `gateway` on it in the background.
pub async fn serve(gateway: Gateway) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = gateway.run(listener).await;
    });
    addr
}

/// Value of a span attribute, if set.
pub fn attr(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
