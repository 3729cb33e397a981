//! Distributed tracing support.
//!
//! # Responsibilities
//! - Open a root span per operation and child spans per storage call
//! - Close every span exactly once, on every exit path (drop guard)
//! - Export finished spans over OTLP/HTTP through the OpenTelemetry SDK
//!
//! # Design Decisions
//! - Parents are passed explicitly; no ambient "current span" context
//! - Without a collector the emitter hands out no-op spans with the same contract
//! - Export goes through the SDK batch processor, so recording never blocks

use std::time::Duration;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, TraceError, Tracer as _, TracerProvider as _};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use thiserror::Error;

const INSTRUMENTATION_SCOPE: &str = "doc-storage-gateway";
const SPAN_QUEUE_CAPACITY: usize = 2048;

/// Port the trace backend's query API listens on.
const QUERY_PORT_SUFFIX: &str = ":3200";
/// Port and path of the OTLP/HTTP trace receiver.
const OTLP_HTTP_SUFFIX: &str = ":4318/v1/traces";

/// Derive the OTLP/HTTP receiver address from a collector base address.
pub fn otlp_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/').replace(QUERY_PORT_SUFFIX, "");
    format!("{}{}", base, OTLP_HTTP_SUFFIX)
}

/// Errors setting up the trace pipeline.
#[derive(Debug, Error)]
pub enum TraceSetupError {
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("OTLP exporter: {0}")]
    Exporter(#[from] TraceError),
}

/// A span attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        match v {
            AttributeValue::String(s) => Value::from(s),
            AttributeValue::Int(i) => Value::I64(i),
            AttributeValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// Opens spans on an SDK tracer.
#[derive(Clone, Default)]
pub struct TracingEmitter {
    tracer: Option<Tracer>,
}

impl TracingEmitter {
    /// Emitter recording into `provider`'s processors.
    pub fn new(provider: &TracerProvider) -> Self {
        Self {
            tracer: Some(provider.tracer(INSTRUMENTATION_SCOPE)),
        }
    }

    /// Emitter whose spans go nowhere.
    pub fn disabled() -> Self {
        Self { tracer: None }
    }

    /// Open a span, as a child of `parent` when given.
    pub fn start_span(&self, name: &str, parent: Option<&SpanGuard>) -> SpanGuard {
        let Some(tracer) = &self.tracer else {
            return SpanGuard::new(Context::new());
        };
        let (kind, parent_cx) = match parent {
            Some(p) => (SpanKind::Internal, p.cx.clone()),
            None => (SpanKind::Server, Context::new()),
        };
        let span = tracer
            .span_builder(name.to_string())
            .with_kind(kind)
            .start_with_context(tracer, &parent_cx);
        SpanGuard::new(Context::new().with_span(span))
    }
}

/// An open span. Ended when dropped.
pub struct SpanGuard {
    cx: Context,
    keys: Vec<String>,
    error: Option<String>,
}

impl SpanGuard {
    fn new(cx: Context) -> Self {
        Self {
            cx,
            keys: Vec::new(),
            error: None,
        }
    }

    /// Set an attribute. The first value written for a key wins.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        if self.keys.iter().any(|k| k == key) {
            tracing::debug!(key, "Span attribute already set, ignoring");
            return;
        }
        self.keys.push(key.to_string());
        self.cx
            .span()
            .set_attribute(KeyValue::new(key.to_string(), Value::from(value.into())));
    }

    /// Flag the span as failed. Only the first call has an effect.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        if self.error.is_some() {
            return;
        }
        let message = message.into();
        self.set_attribute("error", true);
        self.set_attribute("error.message", message.as_str());
        self.cx.span().set_status(Status::error(message.clone()));
        self.error = Some(message);
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Hex trace id; all zeros for a no-op span.
    pub fn trace_id(&self) -> String {
        self.cx.span().span_context().trace_id().to_string()
    }

    pub fn span_id(&self) -> String {
        self.cx.span().span_context().span_id().to_string()
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// OTLP/HTTP trace pipeline: batch processor in front of the exporter.
pub struct TraceExporter {
    provider: TracerProvider,
    endpoint: String,
}

impl TraceExporter {
    /// Build the pipeline. Must run inside a Tokio runtime.
    pub fn otlp(
        endpoint: &str,
        service_name: &str,
        timeout: Duration,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Result<Self, TraceSetupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_http_client(client)
            .with_protocol(Protocol::HttpJson)
            .with_endpoint(endpoint)
            .with_timeout(timeout)
            .build()?;

        let batch = BatchConfigBuilder::default()
            .with_max_queue_size(SPAN_QUEUE_CAPACITY)
            .with_max_export_batch_size(batch_size)
            .with_scheduled_delay(flush_interval)
            .build();
        let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
            .with_batch_config(batch)
            .build();

        let provider = TracerProvider::builder()
            .with_span_processor(processor)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]))
            .build();

        Ok(Self {
            provider,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Emitter feeding this pipeline.
    pub fn emitter(&self) -> TracingEmitter {
        TracingEmitter::new(&self.provider)
    }

    /// Flush queued spans and stop the processor.
    pub async fn shutdown(self) {
        let provider = self.provider;
        // the SDK blocks while its batch task drains
        match tokio::task::spawn_blocking(move || provider.shutdown()).await {
            Ok(Ok(())) => tracing::debug!("Trace exporter stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Trace exporter shutdown failed"),
            Err(e) => tracing::warn!(error = %e, "Trace exporter shutdown task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::SpanId;
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recording() -> (TracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    fn attr(span: &SpanData, key: &str) -> Option<Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[test]
    fn test_otlp_endpoint_derivation() {
        assert_eq!(otlp_endpoint("http://tempo:3200"), "http://tempo:4318/v1/traces");
        assert_eq!(otlp_endpoint("http://tempo"), "http://tempo:4318/v1/traces");
        assert_eq!(otlp_endpoint("http://tempo:3200/"), "http://tempo:4318/v1/traces");
    }

    #[test]
    fn test_span_ended_once_on_drop() {
        let (provider, exporter) = recording();
        let emitter = TracingEmitter::new(&provider);
        {
            let mut span = emitter.start_span("WriteDoc", None);
            span.set_attribute("operation", "WriteDoc");
            assert_eq!(span.trace_id().len(), 32);
            assert_eq!(span.span_id().len(), 16);
        }
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "WriteDoc");
        assert_eq!(spans[0].span_kind, SpanKind::Server);
        assert!(spans[0].end_time >= spans[0].start_time);
    }

    #[test]
    fn test_child_links_to_explicit_parent() {
        let (provider, exporter) = recording();
        let emitter = TracingEmitter::new(&provider);
        let root = emitter.start_span("ReadDoc", None);
        let root_id = root.span_id();
        drop(emitter.start_span("s3_retrieve_document", Some(&root)));
        drop(root);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].name, "s3_retrieve_document");
        assert_eq!(spans[0].span_context.trace_id(), spans[1].span_context.trace_id());
        assert_eq!(spans[0].parent_span_id.to_string(), root_id);
        assert_eq!(spans[0].span_kind, SpanKind::Internal);
        assert_eq!(spans[1].parent_span_id, SpanId::INVALID);
    }

    #[test]
    fn test_unrelated_roots_get_distinct_traces() {
        let (provider, exporter) = recording();
        let emitter = TracingEmitter::new(&provider);
        drop(emitter.start_span("WriteDoc", None));
        drop(emitter.start_span("WriteDoc", None));

        let spans = exporter.get_finished_spans().unwrap();
        assert_ne!(spans[0].span_context.trace_id(), spans[1].span_context.trace_id());
    }

    #[test]
    fn test_attributes_are_write_once() {
        let (provider, exporter) = recording();
        let emitter = TracingEmitter::new(&provider);
        let mut span = emitter.start_span("WriteDoc", None);
        span.set_attribute("doc.key", "first");
        span.set_attribute("doc.key", "second");
        span.set_attribute("doc.size_bytes", 7usize);
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].attributes.len(), 2);
        assert_eq!(attr(&spans[0], "doc.key"), Some(Value::from("first")));
        assert_eq!(attr(&spans[0], "doc.size_bytes"), Some(Value::I64(7)));
    }

    #[test]
    fn test_mark_error_only_once() {
        let (provider, exporter) = recording();
        let emitter = TracingEmitter::new(&provider);
        let mut span = emitter.start_span("ReadDoc", None);
        span.mark_error("storage down");
        span.mark_error("second failure");
        assert!(span.is_error());
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].status, Status::error("storage down"));
        assert_eq!(attr(&spans[0], "error"), Some(Value::Bool(true)));
        assert_eq!(attr(&spans[0], "error.message"), Some(Value::from("storage down")));
    }

    #[test]
    fn test_disabled_emitter_is_noop() {
        let emitter = TracingEmitter::disabled();
        let mut span = emitter.start_span("WriteDoc", None);
        span.set_attribute("operation", "WriteDoc");
        span.mark_error("boom");
        assert!(span.is_error());
        drop(span);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_exporter_flushes_on_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/traces"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let exporter = TraceExporter::otlp(
            &format!("{}/v1/traces", server.uri()),
            "DocStorageService",
            Duration::from_secs(2),
            100,
            Duration::from_secs(60),
        )
        .unwrap();
        let emitter = exporter.emitter();
        let root = emitter.start_span("WriteDoc", None);
        drop(emitter.start_span("s3_store_document", Some(&root)));
        drop(root);
        exporter.shutdown().await;

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.is_empty());
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("WriteDoc"));
        assert!(body.contains("s3_store_document"));
        assert!(body.contains("DocStorageService"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_collector_does_not_fail_shutdown() {
        let exporter = TraceExporter::otlp(
            "http://127.0.0.1:9/v1/traces",
            "svc",
            Duration::from_millis(200),
            10,
            Duration::from_millis(50),
        )
        .unwrap();
        drop(exporter.emitter().start_span("ReadDoc", None));
        exporter.shutdown().await;
    }
}
