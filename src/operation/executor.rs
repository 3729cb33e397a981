//! Operation executor.
//!
//! # Responsibilities
//! - Run one WriteDoc or ReadDoc around exactly one storage call
//! - Keep spans, correlated logs and metrics in lockstep
//! - Funnel every outcome through a single exit point
//!
//! # State machine
//! ```text
//! STARTED ──▶ STORAGE_CALL ──▶ SUCCESS
//!                          ├─▶ CLIENT_ERROR   (read of a missing key)
//!                          └─▶ SERVICE_ERROR  (everything else)
//! ```
//! Each terminal state records one counter increment and one duration
//! observation, emits one terminal log event, and closes every open span.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use serde::de::IgnoredAny;

use crate::http::request::RequestContext;
use crate::lifecycle::TaskPool;
use crate::observability::logging::ScopedLogger;
use crate::observability::{SpanGuard, Telemetry};
use crate::operation::{classify, OperationError, OperationKind, StatusClass};
use crate::storage::{generate_document_key, DocumentStore, JSON_CONTENT_TYPE};

const WRITE_SPAN: &str = "s3_store_document";
const READ_SPAN: &str = "s3_retrieve_document";
const METRICS_PUSH_TASK: &str = "metrics_push";
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Result of one operation, with the id it was logged under.
#[derive(Debug)]
pub struct OperationReport<T> {
    pub correlation_id: String,
    pub status_class: StatusClass,
    pub result: Result<T, OperationError>,
}

/// Terminal log text and key label for a successful operation.
struct Completion {
    detail: String,
    doc_key: Option<String>,
}

/// Runs document operations against the store with full instrumentation.
pub struct OperationExecutor {
    store: Arc<dyn DocumentStore>,
    telemetry: Telemetry,
    tasks: TaskPool,
    service_name: String,
    body_limit: usize,
}

impl OperationExecutor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        telemetry: Telemetry,
        tasks: TaskPool,
        service_name: &str,
    ) -> Self {
        Self {
            store,
            telemetry,
            tasks,
            service_name: service_name.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Largest request body accepted by `write_doc`, in bytes.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Store a JSON document under a freshly generated key.
    ///
    /// The body is read here, so oversized or broken uploads still finish
    /// as an instrumented operation. Valid JSON is stored byte for byte.
    pub async fn write_doc(&self, body: Body) -> OperationReport<String> {
        let op = OperationKind::WriteDoc;
        let ctx = RequestContext::begin();
        let mut root = self.open_root(op, &ctx, None);
        let log = self.telemetry.logs.scoped(ctx.correlation_id(), op);
        log.info(format!("Starting {} operation", op), None);

        let result = match self.read_body(body).await {
            Ok(bytes) => self.store_document(&root, &log, bytes).await,
            Err(e) => Err(e),
        };

        let report = self
            .finish(&ctx, op, &mut root, &log, None, result, |key| Completion {
                detail: format!("- document stored with key: {}", key),
                doc_key: Some(key.clone()),
            });
        if report.status_class == StatusClass::Success {
            self.schedule_metrics_push();
        }
        report
    }

    /// Fetch the document stored under `key`. The key is used as given and
    /// the stored bytes are returned unchanged.
    pub async fn read_doc(&self, key: &str) -> OperationReport<Bytes> {
        let op = OperationKind::ReadDoc;
        let ctx = RequestContext::begin();
        let mut root = self.open_root(op, &ctx, Some(key));
        let log = self.telemetry.logs.scoped(ctx.correlation_id(), op);
        log.info(format!("Starting {} operation for key: {}", op, key), Some(key));

        let result = self.retrieve_document(&root, &log, key).await;

        self.finish(&ctx, op, &mut root, &log, Some(key), result, |_| Completion {
            detail: format!("for key: {}", key),
            doc_key: Some(key.to_string()),
        })
    }

    fn open_root(&self, op: OperationKind, ctx: &RequestContext, key: Option<&str>) -> SpanGuard {
        let mut root = self.telemetry.tracer.start_span(op.as_str(), None);
        root.set_attribute("service.name", self.service_name.as_str());
        root.set_attribute("operation", op.as_str());
        if let Some(key) = key {
            root.set_attribute("doc.key", key);
        }
        root.set_attribute("request_id", ctx.correlation_id());
        root
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, OperationError> {
        axum::body::to_bytes(body, self.body_limit).await.map_err(|e| {
            OperationError::UnexpectedFailure(format!(
                "failed to read request body (limit {} bytes): {}",
                self.body_limit, e
            ))
        })
    }

    async fn store_document(
        &self,
        root: &SpanGuard,
        log: &ScopedLogger<'_>,
        payload: Bytes,
    ) -> Result<String, OperationError> {
        serde_json::from_slice::<IgnoredAny>(&payload).map_err(|e| {
            OperationError::UnexpectedFailure(format!("Request must contain valid JSON data: {}", e))
        })?;
        let key = generate_document_key();

        let mut span = self.telemetry.tracer.start_span(WRITE_SPAN, Some(root));
        span.set_attribute("doc.key", key.as_str());
        span.set_attribute("storage.type", self.store.kind());
        span.set_attribute("doc.size_bytes", payload.len());

        log.info(format!("WriteDoc - Starting put_object for key: {}", key), Some(key.as_str()));
        if let Err(e) = self.store.put(&key, payload.to_vec(), JSON_CONTENT_TYPE).await {
            span.mark_error(e.to_string());
            return Err(OperationError::StorageFailure(e));
        }
        log.info(
            format!("WriteDoc - put_object completed successfully for key: {}", key),
            Some(key.as_str()),
        );

        Ok(key)
    }

    async fn retrieve_document(
        &self,
        root: &SpanGuard,
        log: &ScopedLogger<'_>,
        key: &str,
    ) -> Result<Bytes, OperationError> {
        let mut span = self.telemetry.tracer.start_span(READ_SPAN, Some(root));
        span.set_attribute("doc.key", key);
        span.set_attribute("storage.type", self.store.kind());

        log.info(format!("ReadDoc - Starting get_object for key: {}", key), Some(key));
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = OperationError::from_read(e);
                if classify(&err).0 == StatusClass::ServiceError {
                    span.mark_error(err.chain());
                }
                return Err(err);
            }
        };
        if let Err(e) = serde_json::from_slice::<IgnoredAny>(&raw) {
            let err = OperationError::UnexpectedFailure(format!("stored document is not valid JSON: {}", e));
            span.mark_error(err.to_string());
            return Err(err);
        }
        log.info(
            format!("ReadDoc - get_object completed successfully for key: {}", key),
            Some(key),
        );

        Ok(Bytes::from(raw))
    }

    /// The single exit point: metrics, terminal log, span status.
    #[allow(clippy::too_many_arguments)]
    fn finish<T>(
        &self,
        ctx: &RequestContext,
        op: OperationKind,
        root: &mut SpanGuard,
        log: &ScopedLogger<'_>,
        doc_key: Option<&str>,
        result: Result<T, OperationError>,
        completion: impl FnOnce(&T) -> Completion,
    ) -> OperationReport<T> {
        let elapsed = ctx.elapsed();
        let secs = elapsed.as_secs_f64();
        let status_class = match &result {
            Ok(_) => StatusClass::Success,
            Err(e) => classify(e).0,
        };
        self.telemetry.metrics.record_operation(op, status_class, elapsed);

        match &result {
            Ok(value) => {
                let done = completion(value);
                log.info(
                    format!("{} operation completed successfully in {:.3}s {}", op, secs, done.detail),
                    done.doc_key.as_deref(),
                );
            }
            Err(e) if status_class == StatusClass::ClientError => {
                log.warn(format!("{} failed after {:.3}s - {}", op, secs, e), doc_key);
            }
            Err(e) => {
                let detail = e.chain();
                root.mark_error(detail.as_str());
                log.error(
                    format!("{} operation failed after {:.3}s due to service error: {}", op, secs, detail),
                    doc_key,
                );
            }
        }

        OperationReport {
            correlation_id: ctx.correlation_id().to_string(),
            status_class,
            result,
        }
    }

    fn schedule_metrics_push(&self) {
        let pusher = self.telemetry.pusher.clone();
        if !pusher.is_enabled() {
            return;
        }
        let metrics = self.telemetry.metrics.clone();
        self.tasks
            .spawn(METRICS_PUSH_TASK, async move { pusher.push(metrics.exposition()).await });
    }
}
