//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every process-wide singleton once, in dependency order
//! - Run the HTTP server until shutdown
//! - Tear down in reverse: stop accepting, drain background work, flush logs and spans
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener is bound by the caller, so traffic only arrives once ready

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::{Shutdown, TaskPool};
use crate::observability::{Telemetry, TelemetryError, TraceExporter};
use crate::operation::OperationExecutor;
use crate::storage::{DocumentStore, ObjectStore, StorageError};

/// Fatal errors while assembling the gateway.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("observability setup failed: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

/// A fully assembled gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    executor: Arc<OperationExecutor>,
    tasks: TaskPool,
    shutdown: Shutdown,
    exporter: Option<TraceExporter>,
}

impl Gateway {
    /// Build everything from configuration. Must run inside a Tokio runtime.
    pub fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        let shutdown = Shutdown::new();
        let (telemetry, exporter) = Telemetry::from_config(&config.observability)?;
        let store = Arc::new(ObjectStore::from_config(&config.storage)?);
        tracing::info!(
            backend = ?config.storage.backend,
            bucket = %config.storage.bucket,
            "Object store ready"
        );
        Ok(Self::assemble(config, store, telemetry, shutdown, exporter))
    }

    /// Build from already-constructed parts.
    pub fn assemble(
        config: GatewayConfig,
        store: Arc<dyn DocumentStore>,
        telemetry: Telemetry,
        shutdown: Shutdown,
        exporter: Option<TraceExporter>,
    ) -> Self {
        let tasks = TaskPool::new(config.background.max_concurrent_tasks);
        let executor = Arc::new(
            OperationExecutor::new(
                store,
                telemetry,
                tasks.clone(),
                &config.observability.service_name,
            )
            .with_body_limit(config.listener.max_body_size),
        );
        Self {
            config,
            executor,
            tasks,
            shutdown,
            exporter,
        }
    }

    /// Handle used to stop the gateway.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn executor(&self) -> Arc<OperationExecutor> {
        self.executor.clone()
    }

    /// Serve until shutdown, then tear down.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let server = HttpServer::new(self.executor.clone());
        let served = server.run(listener, self.shutdown.subscribe()).await;

        // the server may have stopped on its own
        self.shutdown.trigger();
        let grace = Duration::from_secs(self.config.background.shutdown_grace_secs);
        self.tasks.drain(grace).await;
        if tokio::time::timeout(grace, self.executor.telemetry().logs.flush())
            .await
            .is_err()
        {
            tracing::warn!("Log push queue not drained at shutdown");
        }
        if let Some(exporter) = self.exporter {
            exporter.shutdown().await;
        }

        served
    }
}
