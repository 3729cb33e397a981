//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the document storage gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Object store backing the documents.
    pub storage: StorageConfig,

    /// Tracing, log push and metrics settings.
    pub observability: ObservabilityConfig,

    /// Background task pool settings.
    pub background: BackgroundConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Which object store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local store, contents lost on exit.
    Memory,
    /// Amazon S3 or any S3-compatible server.
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "s3" => Ok(StorageBackend::S3),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Object store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store implementation.
    pub backend: StorageBackend,

    /// Bucket holding the documents (S3 only).
    pub bucket: String,

    /// Bucket region (S3 only).
    pub region: String,

    /// Custom endpoint for S3-compatible servers.
    pub endpoint: Option<String>,

    /// Root path inside the bucket.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: String::new(),
            region: "us-west-2".to_string(),
            endpoint: None,
            root: "/".to_string(),
        }
    }
}

/// Local log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to spans, log streams and metric labels.
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Local log format.
    pub log_format: LogFormat,

    /// Trace collector base address. Spans are dropped when unset.
    pub trace_endpoint: Option<String>,

    /// Log aggregator base address. Logs stay local when unset.
    pub log_endpoint: Option<String>,

    /// Push gateway base address for metrics forwarding.
    pub metrics_push_url: Option<String>,

    /// Span export request timeout in milliseconds.
    pub trace_export_timeout_ms: u64,

    /// Log push request timeout in milliseconds (at most 3000).
    pub log_push_timeout_ms: u64,

    /// Metrics push request timeout in milliseconds.
    pub metrics_push_timeout_ms: u64,

    /// Maximum spans per export request.
    pub trace_batch_size: usize,

    /// Interval between span export flushes in milliseconds.
    pub trace_flush_interval_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "DocStorageService".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            trace_endpoint: None,
            log_endpoint: None,
            metrics_push_url: None,
            trace_export_timeout_ms: 2000,
            log_push_timeout_ms: 3000,
            metrics_push_timeout_ms: 3000,
            trace_batch_size: 512,
            trace_flush_interval_ms: 1000,
        }
    }
}

/// Background task pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Maximum background tasks in flight at once.
    pub max_concurrent_tasks: usize,

    /// How long shutdown waits for in-flight tasks, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            shutdown_grace_secs: 5,
        }
    }
}
