//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! configured endpoint is usable. All problems are reported, not just the
//! first one.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, StorageBackend};

/// Upper bound for a single log push attempt.
pub const MAX_LOG_PUSH_TIMEOUT_MS: u64 = 3000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be > 0"));
    }

    if config.storage.backend == StorageBackend::S3 && config.storage.bucket.trim().is_empty() {
        errors.push(ValidationError::new(
            "storage.bucket",
            "required when backend is s3",
        ));
    }

    let obs = &config.observability;
    let endpoints = [
        ("storage.endpoint", config.storage.endpoint.as_deref()),
        ("observability.trace_endpoint", obs.trace_endpoint.as_deref()),
        ("observability.log_endpoint", obs.log_endpoint.as_deref()),
        ("observability.metrics_push_url", obs.metrics_push_url.as_deref()),
    ];
    for (field, value) in endpoints {
        if let Some(raw) = value {
            if let Err(message) = check_http_url(raw) {
                errors.push(ValidationError::new(field, message));
            }
        }
    }

    if obs.service_name.trim().is_empty() {
        errors.push(ValidationError::new("observability.service_name", "must not be empty"));
    }
    let timeouts = [
        ("observability.trace_export_timeout_ms", obs.trace_export_timeout_ms),
        ("observability.log_push_timeout_ms", obs.log_push_timeout_ms),
        ("observability.metrics_push_timeout_ms", obs.metrics_push_timeout_ms),
        ("observability.trace_flush_interval_ms", obs.trace_flush_interval_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }
    if obs.log_push_timeout_ms > MAX_LOG_PUSH_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "observability.log_push_timeout_ms",
            format!("must be <= {}", MAX_LOG_PUSH_TIMEOUT_MS),
        ));
    }
    if obs.trace_batch_size == 0 {
        errors.push(ValidationError::new("observability.trace_batch_size", "must be > 0"));
    }

    if config.background.max_concurrent_tasks == 0 {
        errors.push(ValidationError::new(
            "background.max_concurrent_tasks",
            "must be >= 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}
