//! Document storage subsystem.
//!
//! # Data Flow
//! ```text
//! operation::executor
//!     → DocumentStore::put / get (one call per operation)
//!     → object_store.rs (opendal Operator: S3 or in-memory)
//! ```
//!
//! # Design Decisions
//! - The store is an opaque key → bytes service; no retries here
//! - "Key absent" is the only failure callers can tell apart

pub mod object_store;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

pub use object_store::ObjectStore;

/// Content type stored alongside every document.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors reported by a document store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists under the key.
    #[error("no document stored under key '{0}'")]
    NotFound(String),

    /// The store could not be reached or rejected the call.
    #[error("object store failure: {0}")]
    Backend(String),
}

/// An opaque key/value blob service.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name recorded on storage spans (e.g. "s3").
    fn kind(&self) -> &'static str;

    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build a fresh key of the form `documents/<timestamp>-<uuid>.json`.
pub fn generate_document_key() -> String {
    format!(
        "documents/{}-{}.json",
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        Uuid::new_v4()
    )
}
