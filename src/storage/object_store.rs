//! Object store backed by an opendal `Operator`.

use async_trait::async_trait;
use opendal::{services, ErrorKind, Operator};

use crate::config::{StorageBackend, StorageConfig};
use crate::storage::{DocumentStore, StorageError};

/// Document store over S3 (or memory, for local runs and tests).
#[derive(Clone)]
pub struct ObjectStore {
    op: Operator,
    kind: &'static str,
}

impl ObjectStore {
    /// Build the store described by `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.backend {
            StorageBackend::S3 => {
                let mut builder = services::S3::default()
                    .bucket(&config.bucket)
                    .region(&config.region)
                    .root(&config.root);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint(endpoint);
                }
                let op = Operator::new(builder)
                    .map_err(|e| StorageError::Backend(e.to_string()))?
                    .finish();
                Ok(Self { op, kind: "s3" })
            }
            StorageBackend::Memory => Self::memory(),
        }
    }

    /// An empty process-local store.
    pub fn memory() -> Result<Self, StorageError> {
        let op = Operator::new(services::Memory::default())
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .finish();
        Ok(Self { op, kind: "memory" })
    }
}

/// Whether opendal would use `key` exactly as given.
///
/// The operator normalizes paths (trims whitespace, drops empty segments,
/// treats a trailing `/` as a directory), so any other key would alias a
/// different object.
pub fn is_canonical_key(key: &str) -> bool {
    !key.is_empty()
        && key.trim() == key
        && !key.starts_with('/')
        && !key.ends_with('/')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

fn map_error(key: &str, err: opendal::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
            StorageError::NotFound(key.to_string())
        }
        _ => StorageError::Backend(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for ObjectStore {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if !is_canonical_key(key) {
            return Err(StorageError::Backend(format!("refusing non-canonical key '{}'", key)));
        }
        self.op
            .write_with(key, body)
            .content_type(content_type)
            .await
            .map_err(|e| map_error(key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        // every stored key is canonical, so nothing lives under any other
        if !is_canonical_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let buffer = self.op.read(key).await.map_err(|e| map_error(key, e))?;
        Ok(buffer.to_vec())
    }
}
