//! Failure classification.
//!
//! | Failure                          | Status class  | HTTP |
//! |----------------------------------|---------------|------|
//! | key absent on read               | client_error  | 404  |
//! | anything else                    | service_error | 500  |

use std::error::Error as _;

use axum::http::StatusCode;
use thiserror::Error;

use crate::operation::StatusClass;
use crate::storage::StorageError;

/// Everything that can end an operation early.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The store has no document under the requested key.
    #[error("document not found for key: {key}")]
    NotFound { key: String },

    /// The store was unreachable or rejected the call.
    #[error("storage call failed")]
    StorageFailure(#[source] StorageError),

    /// Malformed input, serialization trouble, or anything unforeseen.
    #[error("{0}")]
    UnexpectedFailure(String),
}

impl OperationError {
    /// Map a storage error raised by a read; only reads can miss.
    pub fn from_read(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => OperationError::NotFound { key },
            other => OperationError::StorageFailure(other),
        }
    }

    /// The error and all of its sources, joined with ": ".
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Map a failure to its status class and HTTP status.
pub fn classify(err: &OperationError) -> (StatusClass, StatusCode) {
    match err {
        OperationError::NotFound { .. } => (StatusClass::ClientError, StatusCode::NOT_FOUND),
        OperationError::StorageFailure(_) | OperationError::UnexpectedFailure(_) => {
            (StatusClass::ServiceError, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
