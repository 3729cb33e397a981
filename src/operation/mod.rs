//! Document operations.
//!
//! # Data Flow
//! ```text
//! http::handlers
//!     → executor.rs (STARTED → STORAGE_CALL → SUCCESS | CLIENT_ERROR | SERVICE_ERROR)
//!         → storage (exactly one call)
//!         → classify.rs (failure → status class + HTTP status)
//!     → OperationReport back to the handler
//! ```

pub mod classify;
pub mod executor;

use std::fmt;

pub use classify::{classify, OperationError};
pub use executor::{OperationExecutor, OperationReport};

/// The two document operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    WriteDoc,
    ReadDoc,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::WriteDoc => "WriteDoc",
            OperationKind::ReadDoc => "ReadDoc",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse outcome bucket used for metrics and log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    ClientError,
    ServiceError,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => "success",
            StatusClass::ClientError => "client_error",
            StatusClass::ServiceError => "service_error",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
