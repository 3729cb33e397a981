//! Per-call request context.
//!
//! # Responsibilities
//! - Generate a short correlation id for every inbound call
//! - Remember when the call started
//!
//! # Design Decisions
//! - The context is an explicit value passed down the call chain
//! - Never stored in globals or task-locals, never shared across calls

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Header echoing the correlation id back to the caller.
pub const X_REQUEST_ID: &str = "x-request-id";

const CORRELATION_ID_LEN: usize = 8;

/// Correlation id and start instant of one inbound call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: String,
    started_at: Instant,
}

impl RequestContext {
    /// Start a new call.
    pub fn begin() -> Self {
        let mut correlation_id = Uuid::new_v4().simple().to_string();
        correlation_id.truncate(CORRELATION_ID_LEN);
        Self {
            correlation_id,
            started_at: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since the call began.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
