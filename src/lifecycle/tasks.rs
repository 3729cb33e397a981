//! Bounded pool for detached background work.
//!
//! Tasks are fire-and-forget: a request that schedules one never waits for
//! it. Each task is supervised, so an `Err` or a panic inside it ends up as
//! a warning in the local log and goes no further.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Semaphore;

/// Semaphore-bounded spawner for background tasks.
#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl TaskPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Spawn `task` if a slot is free. Returns false when the pool is full
    /// and the task was skipped.
    pub fn spawn<F, E>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(task = name, capacity = self.capacity, "Background pool saturated, skipping task");
                return false;
            }
        };

        tokio::spawn(async move {
            let _permit = permit;
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task finished"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "Background task failed"),
                Err(_) => tracing::warn!(task = name, "Background task panicked"),
            }
        });
        true
    }

    /// Number of tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Wait up to `grace` for running tasks to finish. Returns true if the
    /// pool drained in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        match tokio::time::timeout(grace, self.permits.acquire_many(all)).await {
            Ok(Ok(_permits)) => true,
            Ok(Err(_)) => true,
            Err(_) => {
                tracing::warn!(in_flight = self.in_flight(), "Background tasks still running at shutdown");
                false
            }
        }
    }
}
