//! Best-effort forwarding of the local registry to a Pushgateway.

use std::time::Duration;

use crate::observability::SinkError;

/// Pushes exposition text to `{base}/metrics/job/{service}`.
#[derive(Clone, Default)]
pub struct MetricsPusher {
    target: Option<PushTarget>,
}

#[derive(Clone)]
struct PushTarget {
    client: reqwest::Client,
    url: String,
}

/// Pushgateway URL grouping metrics under the service's job.
pub fn push_url(base: &str, service: &str) -> String {
    format!("{}/metrics/job/{}", base.trim_end_matches('/'), service)
}

impl MetricsPusher {
    pub fn new(base: &str, service: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            target: Some(PushTarget {
                client,
                url: push_url(base, service),
            }),
        })
    }

    /// A pusher that does nothing.
    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Replace the job's metrics with `exposition`. No-op when disabled.
    pub async fn push(&self, exposition: String) -> Result<(), SinkError> {
        let Some(target) = &self.target else {
            tracing::debug!("Metrics push not configured");
            return Ok(());
        };

        let response = target
            .client
            .put(&target.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(exposition)
            .send()
            .await?;
        if response.status().is_success() {
            tracing::debug!(url = %target.url, "Pushed metrics");
            Ok(())
        } else {
            Err(SinkError::Status(response.status()))
        }
    }
}
