//! Route handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::http::response::{read_response, write_response};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /health`
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.executor.telemetry().metrics.exposition(),
    )
        .into_response()
}

/// `POST /data`
///
/// The body is handed over unread so that oversized or malformed uploads
/// still go through the instrumented write path.
pub async fn write_document(State(state): State<AppState>, body: Body) -> Response {
    write_response(state.executor.write_doc(body).await)
}

/// `GET /data/{*key}`
pub async fn read_document(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    read_response(state.executor.read_doc(&key).await)
}
