//! Response building.
//!
//! # Responsibilities
//! - Turn an `OperationReport` into the caller-facing HTTP response
//! - Map failures to status codes through the classifier
//! - Echo the correlation id in `x-request-id`
//!
//! # Design Decisions
//! - Error bodies are a single generic `error` string; detail stays in logs

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::http::request::X_REQUEST_ID;
use crate::operation::{classify, OperationError, OperationReport};
use crate::storage::JSON_CONTENT_TYPE;

pub const NOT_FOUND_MESSAGE: &str = "Document not found";
pub const SERVICE_ERROR_MESSAGE: &str = "Service error occurred";
pub const STORED_MESSAGE: &str = "Document stored successfully";

/// Body of a successful write.
#[derive(Debug, Serialize)]
pub struct StoredDocument {
    pub message: &'static str,
    pub key: String,
}

/// Caller-facing view of an operation failure.
#[derive(Debug)]
pub struct ApiError(pub OperationError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (_, status) = classify(&self.0);
        let message = if status == StatusCode::NOT_FOUND {
            NOT_FOUND_MESSAGE
        } else {
            SERVICE_ERROR_MESSAGE
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Response for `POST /data`.
pub fn write_response(report: OperationReport<String>) -> Response {
    let response = match report.result {
        Ok(key) => (
            StatusCode::OK,
            Json(StoredDocument {
                message: STORED_MESSAGE,
                key,
            }),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    };
    with_request_id(response, &report.correlation_id)
}

/// Response for `GET /data/{key}`. The stored bytes are sent as-is.
pub fn read_response(report: OperationReport<Bytes>) -> Response {
    let response = match report.result {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            document,
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    };
    with_request_id(response, &report.correlation_id)
}

fn with_request_id(mut response: Response, correlation_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
