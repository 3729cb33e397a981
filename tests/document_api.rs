//! End-to-end tests for the document HTTP API.

mod common;

use std::sync::Arc;

use common::{test_config, TestGateway, UnreachableStore};
use serde_json::{json, Value};

use doc_storage_gateway::observability::MetricsPusher;
use doc_storage_gateway::storage::ObjectStore;

async fn store_raw(gw: &TestGateway, body: &str) -> String {
    let resp = gw
        .client
        .post(gw.url("/data"))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json::<Value>().await.unwrap()["key"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let gw = TestGateway::start().await;

    let documents = [
        json!({"name": "test", "value": 123}),
        json!({"nested": {"list": [1, 2, 3], "flag": true}, "unicode": "héllo ✓"}),
        json!([1, "two", null]),
        json!("just a string"),
        json!(42.5),
    ];

    for document in documents {
        let resp = gw
            .client
            .post(gw.url("/data"))
            .json(&document)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Document stored successfully");
        let key = body["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("documents/"));
        assert!(key.ends_with(".json"));

        let resp = gw
            .client
            .get(gw.url(&format!("/data/{}", key)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let fetched: Value = resp.json().await.unwrap();
        assert_eq!(fetched, document);
    }
}

#[tokio::test]
async fn test_null_body_is_a_document() {
    let gw = TestGateway::start().await;

    let resp = gw
        .client
        .post(gw.url("/data"))
        .body("null")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let key = resp.json::<Value>().await.unwrap()["key"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = gw
        .client
        .get(gw.url(&format!("/data/{}", key)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_document_bytes_survive_unchanged() {
    let gw = TestGateway::start().await;

    let document = "{\"id\":123456789012345678901234567890,\"ratio\":1.0,\"tiny\":1e-400}";
    let key = store_raw(&gw, document).await;

    let resp = gw
        .client
        .get(gw.url(&format!("/data/{}", key)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.text().await.unwrap(), document);
}

#[tokio::test]
async fn test_aliased_keys_return_404() {
    let gw = TestGateway::start().await;
    let key = store_raw(&gw, "{\"a\":1}").await;
    let name = key.trim_start_matches("documents/");

    for path in [
        format!("/data//{}", key),
        format!("/data/documents//{}", name),
        format!("/data/{}/", key),
        "/data/documents/missing/".to_string(),
    ] {
        let resp = gw.client.get(gw.url(&path)).send().await.unwrap();
        assert_eq!(resp.status(), 404, "{}", path);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": "Document not found"}));
    }
    assert_eq!(gw.count("ReadDoc", "service_error"), None);
}

#[tokio::test]
async fn test_oversized_body_is_an_instrumented_service_error() {
    let mut config = test_config();
    config.listener.max_body_size = 1024;
    let gw = TestGateway::start_configured(
        config,
        Arc::new(ObjectStore::memory().unwrap()),
        MetricsPusher::disabled(),
    )
    .await;

    let resp = gw
        .client
        .post(gw.url("/data"))
        .json(&json!({"pad": "x".repeat(2048)}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let id = resp.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Service error occurred"}));

    assert_eq!(gw.count("WriteDoc", "service_error"), Some(1.0));
    assert_eq!(gw.observations("WriteDoc"), Some(1.0));
    let events = gw.logged(&id).await;
    assert_eq!(events.len(), 2);
    assert!(events[1].message.contains("due to service error"));
}

#[tokio::test]
async fn test_keys_are_unique() {
    let gw = TestGateway::start().await;

    let mut keys = std::collections::HashSet::new();
    for _ in 0..20 {
        let body: Value = gw
            .client
            .post(gw.url("/data"))
            .json(&json!({"same": "document"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(keys.insert(body["key"].as_str().unwrap().to_string()));
    }
}

#[tokio::test]
async fn test_read_missing_returns_404() {
    let gw = TestGateway::start().await;

    let resp = gw
        .client
        .get(gw.url("/data/documents/missing.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Document not found"}));
}

#[tokio::test]
async fn test_storage_failure_returns_500() {
    let gw = TestGateway::start_with_store(Arc::new(UnreachableStore)).await;

    let resp = gw
        .client
        .post(gw.url("/data"))
        .json(&json!({"a": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Service error occurred"}));

    let resp = gw
        .client
        .get(gw.url("/data/documents/any.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Service error occurred"}));
}

#[tokio::test]
async fn test_malformed_body_is_a_service_error() {
    let gw = TestGateway::start().await;

    let resp = gw
        .client
        .post(gw.url("/data"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Service error occurred");
    assert_eq!(gw.count("WriteDoc", "service_error"), Some(1.0));
}

#[tokio::test]
async fn test_request_id_header_on_success() {
    let gw = TestGateway::start().await;

    let resp = gw
        .client
        .post(gw.url("/data"))
        .json(&json!({"x": 1}))
        .send()
        .await
        .unwrap();
    let id = resp.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(id.len(), 8);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_health() {
    let gw = TestGateway::start().await;

    let resp = gw.client.get(gw.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    let ts = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());

    // health checks are not document operations
    assert_eq!(gw.count("WriteDoc", "success"), None);
    assert!(gw.events().await.is_empty());
}

#[tokio::test]
async fn test_metrics_exposition() {
    let gw = TestGateway::start().await;

    gw.client
        .post(gw.url("/data"))
        .json(&json!({"x": 1}))
        .send()
        .await
        .unwrap();

    let resp = gw.client.get(gw.url("/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let text = resp.text().await.unwrap();
    assert!(text.contains("doc_operations_total"));
    assert!(text.contains("doc_operation_duration_seconds_bucket"));
    assert!(text.contains("status_type=\"success\""));
}

#[tokio::test]
async fn test_unknown_route_is_404_without_instrumentation() {
    let gw = TestGateway::start().await;

    let resp = gw.client.get(gw.url("/nope")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(gw.spans().is_empty());
}
