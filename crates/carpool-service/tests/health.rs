//! Health endpoint integration tests.

mod common;

use std::sync::Arc;

use carpool_service::{AppState, ConfigError, ServiceConfig};
use carpool_store::MemoryStore;
use common::TestHarness;

#[tokio::test]
async fn health_check_returns_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn health_check_returns_json() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "carpool");
    assert_eq!(body["ledger"], false);
}

#[tokio::test]
async fn health_reports_configured_ledger() {
    let harness = TestHarness::with_ledger("http://127.0.0.1:9");

    let body: serde_json::Value = harness.server.get("/health").await.json();
    assert_eq!(body["ledger"], true);
}

#[test]
fn state_requires_signing_secret() {
    let result = AppState::new(Arc::new(MemoryStore::new()), ServiceConfig::default());
    assert!(matches!(result, Err(ConfigError::MissingAuthSecret)));

    let config = ServiceConfig {
        auth_secret: Some(String::new()),
        ..ServiceConfig::default()
    };
    assert!(matches!(
        AppState::new(Arc::new(MemoryStore::new()), config),
        Err(ConfigError::MissingAuthSecret)
    ));
}
