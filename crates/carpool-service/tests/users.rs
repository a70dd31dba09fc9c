//! User registration integration tests.

mod common;

use axum::http::{HeaderValue, StatusCode};
use serde_json::{json, Value};

use carpool_core::UserId;
use common::{error_code, TestHarness};

#[tokio::test]
async fn register_then_fetch_profile() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    let response = harness
        .server
        .post("/v1/users")
        .add_header(TestHarness::auth_name(), harness.auth(&user_id))
        .json(&json!({
            "name": "  Priya  ",
            "email": "Priya@Example.com",
            "phone": "9876543210"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["name"], "Priya");
    assert_eq!(body["email"], "priya@example.com");
    assert_eq!(body["role"], "ORDINARY");

    let response = harness
        .server
        .get("/v1/users/me")
        .add_header(TestHarness::auth_name(), harness.auth(&user_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["rating"], 5.0);
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let harness = TestHarness::new();
    let user_id = harness.register("Ravi").await;

    let response = harness
        .server
        .post("/v1/users")
        .add_header(TestHarness::auth_name(), harness.auth(&user_id))
        .json(&json!({
            "name": "Ravi again",
            "email": "ravi.again@example.com",
            "phone": "1234567890"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response.json()), "already_registered");
}

#[tokio::test]
async fn invalid_profile_is_rejected() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    let response = harness
        .server
        .post("/v1/users")
        .add_header(TestHarness::auth_name(), harness.auth(&user_id))
        .json(&json!({ "name": "Nope", "email": "not-an-email", "phone": "123" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json()), "validation_failed");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/users/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = harness
        .server
        .get("/v1/users/me")
        .add_header(
            TestHarness::auth_name(),
            HeaderValue::from_static("Bearer not.a.jwt"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response.json()), "unauthorized");
}

#[tokio::test]
async fn unregistered_caller_is_not_found() {
    let harness = TestHarness::new();
    let stranger = UserId::generate();

    let response = harness
        .server
        .get("/v1/users/me")
        .add_header(TestHarness::auth_name(), harness.auth(&stranger))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json()), "not_found");
}

#[tokio::test]
async fn configured_admin_registers_as_admin() {
    let harness = TestHarness::new();
    let admin_id = harness.register_admin().await;

    let response = harness
        .server
        .get("/v1/users/me")
        .add_header(TestHarness::auth_name(), harness.auth(&admin_id))
        .await;
    let body: Value = response.json();
    assert_eq!(body["role"], "ADMIN");
}
