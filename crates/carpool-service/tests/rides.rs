//! Ride endpoint integration tests.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::{error_code, ride_body, TestHarness};

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn create_ride_prices_known_route() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;

    let ride = harness.create_ride(&driver, 4).await;

    assert_eq!(ride["driver_id"], driver.to_string());
    assert_eq!(ride["status"], "ACTIVE");
    assert_eq!(ride["total_seats"], 4);
    assert_eq!(ride["seats_available"], 4);
    assert_eq!(ride["distance_km"], 350.0);
    assert_eq!(ride["price_per_seat_cents"], 70_000);
    assert_eq!(ride["price_per_seat"], "700.00");
}

#[tokio::test]
async fn create_ride_rejects_bad_input() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;

    let response = harness
        .server
        .post("/v1/rides")
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .json(&ride_body("Chennai", "Bangalore", 8))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "invalid_seat_count");
    assert_eq!(body["error"]["details"]["max"], 7);

    let mut past = ride_body("Chennai", "Bangalore", 2);
    past["departure_at"] = json!((Utc::now() - Duration::hours(1)).to_rfc3339());
    let response = harness
        .server
        .post("/v1/rides")
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .json(&past)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json()), "invalid_schedule");
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn available_and_search_list_open_rides() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;
    let viewer = harness.register("Viewer").await;

    let chennai = harness.create_ride(&driver, 2).await;
    harness.create_ride_on(&driver, "Mumbai", "Pune", 3).await;

    let response = harness
        .server
        .get("/v1/rides/available")
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Value>>().len(), 2);

    let response = harness
        .server
        .get("/v1/rides/search")
        .add_query_param("source", " chennai ")
        .add_query_param("destination", "BANGALORE")
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    response.assert_status_ok();
    let found: Vec<Value> = response.json();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], chennai["id"]);

    let response = harness
        .server
        .get("/v1/rides/search")
        .add_query_param("source", "Chennai")
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn my_rides_lists_only_own() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;
    let other = harness.register("Other").await;

    harness.create_ride(&driver, 2).await;
    harness.create_ride(&other, 2).await;

    let response = harness
        .server
        .get("/v1/rides/mine")
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .await;
    let rides: Vec<Value> = response.json();
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0]["driver_id"], driver.to_string());
}

#[tokio::test]
async fn estimate_splits_trip_cost() {
    let harness = TestHarness::new();
    let viewer = harness.register("Viewer").await;

    let response = harness
        .server
        .get("/v1/rides/estimate")
        .add_query_param("source", "Mumbai")
        .add_query_param("destination", "Pune")
        .add_query_param("seats", 3)
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["distance_km"], 150.0);
    assert_eq!(body["price_per_seat_cents"], 40_000);
    assert_eq!(body["price_per_seat"], "400.00");
    assert_eq!(body["trip_cost_cents"], 120_000);
}

#[tokio::test]
async fn ride_lookup_errors() {
    let harness = TestHarness::new();
    let viewer = harness.register("Viewer").await;

    let response = harness
        .server
        .get("/v1/rides/not-a-ride-id")
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = harness
        .server
        .get("/v1/rides/01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .add_header(TestHarness::auth_name(), harness.auth(&viewer))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Complete
// ============================================================================

#[tokio::test]
async fn driver_completes_ride_and_settles_bookings() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;
    let passenger = harness.register("Passenger").await;

    let ride = harness.create_ride(&driver, 3).await;
    let ride_id = ride["id"].as_str().unwrap();
    let booking = harness.book(&passenger, ride_id, 2).await;

    let response = harness
        .server
        .post(&format!("/v1/rides/{ride_id}/complete"))
        .add_header(TestHarness::auth_name(), harness.auth(&passenger))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response.json()), "not_driver");

    let response = harness
        .server
        .post(&format!("/v1/rides/{ride_id}/complete"))
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ride"]["status"], "COMPLETED");
    assert_eq!(body["ride"]["seats_available"], 1);
    assert_eq!(body["settled_bookings"], json!([booking["id"]]));

    let response = harness
        .server
        .get(&format!("/v1/rides/{ride_id}/bookings"))
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .await;
    let bookings: Vec<Value> = response.json();
    assert_eq!(bookings[0]["status"], "COMPLETED");

    let response = harness
        .server
        .post(&format!("/v1/rides/{ride_id}/complete"))
        .add_header(TestHarness::auth_name(), harness.auth(&driver))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response.json()), "not_active");
}

#[tokio::test]
async fn ride_bookings_are_driver_only() {
    let harness = TestHarness::new();
    let driver = harness.register("Driver").await;
    let passenger = harness.register("Passenger").await;

    let ride = harness.create_ride(&driver, 2).await;
    let ride_id = ride["id"].as_str().unwrap();
    harness.book(&passenger, ride_id, 1).await;

    let response = harness
        .server
        .get(&format!("/v1/rides/{ride_id}/bookings"))
        .add_header(TestHarness::auth_name(), harness.auth(&passenger))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
