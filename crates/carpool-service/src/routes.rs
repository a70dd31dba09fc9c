//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, bookings, health, rides, users};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for admin endpoints.
/// Reports scan whole tables.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Users (bearer token)
/// - `POST /v1/users` - Register the caller's profile
/// - `GET /v1/users/me` - Get the caller's profile
///
/// ## Rides (bearer token)
/// - `POST /v1/rides` - Publish a ride
/// - `GET /v1/rides/available` - Active rides with free seats
/// - `GET /v1/rides/search?source&destination` - Route search
/// - `GET /v1/rides/mine` - The caller's rides
/// - `GET /v1/rides/estimate?source&destination&seats` - Price estimate
/// - `GET /v1/rides/:id` - Ride detail
/// - `GET /v1/rides/:id/bookings` - Bookings on a ride (driver)
/// - `POST /v1/rides/:id/complete` - Complete a ride (driver)
///
/// ## Bookings (bearer token)
/// - `POST /v1/bookings` - Book seats
/// - `GET /v1/bookings/mine` - The caller's bookings
/// - `GET /v1/bookings/passengers` - Bookings on the caller's rides
/// - `GET /v1/bookings/:id` - Booking detail
/// - `POST /v1/bookings/:id/cancel` - Cancel (passenger)
/// - `POST /v1/bookings/:id/complete` - Complete (passenger or driver)
///
/// ## Admin (bearer token, administrator role)
/// - `GET /v1/admin/dashboard`
/// - `GET /v1/admin/users`, `GET /v1/admin/users/stats`
/// - `PUT /v1/admin/users/:id/role`, `DELETE /v1/admin/users/:id`
/// - `GET /v1/admin/rides?status`, `DELETE /v1/admin/rides/:id`
/// - `GET /v1/admin/bookings?status`
/// - `GET /v1/admin/inventory/audit`
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/users/stats", get(admin::user_stats))
        .route("/users/:id/role", put(admin::set_role))
        .route("/users/:id", delete(admin::delete_user))
        .route("/rides", get(admin::list_rides))
        .route("/rides/:id", delete(admin::delete_ride))
        .route("/bookings", get(admin::list_bookings))
        .route("/inventory/audit", get(admin::inventory_audit))
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Users
        .route("/users", post(users::register))
        .route("/users/me", get(users::me))
        // Rides
        .route("/rides", post(rides::create_ride))
        .route("/rides/available", get(rides::available_rides))
        .route("/rides/search", get(rides::search_rides))
        .route("/rides/mine", get(rides::my_rides))
        .route("/rides/estimate", get(rides::estimate))
        .route("/rides/:id", get(rides::get_ride))
        .route("/rides/:id/bookings", get(rides::ride_bookings))
        .route("/rides/:id/complete", post(rides::complete_ride))
        // Bookings
        .route("/bookings", post(bookings::book_ride))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/passengers", get(bookings::passenger_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/complete", post(bookings::complete_booking))
        // Admin (with its own concurrency limit)
        .nest("/admin", admin_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
