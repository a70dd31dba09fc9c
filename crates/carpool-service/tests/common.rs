//! Common test utilities for carpool service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::Router;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use carpool_core::UserId;
use carpool_engine::LifecycleEngine;
use carpool_service::{create_router, AppState, Claims, ServiceConfig};
use carpool_store::MemoryStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The engine behind the server, for flushing ledger tasks.
    pub engine: LifecycleEngine,
    /// Configuration the server was built with.
    pub config: ServiceConfig,
    /// A configured administrator (not registered until `register_admin`).
    pub admin_id: UserId,
}

impl TestHarness {
    /// Create a new test harness over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness whose ledger client points at `url`.
    pub fn with_ledger(url: &str) -> Self {
        let url = url.to_string();
        Self::with_config(move |config| {
            config.ledger_api_url = Some(url);
            config.ledger_api_key = Some("ledger-test-key".into());
            config.ledger_timeout_seconds = 2;
        })
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let admin_id = UserId::generate();

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_secret: Some("test-signing-secret".into()),
            admin_user_ids: vec![admin_id],
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(Arc::new(MemoryStore::new()), config.clone())
            .expect("Failed to build app state");
        let engine = state.engine.clone();
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            engine,
            config,
            admin_id,
        }
    }

    /// Mint a bearer token for `user_id`.
    pub fn token(&self, user_id: &UserId) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.config.auth_issuer.clone(),
            aud: self.config.auth_audience.clone(),
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(
                self.config
                    .auth_secret()
                    .expect("Test config has a secret")
                    .as_bytes(),
            ),
        )
        .expect("Failed to sign token")
    }

    /// Authorization header name.
    pub fn auth_name() -> HeaderName {
        AUTHORIZATION
    }

    /// Authorization header value for `user_id`.
    pub fn auth(&self, user_id: &UserId) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", self.token(user_id)))
            .expect("token is a valid header value")
    }

    /// Register a fresh ordinary user and return their id.
    pub async fn register(&self, name: &str) -> UserId {
        let user_id = UserId::generate();
        self.register_as(&user_id, name).await;
        user_id
    }

    /// Register the configured administrator.
    pub async fn register_admin(&self) -> UserId {
        let admin_id = self.admin_id;
        self.register_as(&admin_id, "Admin").await;
        admin_id
    }

    async fn register_as(&self, user_id: &UserId, name: &str) {
        let response = self
            .server
            .post("/v1/users")
            .add_header(Self::auth_name(), self.auth(user_id))
            .json(&json!({
                "name": name,
                "email": format!("{}@example.com", user_id.as_uuid().simple()),
                "phone": "9876543210"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    /// Publish a Chennai → Bangalore ride departing tomorrow.
    pub async fn create_ride(&self, driver: &UserId, seats: u32) -> Value {
        self.create_ride_on(driver, "Chennai", "Bangalore", seats).await
    }

    /// Publish a ride on a route departing tomorrow.
    pub async fn create_ride_on(
        &self,
        driver: &UserId,
        source: &str,
        destination: &str,
        seats: u32,
    ) -> Value {
        let response = self
            .server
            .post("/v1/rides")
            .add_header(Self::auth_name(), self.auth(driver))
            .json(&ride_body(source, destination, seats))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Book seats and return the booking body.
    pub async fn book(&self, passenger: &UserId, ride_id: &str, seats: u32) -> Value {
        let response = self
            .server
            .post("/v1/bookings")
            .add_header(Self::auth_name(), self.auth(passenger))
            .json(&json!({ "ride_id": ride_id, "seats": seats }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Fetch a ride.
    pub async fn ride(&self, viewer: &UserId, ride_id: &str) -> Value {
        let response = self
            .server
            .get(&format!("/v1/rides/{ride_id}"))
            .add_header(Self::auth_name(), self.auth(viewer))
            .await;
        response.assert_status_ok();
        response.json::<Value>()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON body for a ride departing tomorrow.
pub fn ride_body(source: &str, destination: &str, seats: u32) -> Value {
    json!({
        "source": source,
        "destination": destination,
        "departure_at": (Utc::now() + Duration::days(1)).to_rfc3339(),
        "seats": seats,
        "car": {
            "model": "Swift Dzire",
            "number": "TN 09 AB 1234",
            "color": "White"
        }
    })
}

/// Error code of an error response body.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
