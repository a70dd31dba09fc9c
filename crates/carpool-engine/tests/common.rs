//! Common fixtures for engine integration tests.

#![allow(dead_code)] // Each test file uses a different subset

use std::sync::Arc;

use chrono::{Duration, Utc};

use carpool_core::{Caller, Car, NewRide, PricingConfig, Ride, Role, UserId, UserProfile};
use carpool_engine::{LedgerRecorder, LifecycleEngine, Reporter};
use carpool_store::{MemoryStore, Store};

/// An engine over a fresh in-memory store with a registered driver and admin.
pub struct Fixture {
    /// Direct handle on the store, shared with the engine.
    pub store: MemoryStore,
    /// The engine under test.
    pub engine: LifecycleEngine,
    /// Reporting over the same store.
    pub reporter: Reporter,
    /// A registered ordinary user who publishes rides.
    pub driver: Caller,
    /// A registered administrator.
    pub admin: Caller,
}

impl Fixture {
    /// Fixture without an external ledger.
    pub async fn new() -> Self {
        Self::build(MemoryStore::new(), None).await
    }

    /// Fixture over a specific store.
    pub async fn with_store(store: MemoryStore) -> Self {
        Self::build(store, None).await
    }

    /// Fixture with an external ledger recorder.
    pub async fn with_ledger(recorder: Arc<dyn LedgerRecorder>) -> Self {
        Self::build(MemoryStore::new(), Some(recorder)).await
    }

    async fn build(store: MemoryStore, recorder: Option<Arc<dyn LedgerRecorder>>) -> Self {
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let mut engine = LifecycleEngine::new(Arc::clone(&shared), PricingConfig::default());
        if let Some(recorder) = recorder {
            engine = engine.with_ledger(recorder);
        }
        let reporter = Reporter::new(shared);

        let driver = register(&engine, "Driver", Role::Ordinary).await;
        let admin = register(&engine, "Admin", Role::Admin).await;

        Self {
            store,
            engine,
            reporter,
            driver,
            admin,
        }
    }

    /// Register a new ordinary user.
    pub async fn passenger(&self, name: &str) -> Caller {
        register(&self.engine, name, Role::Ordinary).await
    }

    /// Publish a Chennai to Bangalore ride for tomorrow as the fixture driver.
    pub async fn ride(&self, seats: u32) -> Ride {
        self.engine
            .create_ride(&self.driver, new_ride("Chennai", "Bangalore", seats))
            .await
            .expect("ride should be created")
    }

    /// The stored copy of a ride.
    pub async fn stored_ride(&self, ride: &Ride) -> Ride {
        self.engine.ride(&ride.id).await.expect("ride should exist")
    }
}

/// Register a user and return their caller capability.
pub async fn register(engine: &LifecycleEngine, name: &str, role: Role) -> Caller {
    let user_id = UserId::generate();
    let user = engine
        .register_user(user_id, profile(name), role)
        .await
        .expect("registration should succeed");
    user.as_caller()
}

/// A valid profile for `name`.
pub fn profile(name: &str) -> UserProfile {
    UserProfile {
        name: name.to_string(),
        email: format!("{}.{}@example.com", name.to_lowercase().replace(' ', "."), UserId::generate()),
        phone: "9876543210".to_string(),
    }
}

/// Ride input departing tomorrow.
pub fn new_ride(source: &str, destination: &str, seats: u32) -> NewRide {
    NewRide {
        source: source.to_string(),
        destination: destination.to_string(),
        departure_at: Utc::now() + Duration::days(1),
        seats,
        car: Car {
            model: "Swift Dzire".to_string(),
            number: "TN09AB1234".to_string(),
            color: "White".to_string(),
        },
    }
}
