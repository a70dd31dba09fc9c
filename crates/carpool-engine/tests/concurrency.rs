//! Concurrent reservation tests.
//!
//! These run on the multi-threaded runtime so reservations really race.

mod common;

use std::time::Duration;

use futures::future::join_all;

use carpool_core::{BookingStatus, LifecycleError};
use carpool_store::{BookingQuery, MemoryStore, Store};
use common::Fixture;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
    let fx = Fixture::new().await;
    let ride = fx.ride(3).await;
    let ride_id = ride.id;

    let mut passengers = Vec::new();
    for i in 0..5 {
        passengers.push(fx.passenger(&format!("Racer {i}")).await);
    }

    let attempts = passengers.into_iter().map(|passenger| {
        let engine = fx.engine.clone();
        tokio::spawn(async move { engine.book_ride(&passenger, ride_id, 1).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .collect();

    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    let rejected: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(confirmed, 3);
    assert_eq!(rejected.len(), 2);
    for err in rejected {
        assert!(
            matches!(err, LifecycleError::InsufficientInventory { available: 0, requested: 1 }),
            "unexpected error: {err:?}"
        );
    }

    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 0);
    assert!(fx
        .reporter
        .inventory_audit(&fx.admin)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_confirm_exactly_once() {
    let fx = Fixture::new().await;
    let passenger = fx.passenger("Eager").await;
    let ride = fx.ride(7).await;
    let ride_id = ride.id;

    let attempts = (0..8).map(|_| {
        let engine = fx.engine.clone();
        tokio::spawn(async move { engine.book_ride(&passenger, ride_id, 1).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task should not panic"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LifecycleError::DuplicateBooking { .. })));

    let confirmed = fx
        .store
        .list_bookings(
            &BookingQuery::for_ride(ride.id)
                .with_passenger(passenger.user_id)
                .with_status(BookingStatus::Confirmed),
        )
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_bookings_and_cancellations_keep_inventory_exact() {
    let fx = Fixture::new().await;
    let ride = fx.ride(7).await;
    let ride_id = ride.id;

    let mut passengers = Vec::new();
    for i in 0..6 {
        passengers.push(fx.passenger(&format!("Churn {i}")).await);
    }

    // Every passenger books one seat and half of them cancel right away.
    let tasks = passengers.into_iter().enumerate().map(|(i, passenger)| {
        let engine = fx.engine.clone();
        tokio::spawn(async move {
            let booking = engine.book_ride(&passenger, ride_id, 1).await?;
            if i % 2 == 0 {
                engine.cancel_booking(&passenger, booking.id).await?;
            }
            Ok::<_, LifecycleError>(())
        })
    });
    for joined in join_all(tasks).await {
        joined.expect("task should not panic").expect("operation should succeed");
    }

    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 4);
    assert!(fx
        .reporter
        .inventory_audit(&fx.admin)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn held_ride_lock_surfaces_busy() {
    let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
    let fx = Fixture::with_store(store).await;
    let passenger = fx.passenger("Patient").await;
    let ride = fx.ride(2).await;

    let held = fx.store.lock_ride(&ride.id).await.unwrap();
    let err = fx.engine.book_ride(&passenger, ride.id, 1).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Busy { .. }));
    assert_eq!(err.kind(), carpool_core::ErrorKind::Retryable);
    drop(held);

    fx.engine.book_ride(&passenger, ride.id, 1).await.unwrap();
    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 1);
}
