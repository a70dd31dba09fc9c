//! Reporting tests.

mod common;

use carpool_core::{BookingStatus, LifecycleError, RideStatus, Role};
use common::{new_ride, Fixture};

#[tokio::test]
async fn reports_require_admin() {
    let fx = Fixture::new().await;

    let err = fx.reporter.dashboard(&fx.driver).await.unwrap_err();
    assert_eq!(err, LifecycleError::AdminRequired);
    let err = fx.reporter.inventory_audit(&fx.driver).await.unwrap_err();
    assert_eq!(err, LifecycleError::AdminRequired);
}

#[tokio::test]
async fn dashboard_counts_and_revenue() {
    let fx = Fixture::new().await;
    let a = fx.passenger("Anu").await;
    let b = fx.passenger("Bala").await;
    let c = fx.passenger("Chitra").await;

    let first = fx.ride(4).await;
    let second = fx
        .engine
        .create_ride(&fx.driver, new_ride("Mumbai", "Pune", 3))
        .await
        .unwrap();

    let completed = fx.engine.book_ride(&a, first.id, 2).await.unwrap();
    let cancelled = fx.engine.book_ride(&b, first.id, 1).await.unwrap();
    fx.engine.book_ride(&c, second.id, 1).await.unwrap();

    fx.engine.complete_booking(&a, completed.id).await.unwrap();
    fx.engine.cancel_booking(&b, cancelled.id).await.unwrap();

    let stats = fx.reporter.dashboard(&fx.admin).await.unwrap();
    assert_eq!(stats.total_users, 5);
    assert_eq!(stats.total_rides, 2);
    assert_eq!(stats.active_rides, 2);
    assert_eq!(stats.total_bookings, 3);
    assert_eq!(stats.confirmed_bookings, 1);
    assert_eq!(stats.completed_bookings, 1);
    assert_eq!(stats.cancelled_bookings, 1);
    assert_eq!(stats.total_revenue_cents, 140_000);
}

#[tokio::test]
async fn user_stats_count_rides_and_bookings() {
    let fx = Fixture::new().await;
    let rider = fx.passenger("Rider").await;
    let ride = fx.ride(2).await;
    fx.engine.book_ride(&rider, ride.id, 1).await.unwrap();

    let stats = fx.reporter.user_stats(&fx.admin).await.unwrap();
    assert_eq!(stats.len(), 3);

    let driver = stats
        .iter()
        .find(|s| s.user_id == fx.driver.user_id)
        .unwrap();
    assert_eq!((driver.rides_created, driver.bookings_made), (1, 0));

    let rider = stats.iter().find(|s| s.user_id == rider.user_id).unwrap();
    assert_eq!((rider.rides_created, rider.bookings_made), (0, 1));

    let admin = stats.iter().find(|s| s.user_id == fx.admin.user_id).unwrap();
    assert_eq!(admin.role, Role::Admin);
}

#[tokio::test]
async fn status_filters() {
    let fx = Fixture::new().await;
    let passenger = fx.passenger("Filter").await;
    let done = fx.ride(2).await;
    let _open = fx.ride(2).await;

    let booking = fx.engine.book_ride(&passenger, done.id, 1).await.unwrap();
    fx.engine.complete_ride(&fx.driver, done.id).await.unwrap();

    let completed = fx
        .reporter
        .rides(&fx.admin, Some(RideStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, done.id);
    assert_eq!(fx.reporter.rides(&fx.admin, None).await.unwrap().len(), 2);

    let settled = fx
        .reporter
        .bookings(&fx.admin, Some(BookingStatus::Completed))
        .await
        .unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].id, booking.id);
    assert!(fx
        .reporter
        .bookings(&fx.admin, Some(BookingStatus::Confirmed))
        .await
        .unwrap()
        .is_empty());

    assert_eq!(fx.reporter.users(&fx.admin).await.unwrap().len(), 3);
}

#[tokio::test]
async fn inventory_audit_flags_drift() {
    let fx = Fixture::new().await;
    let passenger = fx.passenger("Drift").await;
    let ride = fx.ride(4).await;
    let snapshot = fx.stored_ride(&ride).await;

    fx.engine.book_ride(&passenger, ride.id, 2).await.unwrap();
    assert!(fx
        .reporter
        .inventory_audit(&fx.admin)
        .await
        .unwrap()
        .is_empty());

    // Roll the ride back to its pre-booking copy behind the engine's back.
    fx.store.force_put_ride(snapshot);

    let drift = fx.reporter.inventory_audit(&fx.admin).await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].ride_id, ride.id);
    assert_eq!(drift[0].seats_available, 4);
    assert_eq!(drift[0].expected_available, 2);
}
