//! External ledger dispatch tests.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use carpool_engine::{LedgerError, LedgerEventKind, LedgerRecorder, LedgerReference};
use common::Fixture;

/// Records every call and answers with sequential references.
#[derive(Default)]
struct RecordingLedger {
    calls: Mutex<Vec<(LedgerEventKind, serde_json::Value)>>,
    next: AtomicUsize,
}

impl RecordingLedger {
    fn kinds(&self) -> Vec<LedgerEventKind> {
        self.calls.lock().iter().map(|(kind, _)| *kind).collect()
    }
}

#[async_trait]
impl LedgerRecorder for RecordingLedger {
    async fn record(
        &self,
        kind: LedgerEventKind,
        payload: &serde_json::Value,
    ) -> Result<LedgerReference, LedgerError> {
        self.calls.lock().push((kind, payload.clone()));
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LedgerReference::new(format!("ref-{n}")))
    }
}

/// Always unreachable.
struct DownLedger;

#[async_trait]
impl LedgerRecorder for DownLedger {
    async fn record(
        &self,
        _kind: LedgerEventKind,
        _payload: &serde_json::Value,
    ) -> Result<LedgerReference, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn references_are_stored_on_created_records() {
    let ledger = Arc::new(RecordingLedger::default());
    let fx = Fixture::with_ledger(ledger.clone()).await;
    let passenger = fx.passenger("Traced").await;

    let ride = fx.ride(3).await;
    fx.engine.ledger().flush().await;
    assert_eq!(fx.stored_ride(&ride).await.ledger_ref.as_deref(), Some("ref-1"));

    let booking = fx.engine.book_ride(&passenger, ride.id, 2).await.unwrap();
    fx.engine.ledger().flush().await;
    let stored = fx.engine.booking(&passenger, &booking.id).await.unwrap();
    assert_eq!(stored.ledger_ref.as_deref(), Some("ref-2"));

    // The annotation must not disturb inventory.
    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 1);

    fx.engine.cancel_booking(&passenger, booking.id).await.unwrap();
    fx.engine.ledger().flush().await;

    assert_eq!(
        ledger.kinds(),
        vec![
            LedgerEventKind::RideCreated,
            LedgerEventKind::BookingConfirmed,
            LedgerEventKind::BookingCancelled,
        ]
    );

    // Cancellation is recorded but keeps the confirmation reference.
    let stored = fx.engine.booking(&passenger, &booking.id).await.unwrap();
    assert_eq!(stored.ledger_ref.as_deref(), Some("ref-2"));
    assert_eq!(fx.stored_ride(&ride).await.seats_available(), 3);
}

#[tokio::test]
async fn booking_payload_describes_the_reservation() {
    let ledger = Arc::new(RecordingLedger::default());
    let fx = Fixture::with_ledger(ledger.clone()).await;
    let passenger = fx.passenger("Payload").await;
    let ride = fx.ride(4).await;

    let booking = fx.engine.book_ride(&passenger, ride.id, 2).await.unwrap();
    fx.engine.ledger().flush().await;

    let calls = ledger.calls.lock();
    let (kind, payload) = &calls[1];
    assert_eq!(*kind, LedgerEventKind::BookingConfirmed);
    assert_eq!(payload["booking_id"], booking.id.to_string());
    assert_eq!(payload["seats_booked"], 2);
    assert_eq!(payload["total_amount_cents"], 140_000);
}

#[tokio::test]
async fn cancellation_payload_carries_reason_and_penalty() {
    let ledger = Arc::new(RecordingLedger::default());
    let fx = Fixture::with_ledger(ledger.clone()).await;
    let passenger = fx.passenger("Changed plans").await;
    let ride = fx.ride(3).await;

    let booking = fx.engine.book_ride(&passenger, ride.id, 2).await.unwrap();
    fx.engine.cancel_booking(&passenger, booking.id).await.unwrap();
    fx.engine.ledger().flush().await;

    let calls = ledger.calls.lock();
    let (kind, payload) = calls
        .iter()
        .find(|(kind, _)| *kind == LedgerEventKind::BookingCancelled)
        .unwrap();
    assert_eq!(*kind, LedgerEventKind::BookingCancelled);
    assert_eq!(payload["booking_id"], booking.id.to_string());
    assert_eq!(payload["seats_released"], 2);
    assert_eq!(payload["reason"], "passenger cancelled booking");
    assert_eq!(payload["penalty_cents"], 0);
}

#[tokio::test]
async fn ledger_failure_never_affects_results() {
    let fx = Fixture::with_ledger(Arc::new(DownLedger)).await;
    let passenger = fx.passenger("Unlucky").await;

    let ride = fx.ride(2).await;
    let booking = fx.engine.book_ride(&passenger, ride.id, 1).await.unwrap();
    fx.engine.cancel_booking(&passenger, booking.id).await.unwrap();
    fx.engine.ledger().flush().await;

    let stored = fx.stored_ride(&ride).await;
    assert_eq!(stored.ledger_ref, None);
    assert_eq!(stored.seats_available(), 2);
    let booking = fx.engine.booking(&passenger, &booking.id).await.unwrap();
    assert_eq!(booking.ledger_ref, None);
}

#[tokio::test]
async fn engine_without_ledger_dispatches_nothing() {
    let fx = Fixture::new().await;
    assert!(!fx.engine.ledger().is_enabled());

    let ride = fx.ride(2).await;
    fx.engine.ledger().flush().await;
    assert_eq!(fx.stored_ride(&ride).await.ledger_ref, None);
}
