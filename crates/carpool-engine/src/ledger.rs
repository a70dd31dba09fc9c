//! External ledger dispatch.
//!
//! Lifecycle events are recorded on an append-only ledger outside the
//! primary store. Recording is best-effort: the engine commits first, then
//! hands the event to [`LedgerDispatcher::dispatch`], which calls the
//! recorder on a spawned task. A failed call is logged at `warn` and
//! dropped. A successful call for a creation event stores the returned
//! reference on the ride or booking.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use carpool_core::{Booking, Ride};
use carpool_store::{LedgerTarget, Store};

// ============================================================================
// Events
// ============================================================================

/// Kind of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// A ride was published.
    RideCreated,
    /// A booking was confirmed.
    BookingConfirmed,
    /// A booking was cancelled.
    BookingCancelled,
}

impl LedgerEventKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RideCreated => "ride_created",
            Self::BookingConfirmed => "booking_confirmed",
            Self::BookingCancelled => "booking_cancelled",
        }
    }
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference returned by the ledger for a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerReference(String);

impl LedgerReference {
    /// Wrap a reference string.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event to record, with the record that should keep its reference.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    /// What happened.
    pub kind: LedgerEventKind,
    /// Event details sent to the ledger.
    pub payload: serde_json::Value,
    /// Where to store the returned reference, if anywhere.
    pub target: Option<LedgerTarget>,
}

impl LedgerEvent {
    /// A ride was published; the reference is stored on the ride.
    #[must_use]
    pub fn ride_created(ride: &Ride) -> Self {
        Self {
            kind: LedgerEventKind::RideCreated,
            payload: serde_json::json!({
                "ride_id": ride.id.to_string(),
                "driver_id": ride.driver_id.to_string(),
                "source": ride.source,
                "destination": ride.destination,
                "departure_at": ride.departure_at.to_rfc3339(),
                "total_seats": ride.total_seats(),
                "price_per_seat_cents": ride.price_per_seat_cents,
            }),
            target: Some(LedgerTarget::Ride(ride.id)),
        }
    }

    /// A booking was confirmed; the reference is stored on the booking.
    #[must_use]
    pub fn booking_confirmed(booking: &Booking) -> Self {
        Self {
            kind: LedgerEventKind::BookingConfirmed,
            payload: serde_json::json!({
                "booking_id": booking.id.to_string(),
                "ride_id": booking.ride_id.to_string(),
                "passenger_id": booking.passenger_id.to_string(),
                "seats_booked": booking.seats_booked(),
                "total_amount_cents": booking.total_amount_cents,
            }),
            target: Some(LedgerTarget::Booking {
                ride_id: booking.ride_id,
                booking_id: booking.id,
            }),
        }
    }

    /// A booking was cancelled by its passenger. Recorded only.
    ///
    /// Cancellations carry no penalty.
    #[must_use]
    pub fn booking_cancelled(booking: &Booking) -> Self {
        Self {
            kind: LedgerEventKind::BookingCancelled,
            payload: serde_json::json!({
                "booking_id": booking.id.to_string(),
                "ride_id": booking.ride_id.to_string(),
                "passenger_id": booking.passenger_id.to_string(),
                "seats_released": booking.seats_booked(),
                "reason": CANCELLATION_REASON,
                "penalty_cents": 0,
            }),
            target: None,
        }
    }
}

/// Reason recorded for passenger cancellations.
pub const CANCELLATION_REASON: &str = "passenger cancelled booking";

// ============================================================================
// Recorder
// ============================================================================

/// Errors reported by a ledger recorder.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the record.
    #[error("ledger rejected record: {0}")]
    Rejected(String),
}

/// Append-only external ledger.
#[async_trait]
pub trait LedgerRecorder: Send + Sync {
    /// Record an event and return its reference.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if the record could not be stored.
    async fn record(
        &self,
        kind: LedgerEventKind,
        payload: &serde_json::Value,
    ) -> Result<LedgerReference, LedgerError>;
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fire-and-forget dispatch of ledger events.
#[derive(Clone)]
pub struct LedgerDispatcher {
    recorder: Option<Arc<dyn LedgerRecorder>>,
    store: Arc<dyn Store>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl fmt::Debug for LedgerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerDispatcher")
            .field("enabled", &self.is_enabled())
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl LedgerDispatcher {
    /// Create a dispatcher. With no recorder every event is dropped.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, recorder: Option<Arc<dyn LedgerRecorder>>) -> Self {
        Self {
            recorder,
            store,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Whether a recorder is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.recorder.is_some()
    }

    /// Record `event` on a spawned task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: LedgerEvent) {
        let Some(recorder) = self.recorder.clone() else {
            tracing::trace!(kind = %event.kind, "ledger disabled, event dropped");
            return;
        };

        let handle = tokio::spawn(record(recorder, Arc::clone(&self.store), event));

        let mut pending = self.pending.lock();
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
    }

    /// Wait for every dispatched event to finish.
    pub async fn flush(&self) {
        let tasks = std::mem::take(&mut *self.pending.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "ledger task aborted");
            }
        }
    }
}

async fn record(recorder: Arc<dyn LedgerRecorder>, store: Arc<dyn Store>, event: LedgerEvent) {
    let LedgerEvent {
        kind,
        payload,
        target,
    } = event;

    let reference = match recorder.record(kind, &payload).await {
        Ok(reference) => reference,
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "external ledger call failed");
            return;
        }
    };

    tracing::debug!(kind = %kind, reference = %reference, "event recorded on external ledger");

    let Some(target) = target else {
        return;
    };

    if let Err(e) = store.annotate(target, reference.as_str()).await {
        tracing::warn!(
            kind = %kind,
            ride_id = %target.ride_id(),
            error = %e,
            "failed to store ledger reference"
        );
    }
}
