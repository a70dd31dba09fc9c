//! Seat inventory of a ride.
//!
//! `reserve` and `release` are the only code paths that change
//! `Ride::seats_available`. They operate on an in-memory ride that the caller
//! loaded under the ride's lock, so the check and the decrement land in the
//! same unit of work.

use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingStatus};
use crate::error::{LifecycleError, Result};
use crate::ids::RideId;
use crate::ride::Ride;

/// Take `count` seats from the ride.
///
/// # Errors
///
/// Returns `LifecycleError::InsufficientInventory` if fewer than `count`
/// seats are free. The ride is untouched on error.
pub(crate) fn reserve(ride: &mut Ride, count: u32) -> Result<()> {
    if count > ride.seats_available {
        return Err(LifecycleError::InsufficientInventory {
            available: ride.seats_available,
            requested: count,
        });
    }
    ride.seats_available -= count;
    Ok(())
}

/// Return `count` seats to the ride.
///
/// # Errors
///
/// Returns `LifecycleError::InventoryOverflow` if the result would exceed
/// the ride's capacity. That means the stored state is already inconsistent.
pub(crate) fn release(ride: &mut Ride, count: u32) -> Result<()> {
    let attempted = ride.seats_available.saturating_add(count);
    if attempted > ride.total_seats {
        tracing::error!(
            ride_id = %ride.id,
            total_seats = ride.total_seats,
            seats_available = ride.seats_available,
            released = count,
            "seat release would exceed ride capacity"
        );
        return Err(LifecycleError::InventoryOverflow {
            ride_id: ride.id,
            total: ride.total_seats,
            attempted,
        });
    }
    ride.seats_available = attempted;
    Ok(())
}

/// Comparison of a ride's stored inventory against its confirmed bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAudit {
    /// The audited ride.
    pub ride_id: RideId,
    /// Capacity.
    pub total_seats: u32,
    /// Stored free seats.
    pub seats_available: u32,
    /// Seats held by confirmed bookings.
    pub confirmed_seats: u64,
    /// Free seats implied by the confirmed bookings.
    pub expected_available: i64,
}

impl InventoryAudit {
    /// Whether stored and implied inventory agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        i64::from(self.seats_available) == self.expected_available
    }
}

/// Audit a ride against its bookings.
///
/// Bookings belonging to other rides are ignored.
#[must_use]
pub fn audit(ride: &Ride, bookings: &[Booking]) -> InventoryAudit {
    let confirmed_seats: u64 = bookings
        .iter()
        .filter(|b| b.ride_id == ride.id && b.status() == BookingStatus::Confirmed)
        .map(|b| u64::from(b.seats_booked))
        .sum();

    let expected_available =
        i64::from(ride.total_seats) - i64::try_from(confirmed_seats).unwrap_or(i64::MAX);

    InventoryAudit {
        ride_id: ride.id,
        total_seats: ride.total_seats,
        seats_available: ride.seats_available,
        confirmed_seats,
        expected_available,
    }
}
