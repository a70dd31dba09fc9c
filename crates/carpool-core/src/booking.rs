//! Bookings and the booking state machine.
//!
//! ```text
//! CONFIRMED ──cancel───▶ CANCELLED
//! CONFIRMED ──complete─▶ COMPLETED
//! ```
//!
//! Bookings are only ever created `CONFIRMED`. Every transition that touches
//! inventory takes the owning ride by `&mut`, so the booking change and the
//! seat change are staged together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, Result};
use crate::ids::{BookingId, RideId, UserId};
use crate::inventory;
use crate::ride::{Ride, RideStatus};

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Seats are held.
    Confirmed,
    /// The trip took place.
    Completed,
    /// The passenger withdrew.
    Cancelled,
}

impl BookingStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONFIRMED" => Ok(Self::Confirmed),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(LifecycleError::Validation(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// A passenger's seat reservation on a ride.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier.
    pub id: BookingId,
    /// The reserved ride.
    pub ride_id: RideId,
    /// The passenger.
    pub passenger_id: UserId,
    pub(crate) seats_booked: u32,
    /// `price_per_seat × seats_booked`, in cents.
    pub total_amount_cents: i64,
    pub(crate) status: BookingStatus,
    /// Reference returned by the external ledger, once recorded.
    pub ledger_ref: Option<String>,
    /// Creation time.
    pub booked_at: DateTime<Utc>,
}

impl Booking {
    /// Reserve seats on a ride.
    ///
    /// `existing` must contain the ride's current bookings. Checks run in a
    /// fixed order and the first failure wins; on success `ride` has already
    /// been debited and the returned booking is `CONFIRMED`.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::RideNotBookable` if the ride is not `ACTIVE`.
    /// - `LifecycleError::SelfBookingForbidden` if the passenger drives the ride.
    /// - `LifecycleError::DuplicateBooking` if the passenger already holds a
    ///   confirmed booking on the ride.
    /// - `LifecycleError::InvalidSeatCount` if `seats` is zero.
    /// - `LifecycleError::InsufficientInventory` if too few seats are free.
    pub fn reserve(
        ride: &mut Ride,
        existing: &[Booking],
        passenger_id: UserId,
        seats: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if ride.status() != RideStatus::Active {
            return Err(LifecycleError::RideNotBookable {
                ride_id: ride.id,
                status: ride.status(),
            });
        }
        if ride.driver_id == passenger_id {
            return Err(LifecycleError::SelfBookingForbidden);
        }
        if existing.iter().any(|b| {
            b.ride_id == ride.id
                && b.passenger_id == passenger_id
                && b.status == BookingStatus::Confirmed
        }) {
            return Err(LifecycleError::DuplicateBooking {
                ride_id: ride.id,
                passenger_id,
            });
        }
        if seats == 0 {
            return Err(LifecycleError::InvalidSeatCount {
                seats,
                min: 1,
                max: ride.total_seats,
            });
        }

        inventory::reserve(ride, seats)?;

        Ok(Self {
            id: BookingId::generate(),
            ride_id: ride.id,
            passenger_id,
            seats_booked: seats,
            total_amount_cents: ride.price_per_seat_cents * i64::from(seats),
            status: BookingStatus::Confirmed,
            ledger_ref: None,
            booked_at: now,
        })
    }

    /// Number of seats held.
    #[must_use]
    pub const fn seats_booked(&self) -> u32 {
        self.seats_booked
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        self.status
    }

    /// Cancel the booking and return its seats to the ride.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotOwner` unless `requester` is the passenger.
    /// - `LifecycleError::AlreadyTerminal` if the booking is already
    ///   cancelled or completed.
    /// - `LifecycleError::InventoryOverflow` if the ride's inventory is
    ///   inconsistent; the booking is left unchanged.
    pub fn cancel(&mut self, ride: &mut Ride, requester: UserId) -> Result<()> {
        self.ensure_belongs_to(ride)?;
        if requester != self.passenger_id {
            return Err(LifecycleError::NotOwner);
        }
        if self.status.is_terminal() {
            return Err(LifecycleError::AlreadyTerminal {
                booking_id: self.id,
                status: self.status,
            });
        }

        inventory::release(ride, self.seats_booked)?;
        self.status = BookingStatus::Cancelled;
        Ok(())
    }

    /// Mark the booking completed. Seats are not returned.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotParticipant` unless `requester` is the passenger
    ///   or the ride's driver.
    /// - `LifecycleError::NotConfirmed` unless the booking is `CONFIRMED`.
    pub fn complete(&mut self, ride: &Ride, requester: UserId) -> Result<()> {
        self.ensure_belongs_to(ride)?;
        if requester != self.passenger_id && requester != ride.driver_id {
            return Err(LifecycleError::NotParticipant);
        }
        if self.status != BookingStatus::Confirmed {
            return Err(LifecycleError::NotConfirmed {
                booking_id: self.id,
                status: self.status,
            });
        }

        self.status = BookingStatus::Completed;
        Ok(())
    }

    /// Completion cascaded from the ride.
    pub(crate) fn settle(&mut self) {
        debug_assert_eq!(self.status, BookingStatus::Confirmed);
        self.status = BookingStatus::Completed;
    }

    fn ensure_belongs_to(&self, ride: &Ride) -> Result<()> {
        if self.ride_id == ride.id {
            Ok(())
        } else {
            Err(LifecycleError::Validation(format!(
                "booking {} does not belong to ride {}",
                self.id, ride.id
            )))
        }
    }
}
