//! Rides and the ride state machine.
//!
//! ```text
//! ACTIVE ──complete──▶ COMPLETED
//! ```
//!
//! `IN_PROGRESS` and `CANCELLED` are part of the persisted vocabulary but no
//! operation moves a ride into them. `COMPLETED` and `CANCELLED` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingStatus};
use crate::error::{LifecycleError, Result};
use crate::ids::{BookingId, RideId, UserId};
use crate::pricing::PricingConfig;

/// Fewest seats a ride may offer.
pub const MIN_SEATS: u32 = 1;

/// Most seats a ride may offer.
pub const MAX_SEATS: u32 = 7;

/// Ride status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// Open for booking.
    Active,
    /// Under way.
    InProgress,
    /// Finished.
    Completed,
    /// Called off.
    Cancelled,
}

impl RideStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether `self → next` is an allowed edge.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::InProgress | Self::Completed | Self::Cancelled)
                | (Self::InProgress, Self::Completed | Self::Cancelled)
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RideStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(LifecycleError::Validation(format!(
                "unknown ride status: {other}"
            ))),
        }
    }
}

/// Vehicle details published with a ride.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Make and model.
    pub model: String,
    /// Registration plate.
    pub number: String,
    /// Colour.
    pub color: String,
}

/// Driver input for publishing a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRide {
    /// Departure place.
    pub source: String,
    /// Arrival place.
    pub destination: String,
    /// Scheduled departure.
    pub departure_at: DateTime<Utc>,
    /// Seats offered.
    pub seats: u32,
    /// Vehicle.
    pub car: Car,
}

/// A published ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    /// Ride identifier.
    pub id: RideId,
    /// The driver who published the ride.
    pub driver_id: UserId,
    /// Departure place.
    pub source: String,
    /// Arrival place.
    pub destination: String,
    /// Scheduled departure.
    pub departure_at: DateTime<Utc>,
    pub(crate) total_seats: u32,
    pub(crate) seats_available: u32,
    /// Vehicle.
    pub car: Car,
    /// Estimated route distance.
    pub distance_km: f64,
    /// Price per seat in cents.
    pub price_per_seat_cents: i64,
    pub(crate) status: RideStatus,
    /// Reference returned by the external ledger, once recorded.
    pub ledger_ref: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Ride {
    /// Publish a new ride.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::InvalidSchedule` unless the departure is after `now`.
    /// - `LifecycleError::InvalidSeatCount` unless `1 ≤ seats ≤ 7`.
    /// - `LifecycleError::Validation` for blank places or car fields.
    pub fn offer(
        driver_id: UserId,
        input: NewRide,
        pricing: &PricingConfig,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if input.departure_at <= now {
            return Err(LifecycleError::InvalidSchedule {
                departure_at: input.departure_at,
            });
        }
        if !(MIN_SEATS..=MAX_SEATS).contains(&input.seats) {
            return Err(LifecycleError::InvalidSeatCount {
                seats: input.seats,
                min: MIN_SEATS,
                max: MAX_SEATS,
            });
        }

        let source = required(&input.source, "source")?;
        let destination = required(&input.destination, "destination")?;
        let car = Car {
            model: required(&input.car.model, "car model")?,
            number: required(&input.car.number, "car number")?,
            color: required(&input.car.color, "car color")?,
        };

        let estimate = pricing.estimate(&source, &destination, input.seats)?;

        Ok(Self {
            id: RideId::generate(),
            driver_id,
            source,
            destination,
            departure_at: input.departure_at,
            total_seats: input.seats,
            seats_available: input.seats,
            car,
            distance_km: estimate.distance_km,
            price_per_seat_cents: estimate.price_per_seat_cents,
            status: RideStatus::Active,
            ledger_ref: None,
            created_at: now,
        })
    }

    /// Seats offered at creation.
    #[must_use]
    pub const fn total_seats(&self) -> u32 {
        self.total_seats
    }

    /// Seats not yet reserved.
    #[must_use]
    pub const fn seats_available(&self) -> u32 {
        self.seats_available
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RideStatus {
        self.status
    }

    /// Active with at least one free seat.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, RideStatus::Active) && self.seats_available > 0
    }

    /// Complete the ride and settle its confirmed bookings.
    ///
    /// `bookings` must hold every booking of this ride; confirmed ones move to
    /// `COMPLETED` without returning seats. Returns the settled booking ids.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotDriver` unless `requester` drives this ride.
    /// - `LifecycleError::NotActive` unless the ride is `ACTIVE`.
    pub fn complete(
        &mut self,
        requester: UserId,
        bookings: &mut [Booking],
    ) -> Result<Vec<BookingId>> {
        if requester != self.driver_id {
            return Err(LifecycleError::NotDriver);
        }
        if self.status != RideStatus::Active {
            return Err(LifecycleError::NotActive {
                ride_id: self.id,
                status: self.status,
            });
        }

        self.status = RideStatus::Completed;

        let ride_id = self.id;
        let settled = bookings
            .iter_mut()
            .filter(|b| b.ride_id == ride_id && b.status() == BookingStatus::Confirmed)
            .map(|b| {
                b.settle();
                b.id
            })
            .collect();

        Ok(settled)
    }

    /// Check that the ride may be deleted.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::ActiveBookingsExist` if any booking of the
    /// ride is still confirmed.
    pub fn ensure_deletable(&self, bookings: &[Booking]) -> Result<()> {
        let count = bookings
            .iter()
            .filter(|b| b.ride_id == self.id && b.status() == BookingStatus::Confirmed)
            .count();

        if count > 0 {
            return Err(LifecycleError::ActiveBookingsExist {
                ride_id: self.id,
                count,
            });
        }
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
