//! Filters for listing rides and bookings.
//!
//! Every backend accepts the same filter values and applies `matches` as the
//! final word, so results agree across backends even where a backend narrows
//! the scan with an index first.

use carpool_core::{Booking, BookingStatus, Ride, RideId, RideStatus, UserId};

/// Filter for [`Store::list_rides`](crate::Store::list_rides).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RideQuery {
    /// Only rides with this status.
    pub status: Option<RideStatus>,
    /// Only rides published by this driver.
    pub driver_id: Option<UserId>,
    /// Only rides with this source (trimmed, case-insensitive).
    pub source: Option<String>,
    /// Only rides with this destination (trimmed, case-insensitive).
    pub destination: Option<String>,
    /// Only rides that still have free seats.
    pub with_free_seats: bool,
}

impl RideQuery {
    /// Match every ride.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Active rides with at least one free seat.
    #[must_use]
    pub fn open() -> Self {
        Self {
            status: Some(RideStatus::Active),
            with_free_seats: true,
            ..Self::default()
        }
    }

    /// Restrict to a status.
    #[must_use]
    pub fn with_status(mut self, status: RideStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to a driver.
    #[must_use]
    pub fn with_driver(mut self, driver_id: UserId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    /// Restrict to a source/destination pair.
    #[must_use]
    pub fn with_route(mut self, source: &str, destination: &str) -> Self {
        self.source = Some(normalize(source));
        self.destination = Some(normalize(destination));
        self
    }

    /// Whether `ride` passes the filter.
    #[must_use]
    pub fn matches(&self, ride: &Ride) -> bool {
        self.status.map_or(true, |s| ride.status() == s)
            && self.driver_id.map_or(true, |d| ride.driver_id == d)
            && self
                .source
                .as_deref()
                .map_or(true, |s| normalize(&ride.source) == s)
            && self
                .destination
                .as_deref()
                .map_or(true, |d| normalize(&ride.destination) == d)
            && (!self.with_free_seats || ride.seats_available() > 0)
    }
}

/// Filter for [`Store::list_bookings`](crate::Store::list_bookings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingQuery {
    /// Only bookings on these rides.
    pub ride_ids: Option<Vec<RideId>>,
    /// Only bookings by this passenger.
    pub passenger_id: Option<UserId>,
    /// Only bookings with this status.
    pub status: Option<BookingStatus>,
}

impl BookingQuery {
    /// Match every booking.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one ride.
    #[must_use]
    pub fn for_ride(ride_id: RideId) -> Self {
        Self {
            ride_ids: Some(vec![ride_id]),
            ..Self::default()
        }
    }

    /// Restrict to several rides.
    #[must_use]
    pub fn for_rides(ride_ids: Vec<RideId>) -> Self {
        Self {
            ride_ids: Some(ride_ids),
            ..Self::default()
        }
    }

    /// Restrict to a passenger.
    #[must_use]
    pub fn with_passenger(mut self, passenger_id: UserId) -> Self {
        self.passenger_id = Some(passenger_id);
        self
    }

    /// Restrict to a status.
    #[must_use]
    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `booking` passes the filter.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        self.ride_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&booking.ride_id))
            && self.passenger_id.map_or(true, |p| booking.passenger_id == p)
            && self.status.map_or(true, |s| booking.status() == s)
    }
}

/// Normalized form of a place name used for route matching.
#[must_use]
pub fn normalize(place: &str) -> String {
    place.trim().to_lowercase()
}
