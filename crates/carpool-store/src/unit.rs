//! The ride unit of work.
//!
//! A [`RideUnit`] is a ride together with all of its bookings, loaded while
//! the ride's lock is held. State machines mutate it in memory; the owning
//! [`RideTransaction`] writes every touched record in one atomic commit, or
//! nothing at all if it is dropped.

use std::collections::BTreeSet;

use async_trait::async_trait;

use carpool_core::{Booking, BookingId, Ride, RideId};

use crate::error::Result;

/// A ride and its bookings, staged for an atomic write.
#[derive(Debug)]
pub struct RideUnit {
    ride: Ride,
    bookings: Vec<Booking>,
    ride_dirty: bool,
    dirty: BTreeSet<BookingId>,
    inserted: BTreeSet<BookingId>,
    deleted: bool,
}

/// The writes a committed [`RideUnit`] produces.
#[derive(Debug, Default)]
pub struct UnitWrites {
    /// The ride, if it changed.
    pub ride: Option<Ride>,
    /// Bookings that changed or were created.
    pub bookings: Vec<Booking>,
    /// Ids among `bookings` that are new.
    pub inserted: BTreeSet<BookingId>,
    /// The ride to delete, if deletion was requested.
    pub delete_ride: Option<RideId>,
}

impl UnitWrites {
    /// Whether the commit has nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ride.is_none() && self.bookings.is_empty() && self.delete_ride.is_none()
    }
}

impl RideUnit {
    /// Wrap a freshly loaded ride and its bookings.
    #[must_use]
    pub fn new(ride: Ride, bookings: Vec<Booking>) -> Self {
        Self {
            ride,
            bookings,
            ride_dirty: false,
            dirty: BTreeSet::new(),
            inserted: BTreeSet::new(),
            deleted: false,
        }
    }

    /// The ride.
    #[must_use]
    pub const fn ride(&self) -> &Ride {
        &self.ride
    }

    /// All bookings of the ride.
    #[must_use]
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// One booking of the ride.
    #[must_use]
    pub fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    /// Mutable ride with read-only bookings, for creating a reservation.
    pub fn split(&mut self) -> (&mut Ride, &[Booking]) {
        self.ride_dirty = true;
        (&mut self.ride, &self.bookings)
    }

    /// Mutable ride and one of its bookings.
    pub fn booking_mut(&mut self, id: &BookingId) -> Option<(&mut Ride, &mut Booking)> {
        let booking = self.bookings.iter_mut().find(|b| b.id == *id)?;
        self.ride_dirty = true;
        self.dirty.insert(*id);
        Some((&mut self.ride, booking))
    }

    /// Mutable ride and every booking, for cascading transitions.
    pub fn parts_mut(&mut self) -> (&mut Ride, &mut [Booking]) {
        self.ride_dirty = true;
        self.dirty.extend(self.bookings.iter().map(|b| b.id));
        (&mut self.ride, &mut self.bookings)
    }

    /// Stage a new booking.
    pub fn insert_booking(&mut self, booking: Booking) -> &Booking {
        self.inserted.insert(booking.id);
        self.dirty.insert(booking.id);
        self.bookings.push(booking);
        &self.bookings[self.bookings.len() - 1]
    }

    /// Stage deletion of the ride. Its bookings are kept.
    pub fn delete_ride(&mut self) {
        self.deleted = true;
    }

    /// Consume the unit into the records to write.
    #[must_use]
    pub fn into_writes(self) -> UnitWrites {
        let Self {
            ride,
            bookings,
            ride_dirty,
            dirty,
            inserted,
            deleted,
        } = self;

        let delete_ride = deleted.then_some(ride.id);
        let ride = (ride_dirty && !deleted).then_some(ride);
        let bookings = bookings
            .into_iter()
            .filter(|b| dirty.contains(&b.id))
            .collect();

        UnitWrites {
            ride,
            bookings,
            inserted,
            delete_ride,
        }
    }
}

/// An open unit of work on one ride.
///
/// The ride's lock is held for the lifetime of the value. Dropping it without
/// calling [`commit`](RideTransaction::commit) discards the staged changes.
#[async_trait]
pub trait RideTransaction: Send {
    /// The staged state.
    fn unit(&self) -> &RideUnit;

    /// The staged state, mutably.
    fn unit_mut(&mut self) -> &mut RideUnit;

    /// Atomically write every staged change and release the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is persisted in that case.
    async fn commit(self: Box<Self>) -> Result<()>;
}
