//! In-memory storage backend.
//!
//! Tables are `BTreeMap`s keyed by id, so listings come back in ULID
//! (creation) order. A `parking_lot::RwLock` guards the tables for the short
//! read and commit sections; ride units of work serialize on [`RideLocks`].
//!
//! Data is not persisted. `MemoryStore` is cheaply cloneable and all clones
//! share the same tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use carpool_core::{Booking, BookingId, Ride, RideId, User, UserId};

use crate::error::{Result, StoreError};
use crate::locks::{RideGuard, RideLocks, DEFAULT_LOCK_TIMEOUT};
use crate::query::{BookingQuery, RideQuery};
use crate::unit::{RideTransaction, RideUnit};
use crate::{LedgerTarget, Store};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    rides: BTreeMap<RideId, Ride>,
    bookings: BTreeMap<BookingId, Booking>,
    bookings_by_ride: BTreeSet<(RideId, BookingId)>,
}

impl Tables {
    fn bookings_of(&self, ride_id: &RideId) -> Vec<Booking> {
        let lo = (*ride_id, BookingId::from_bytes([0; 16]));
        let hi = (*ride_id, BookingId::from_bytes([0xff; 16]));
        self.bookings_by_ride
            .range(lo..=hi)
            .filter_map(|(_, booking_id)| self.bookings.get(booking_id).cloned())
            .collect()
    }
}

/// In-memory storage implementation.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: RideLocks,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default lock wait.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store with a custom lock wait.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            locks: RideLocks::new(),
            lock_timeout,
        }
    }

    /// Overwrite a ride record without taking its lock.
    ///
    /// Meant for seeding fixtures, including deliberately inconsistent ones.
    pub fn force_put_ride(&self, ride: Ride) {
        self.tables.write().rides.insert(ride.id, ride);
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "user already exists: {}",
                user.id
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.tables.write().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(user_id).cloned())
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        self.tables
            .write()
            .users
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    // =========================================================================
    // Ride Operations
    // =========================================================================

    async fn insert_ride(&self, ride: &Ride) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.rides.contains_key(&ride.id) {
            return Err(StoreError::Conflict(format!(
                "ride already exists: {}",
                ride.id
            )));
        }
        tables.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>> {
        Ok(self.tables.read().rides.get(ride_id).cloned())
    }

    async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>> {
        Ok(self
            .tables
            .read()
            .rides
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    async fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.read().bookings.get(booking_id).cloned())
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .read()
            .bookings
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Units of Work
    // =========================================================================

    async fn lock_ride(&self, ride_id: &RideId) -> Result<Box<dyn RideTransaction>> {
        let guard = self.locks.acquire(ride_id, self.lock_timeout).await?;

        let unit = {
            let tables = self.tables.read();
            let ride = tables
                .rides
                .get(ride_id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("ride", ride_id))?;
            RideUnit::new(ride, tables.bookings_of(ride_id))
        };

        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            unit,
            _guard: guard,
        }))
    }

    async fn annotate(&self, target: LedgerTarget, reference: &str) -> Result<()> {
        let _guard = self
            .locks
            .acquire(&target.ride_id(), self.lock_timeout)
            .await?;
        let mut tables = self.tables.write();

        match target {
            LedgerTarget::Ride(ride_id) => {
                let ride = tables
                    .rides
                    .get_mut(&ride_id)
                    .ok_or_else(|| StoreError::not_found("ride", ride_id))?;
                ride.ledger_ref = Some(reference.to_string());
            }
            LedgerTarget::Booking { booking_id, .. } => {
                let booking = tables
                    .bookings
                    .get_mut(&booking_id)
                    .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
                booking.ledger_ref = Some(reference.to_string());
            }
        }
        Ok(())
    }
}

struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    unit: RideUnit,
    _guard: RideGuard,
}

#[async_trait]
impl RideTransaction for MemoryTransaction {
    fn unit(&self) -> &RideUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut RideUnit {
        &mut self.unit
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            tables,
            unit,
            _guard: guard,
        } = *self;
        let writes = unit.into_writes();

        {
            let mut tables = tables.write();
            if let Some(ride) = writes.ride {
                tables.rides.insert(ride.id, ride);
            }
            for booking in writes.bookings {
                tables.bookings_by_ride.insert((booking.ride_id, booking.id));
                tables.bookings.insert(booking.id, booking);
            }
            if let Some(ride_id) = writes.delete_ride {
                tables.rides.remove(&ride_id);
            }
        }

        drop(guard);
        Ok(())
    }
}
