//! `RocksDB` storage implementation.
//!
//! Records are CBOR-encoded. Ride units of work are serialized by
//! [`RideLocks`] and committed with a single `WriteBatch`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use carpool_core::{Booking, BookingId, Ride, RideId, User, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::{RideGuard, RideLocks, DEFAULT_LOCK_TIMEOUT};
use crate::query::{BookingQuery, RideQuery};
use crate::schema::{all_column_families, cf};
use crate::unit::{RideTransaction, RideUnit};
use crate::{LedgerTarget, Store};

struct Db {
    db: DBWithThreadMode<MultiThreaded>,
}

impl Db {
    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put<T: serde::Serialize>(&self, family: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                Self::deserialize(&value)
            })
            .collect()
    }

    fn bookings_of(&self, ride_id: &RideId) -> Result<Vec<Booking>> {
        let index = self.cf(cf::BOOKINGS_BY_RIDE)?;
        let prefix = keys::ride_bookings_prefix(ride_id);

        let mut bookings = Vec::new();
        for item in self
            .db
            .iterator_cf(&index, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let booking_id = keys::booking_id_from_index_key(&key)
                .ok_or_else(|| StoreError::Database("malformed booking index key".into()))?;
            if let Some(booking) = self.get(cf::BOOKINGS, &keys::booking_key(&booking_id))? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    inner: Arc<Db>,
    locks: RideLocks,
    lock_timeout: Duration,
    user_writes: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open with a custom ride-lock wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Db { db }),
            locks: RideLocks::new(),
            lock_timeout,
            user_writes: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn insert_user(&self, user: &User) -> Result<()> {
        let _serial = self.user_writes.lock();
        let key = keys::user_key(&user.id);
        if self.inner.get::<User>(cf::USERS, &key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "user already exists: {}",
                user.id
            )));
        }
        self.inner.put(cf::USERS, &key, user)
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let _serial = self.user_writes.lock();
        self.inner.put(cf::USERS, &keys::user_key(&user.id), user)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.inner.get(cf::USERS, &keys::user_key(user_id))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let _serial = self.user_writes.lock();
        let key = keys::user_key(user_id);
        if self.inner.get::<User>(cf::USERS, &key)?.is_none() {
            return Err(StoreError::not_found("user", user_id));
        }

        let cf = self.inner.cf(cf::USERS)?;
        self.inner
            .db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.inner.scan(cf::USERS)?;
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    // =========================================================================
    // Ride Operations
    // =========================================================================

    async fn insert_ride(&self, ride: &Ride) -> Result<()> {
        let _guard = self.locks.acquire(&ride.id, self.lock_timeout).await?;
        let key = keys::ride_key(&ride.id);
        if self.inner.get::<Ride>(cf::RIDES, &key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "ride already exists: {}",
                ride.id
            )));
        }
        self.inner.put(cf::RIDES, &key, ride)
    }

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>> {
        self.inner.get(cf::RIDES, &keys::ride_key(ride_id))
    }

    async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>> {
        let rides: Vec<Ride> = self.inner.scan(cf::RIDES)?;
        Ok(rides.into_iter().filter(|r| query.matches(r)).collect())
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    async fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>> {
        self.inner.get(cf::BOOKINGS, &keys::booking_key(booking_id))
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>> {
        let bookings = match &query.ride_ids {
            Some(ride_ids) => {
                let mut collected = Vec::new();
                for ride_id in ride_ids {
                    collected.extend(self.inner.bookings_of(ride_id)?);
                }
                collected.sort_by_key(|b| b.id);
                collected
            }
            None => self.inner.scan(cf::BOOKINGS)?,
        };
        Ok(bookings.into_iter().filter(|b| query.matches(b)).collect())
    }

    // =========================================================================
    // Units of Work
    // =========================================================================

    async fn lock_ride(&self, ride_id: &RideId) -> Result<Box<dyn RideTransaction>> {
        let guard = self.locks.acquire(ride_id, self.lock_timeout).await?;

        let ride: Ride = self
            .inner
            .get(cf::RIDES, &keys::ride_key(ride_id))?
            .ok_or_else(|| StoreError::not_found("ride", ride_id))?;
        let bookings = self.inner.bookings_of(ride_id)?;

        Ok(Box::new(RocksTransaction {
            inner: Arc::clone(&self.inner),
            unit: RideUnit::new(ride, bookings),
            guard,
        }))
    }

    async fn annotate(&self, target: LedgerTarget, reference: &str) -> Result<()> {
        let _guard = self
            .locks
            .acquire(&target.ride_id(), self.lock_timeout)
            .await?;

        match target {
            LedgerTarget::Ride(ride_id) => {
                let key = keys::ride_key(&ride_id);
                let mut ride: Ride = self
                    .inner
                    .get(cf::RIDES, &key)?
                    .ok_or_else(|| StoreError::not_found("ride", ride_id))?;
                ride.ledger_ref = Some(reference.to_string());
                self.inner.put(cf::RIDES, &key, &ride)
            }
            LedgerTarget::Booking { booking_id, .. } => {
                let key = keys::booking_key(&booking_id);
                let mut booking: Booking = self
                    .inner
                    .get(cf::BOOKINGS, &key)?
                    .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
                booking.ledger_ref = Some(reference.to_string());
                self.inner.put(cf::BOOKINGS, &key, &booking)
            }
        }
    }
}

struct RocksTransaction {
    inner: Arc<Db>,
    unit: RideUnit,
    guard: RideGuard,
}

#[async_trait]
impl RideTransaction for RocksTransaction {
    fn unit(&self) -> &RideUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut RideUnit {
        &mut self.unit
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            inner,
            unit,
            guard,
        } = *self;
        let writes = unit.into_writes();
        if writes.is_empty() {
            return Ok(());
        }

        {
            let cf_rides = inner.cf(cf::RIDES)?;
            let cf_bookings = inner.cf(cf::BOOKINGS)?;
            let cf_index = inner.cf(cf::BOOKINGS_BY_RIDE)?;

            let mut batch = WriteBatch::default();
            if let Some(ride) = &writes.ride {
                batch.put_cf(&cf_rides, keys::ride_key(&ride.id), Db::serialize(ride)?);
            }
            for booking in &writes.bookings {
                batch.put_cf(
                    &cf_bookings,
                    keys::booking_key(&booking.id),
                    Db::serialize(booking)?,
                );
                if writes.inserted.contains(&booking.id) {
                    batch.put_cf(
                        &cf_index,
                        keys::ride_booking_key(&booking.ride_id, &booking.id),
                        [],
                    );
                }
            }
            if let Some(ride_id) = &writes.delete_ride {
                batch.delete_cf(&cf_rides, keys::ride_key(ride_id));
            }

            inner
                .db
                .write(batch)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        drop(guard);
        Ok(())
    }
}
