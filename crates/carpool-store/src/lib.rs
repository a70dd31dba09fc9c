//! Storage layer for the carpool engine.
//!
//! This crate persists users, rides and bookings and provides the
//! per-ride unit of work that keeps seat inventory consistent under
//! concurrent reservations.
//!
//! # Backends
//!
//! - [`MemoryStore`]: always available; `BTreeMap` tables behind a
//!   `parking_lot::RwLock` with in-process ride locks.
//! - `RocksStore` (feature `rocksdb-backend`): column families `users`,
//!   `rides`, `bookings` and `bookings_by_ride`, CBOR values, `WriteBatch`
//!   commits.
//! - `PostgresStore` (feature `postgres-backend`): JSONB documents with
//!   extracted columns, `SELECT … FOR UPDATE` row locks and a partial unique
//!   index enforcing one confirmed booking per passenger and ride.
//!
//! # Units of work
//!
//! [`Store::lock_ride`] waits for exclusive access to a ride, loads it with
//! all of its bookings and returns a [`RideTransaction`]. Changes made to the
//! [`RideUnit`] are written atomically by `commit`; dropping the transaction
//! discards them.
//!
//! # Example
//!
//! ```no_run
//! use carpool_store::{MemoryStore, RideQuery, Store};
//!
//! # async fn example() -> carpool_store::Result<()> {
//! let store = MemoryStore::new();
//! let open = store.list_rides(&RideQuery::open()).await?;
//! assert!(open.is_empty());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod locks;
pub mod memory;
pub mod query;
pub mod unit;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub use error::{Result, StoreError};
pub use locks::{RideLocks, DEFAULT_LOCK_TIMEOUT};
pub use memory::MemoryStore;
pub use query::{BookingQuery, RideQuery};
pub use unit::{RideTransaction, RideUnit, UnitWrites};

#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

#[cfg(feature = "postgres-backend")]
pub use postgres::PostgresStore;

use async_trait::async_trait;

use carpool_core::{Booking, BookingId, Ride, RideId, User, UserId};

/// Record that receives an external-ledger reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTarget {
    /// A ride.
    Ride(RideId),
    /// A booking, addressed through its ride so the ride lock can be taken.
    Booking {
        /// The owning ride.
        ride_id: RideId,
        /// The booking.
        booking_id: BookingId,
    },
}

impl LedgerTarget {
    /// The ride whose lock guards the target.
    #[must_use]
    pub const fn ride_id(&self) -> RideId {
        match self {
            Self::Ride(id) | Self::Booking { ride_id: id, .. } => *id,
        }
    }
}

/// The storage trait defining all database operations.
///
/// Single-record reads and writes are independent; anything that touches a
/// ride's inventory or its bookings goes through [`Store::lock_ride`].
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the user already exists.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Insert or replace a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Delete a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn delete_user(&self, user_id: &UserId) -> Result<()>;

    /// List every user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_users(&self) -> Result<Vec<User>>;

    // =========================================================================
    // Ride Operations
    // =========================================================================

    /// Insert a newly published ride.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the ID is already taken.
    async fn insert_ride(&self, ride: &Ride) -> Result<()>;

    /// Get a ride by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>>;

    /// List rides matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>>;

    // =========================================================================
    // Booking Operations
    // =========================================================================

    /// Get a booking by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>>;

    /// List bookings matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>>;

    // =========================================================================
    // Units of Work
    // =========================================================================

    /// Open a unit of work on a ride.
    ///
    /// Waits for the ride's exclusive lock, then loads the ride and every
    /// booking that references it.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the ride doesn't exist.
    /// - `StoreError::LockTimeout` if the lock wait expires.
    async fn lock_ride(&self, ride_id: &RideId) -> Result<Box<dyn RideTransaction>>;

    /// Store an external-ledger reference on a ride or booking.
    ///
    /// Only the reference field changes; the write is serialized with units
    /// of work on the same ride.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the target doesn't exist.
    /// - `StoreError::LockTimeout` if the ride lock wait expires.
    async fn annotate(&self, target: LedgerTarget, reference: &str) -> Result<()>;
}
