//! The lifecycle engine.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use carpool_core::{
    Booking, BookingId, Caller, LifecycleError, NewRide, PricingConfig, Result, Ride, RideId,
    Role, RouteEstimate, User, UserId, UserProfile,
};
use carpool_store::{BookingQuery, RideQuery, Store, StoreError};

use crate::ledger::{LedgerDispatcher, LedgerEvent, LedgerRecorder};

/// Outcome of completing a ride.
#[derive(Debug, Clone, PartialEq)]
pub struct RideCompletion {
    /// The completed ride.
    pub ride: Ride,
    /// Bookings settled by the cascade.
    pub settled: Vec<BookingId>,
}

/// Entry point for every lifecycle operation.
///
/// Mutations take the calling [`Caller`] explicitly; ownership and role
/// checks happen inside the state machines or here, never in the transport.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    pricing: PricingConfig,
    ledger: LedgerDispatcher,
}

impl fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("pricing", &self.pricing)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    /// Create an engine without an external ledger.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, pricing: PricingConfig) -> Self {
        let ledger = LedgerDispatcher::new(Arc::clone(&store), None);
        Self {
            store,
            pricing,
            ledger,
        }
    }

    /// Attach an external ledger recorder.
    #[must_use]
    pub fn with_ledger(mut self, recorder: Arc<dyn LedgerRecorder>) -> Self {
        self.ledger = LedgerDispatcher::new(Arc::clone(&self.store), Some(recorder));
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The pricing configuration.
    #[must_use]
    pub const fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// The ledger dispatcher.
    #[must_use]
    pub const fn ledger(&self) -> &LedgerDispatcher {
        &self.ledger
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register the profile of an authenticated subject.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::Validation` for a blank name or phone or a malformed email.
    /// - `LifecycleError::AlreadyRegistered` if the subject has a profile.
    pub async fn register_user(
        &self,
        user_id: UserId,
        profile: UserProfile,
        role: Role,
    ) -> Result<User> {
        let profile = profile.validated()?;
        let user = User::new(user_id, profile, role, Utc::now());

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(LifecycleError::AlreadyRegistered { user_id });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user_id, role = %role, "user registered");
        Ok(user)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - `LifecycleError::NotFound` if the user doesn't exist.
    pub async fn set_role(&self, caller: &Caller, user_id: UserId, role: Role) -> Result<User> {
        caller.require_admin()?;

        let mut user = self.user(&user_id).await?;
        user.role = role;
        self.store.put_user(&user).await?;

        tracing::info!(admin_id = %caller.user_id, user_id = %user_id, role = %role, "role changed");
        Ok(user)
    }

    /// Delete a user profile.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - `LifecycleError::NotFound` if the user doesn't exist.
    /// - `LifecycleError::ProtectedAccount` if the user is an administrator.
    pub async fn delete_user(&self, caller: &Caller, user_id: UserId) -> Result<()> {
        caller.require_admin()?;

        let user = self.user(&user_id).await?;
        if user.role == Role::Admin {
            return Err(LifecycleError::ProtectedAccount { user_id });
        }
        self.store.delete_user(&user_id).await?;

        tracing::info!(admin_id = %caller.user_id, user_id = %user_id, "user deleted");
        Ok(())
    }

    // =========================================================================
    // Rides
    // =========================================================================

    /// Publish a ride with the caller as driver.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the caller has no profile.
    /// - Validation errors from `Ride::offer`.
    pub async fn create_ride(&self, caller: &Caller, input: NewRide) -> Result<Ride> {
        self.user(&caller.user_id).await?;

        let ride = Ride::offer(caller.user_id, input, &self.pricing, Utc::now())?;
        self.store.insert_ride(&ride).await?;

        tracing::info!(
            ride_id = %ride.id,
            driver_id = %ride.driver_id,
            seats = ride.total_seats(),
            price_per_seat_cents = ride.price_per_seat_cents,
            "ride created"
        );
        self.ledger.dispatch(LedgerEvent::ride_created(&ride));
        Ok(ride)
    }

    /// Complete a ride and settle its confirmed bookings in one commit.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the ride doesn't exist.
    /// - `LifecycleError::NotDriver` unless the caller drives the ride.
    /// - `LifecycleError::NotActive` unless the ride is active.
    /// - `LifecycleError::Busy` if the ride lock wait expires.
    pub async fn complete_ride(&self, caller: &Caller, ride_id: RideId) -> Result<RideCompletion> {
        let mut tx = self.store.lock_ride(&ride_id).await?;

        let (ride, bookings) = tx.unit_mut().parts_mut();
        let settled = ride.complete(caller.user_id, bookings)?;
        let ride = ride.clone();

        tx.commit().await?;

        tracing::info!(ride_id = %ride_id, settled = settled.len(), "ride completed");
        Ok(RideCompletion { ride, settled })
    }

    /// Delete a ride that has no confirmed bookings.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - `LifecycleError::NotFound` if the ride doesn't exist.
    /// - `LifecycleError::ActiveBookingsExist` while bookings are confirmed.
    pub async fn delete_ride(&self, caller: &Caller, ride_id: RideId) -> Result<()> {
        caller.require_admin()?;

        let mut tx = self.store.lock_ride(&ride_id).await?;
        {
            let unit = tx.unit();
            unit.ride().ensure_deletable(unit.bookings())?;
        }
        tx.unit_mut().delete_ride();
        tx.commit().await?;

        tracing::info!(admin_id = %caller.user_id, ride_id = %ride_id, "ride deleted");
        Ok(())
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    /// Reserve seats on a ride for the caller.
    ///
    /// The availability check and the seat decrement happen in the same
    /// unit of work as the booking insert.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the caller has no profile or the ride doesn't exist.
    /// - Any rejection from `Booking::reserve`.
    /// - `LifecycleError::Busy` if the ride lock wait expires.
    pub async fn book_ride(&self, caller: &Caller, ride_id: RideId, seats: u32) -> Result<Booking> {
        self.user(&caller.user_id).await?;

        let mut tx = self.store.lock_ride(&ride_id).await?;
        let unit = tx.unit_mut();
        let (ride, existing) = unit.split();
        let booking = Booking::reserve(ride, existing, caller.user_id, seats, Utc::now())?;
        let seats_left = ride.seats_available();
        unit.insert_booking(booking.clone());
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            ride_id = %ride_id,
            passenger_id = %caller.user_id,
            seats,
            seats_left,
            "booking confirmed"
        );
        self.ledger.dispatch(LedgerEvent::booking_confirmed(&booking));
        Ok(booking)
    }

    /// Cancel one of the caller's bookings and return its seats.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the booking or its ride doesn't exist.
    /// - `LifecycleError::NotOwner` unless the caller made the booking.
    /// - `LifecycleError::AlreadyTerminal` if the booking is cancelled or completed.
    /// - `LifecycleError::Busy` if the ride lock wait expires.
    pub async fn cancel_booking(&self, caller: &Caller, booking_id: BookingId) -> Result<Booking> {
        let ride_id = self.owning_ride(&booking_id).await?;

        let mut tx = self.store.lock_ride(&ride_id).await?;
        let (ride, booking) = tx
            .unit_mut()
            .booking_mut(&booking_id)
            .ok_or_else(|| LifecycleError::not_found("booking", booking_id))?;
        booking.cancel(ride, caller.user_id)?;
        let booking = booking.clone();
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            ride_id = %ride_id,
            seats_released = booking.seats_booked(),
            "booking cancelled"
        );
        self.ledger.dispatch(LedgerEvent::booking_cancelled(&booking));
        Ok(booking)
    }

    /// Complete a booking. Its seats stay consumed.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the booking or its ride doesn't exist.
    /// - `LifecycleError::NotParticipant` unless the caller is the passenger or driver.
    /// - `LifecycleError::NotConfirmed` unless the booking is confirmed.
    /// - `LifecycleError::Busy` if the ride lock wait expires.
    pub async fn complete_booking(
        &self,
        caller: &Caller,
        booking_id: BookingId,
    ) -> Result<Booking> {
        let ride_id = self.owning_ride(&booking_id).await?;

        let mut tx = self.store.lock_ride(&ride_id).await?;
        let (ride, booking) = tx
            .unit_mut()
            .booking_mut(&booking_id)
            .ok_or_else(|| LifecycleError::not_found("booking", booking_id))?;
        booking.complete(ride, caller.user_id)?;
        let booking = booking.clone();
        tx.commit().await?;

        tracing::info!(booking_id = %booking_id, ride_id = %ride_id, "booking completed");
        Ok(booking)
    }

    async fn owning_ride(&self, booking_id: &BookingId) -> Result<RideId> {
        self.store
            .get_booking(booking_id)
            .await?
            .map(|booking| booking.ride_id)
            .ok_or_else(|| LifecycleError::not_found("booking", booking_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A user profile.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::NotFound` if the user doesn't exist.
    pub async fn user(&self, user_id: &UserId) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("user", user_id))
    }

    /// A ride.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::NotFound` if the ride doesn't exist.
    pub async fn ride(&self, ride_id: &RideId) -> Result<Ride> {
        self.store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("ride", ride_id))
    }

    /// Active rides with free seats.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn available_rides(&self) -> Result<Vec<Ride>> {
        Ok(self.store.list_rides(&RideQuery::open()).await?)
    }

    /// Active rides with free seats on a route. Names match trimmed and
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Validation` for blank names.
    pub async fn search_rides(&self, source: &str, destination: &str) -> Result<Vec<Ride>> {
        if source.trim().is_empty() || destination.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "source and destination are required".into(),
            ));
        }
        let query = RideQuery::open().with_route(source, destination);
        Ok(self.store.list_rides(&query).await?)
    }

    /// Rides published by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn rides_for_driver(&self, caller: &Caller) -> Result<Vec<Ride>> {
        let query = RideQuery::all().with_driver(caller.user_id);
        Ok(self.store.list_rides(&query).await?)
    }

    /// A booking visible to the caller: its passenger, the ride's driver or
    /// an administrator.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the booking doesn't exist.
    /// - `LifecycleError::NotParticipant` for anyone else.
    pub async fn booking(&self, caller: &Caller, booking_id: &BookingId) -> Result<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("booking", booking_id))?;

        if caller.is_admin() || booking.passenger_id == caller.user_id {
            return Ok(booking);
        }

        let driver_id = self
            .store
            .get_ride(&booking.ride_id)
            .await?
            .map(|ride| ride.driver_id);
        if driver_id == Some(caller.user_id) {
            Ok(booking)
        } else {
            Err(LifecycleError::NotParticipant)
        }
    }

    /// Bookings made by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn bookings_for_passenger(&self, caller: &Caller) -> Result<Vec<Booking>> {
        let query = BookingQuery::all().with_passenger(caller.user_id);
        Ok(self.store.list_bookings(&query).await?)
    }

    /// Bookings on one ride. Visible to the driver and administrators.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NotFound` if the ride doesn't exist.
    /// - `LifecycleError::NotDriver` for anyone else.
    pub async fn bookings_for_ride(&self, caller: &Caller, ride_id: &RideId) -> Result<Vec<Booking>> {
        let ride = self.ride(ride_id).await?;
        if ride.driver_id != caller.user_id && !caller.is_admin() {
            return Err(LifecycleError::NotDriver);
        }
        Ok(self
            .store
            .list_bookings(&BookingQuery::for_ride(ride.id))
            .await?)
    }

    /// Bookings made on any of the caller's rides.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn bookings_for_driver(&self, caller: &Caller) -> Result<Vec<Booking>> {
        let ride_ids: Vec<RideId> = self
            .rides_for_driver(caller)
            .await?
            .into_iter()
            .map(|ride| ride.id)
            .collect();
        if ride_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .list_bookings(&BookingQuery::for_rides(ride_ids))
            .await?)
    }

    /// Distance and per-seat price for a prospective ride.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::Validation` for blank names.
    /// - `LifecycleError::InvalidSeatCount` for zero seats.
    pub fn estimate(&self, source: &str, destination: &str, seats: u32) -> Result<RouteEstimate> {
        self.pricing.estimate(source, destination, seats)
    }
}
