//! Administrative reporting.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use carpool_core::inventory::{self, InventoryAudit};
use carpool_core::{
    Booking, BookingStatus, Caller, Result, Ride, RideStatus, Role, User, UserId,
};
use carpool_store::{BookingQuery, RideQuery, Store};

/// Platform-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Registered users.
    pub total_users: usize,
    /// Rides ever published and not deleted.
    pub total_rides: usize,
    /// Bookings in any status.
    pub total_bookings: usize,
    /// Rides in `ACTIVE` status.
    pub active_rides: usize,
    /// Bookings in `CONFIRMED` status.
    pub confirmed_bookings: usize,
    /// Bookings in `COMPLETED` status.
    pub completed_bookings: usize,
    /// Bookings in `CANCELLED` status.
    pub cancelled_bookings: usize,
    /// Sum of `total_amount_cents` over completed bookings.
    pub total_revenue_cents: i64,
}

/// Activity of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// The user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Current role.
    pub role: Role,
    /// Rides the user published.
    pub rides_created: usize,
    /// Bookings the user made.
    pub bookings_made: usize,
}

/// Read-only reports for administrators.
#[derive(Clone)]
pub struct Reporter {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

impl Reporter {
    /// Create a reporter over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Platform-wide counters.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - Storage errors.
    pub async fn dashboard(&self, caller: &Caller) -> Result<DashboardStats> {
        caller.require_admin()?;

        let users = self.store.list_users().await?;
        let rides = self.store.list_rides(&RideQuery::all()).await?;
        let bookings = self.store.list_bookings(&BookingQuery::all()).await?;

        let mut stats = DashboardStats {
            total_users: users.len(),
            total_rides: rides.len(),
            total_bookings: bookings.len(),
            active_rides: rides
                .iter()
                .filter(|r| r.status() == RideStatus::Active)
                .count(),
            ..DashboardStats::default()
        };

        for booking in &bookings {
            match booking.status() {
                BookingStatus::Confirmed => stats.confirmed_bookings += 1,
                BookingStatus::Completed => {
                    stats.completed_bookings += 1;
                    stats.total_revenue_cents += booking.total_amount_cents;
                }
                BookingStatus::Cancelled => stats.cancelled_bookings += 1,
            }
        }

        Ok(stats)
    }

    /// Every user with ride and booking counts, in registration order.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - Storage errors.
    pub async fn user_stats(&self, caller: &Caller) -> Result<Vec<UserStats>> {
        caller.require_admin()?;

        let users = self.store.list_users().await?;
        let rides = self.store.list_rides(&RideQuery::all()).await?;
        let bookings = self.store.list_bookings(&BookingQuery::all()).await?;

        let mut rides_by_driver: HashMap<UserId, usize> = HashMap::new();
        for ride in &rides {
            *rides_by_driver.entry(ride.driver_id).or_default() += 1;
        }
        let mut bookings_by_passenger: HashMap<UserId, usize> = HashMap::new();
        for booking in &bookings {
            *bookings_by_passenger.entry(booking.passenger_id).or_default() += 1;
        }

        Ok(users
            .into_iter()
            .map(|user| UserStats {
                rides_created: rides_by_driver.get(&user.id).copied().unwrap_or(0),
                bookings_made: bookings_by_passenger.get(&user.id).copied().unwrap_or(0),
                user_id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
            })
            .collect())
    }

    /// Every user profile.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - Storage errors.
    pub async fn users(&self, caller: &Caller) -> Result<Vec<User>> {
        caller.require_admin()?;
        Ok(self.store.list_users().await?)
    }

    /// Rides, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - Storage errors.
    pub async fn rides(&self, caller: &Caller, status: Option<RideStatus>) -> Result<Vec<Ride>> {
        caller.require_admin()?;
        let query = RideQuery {
            status,
            ..RideQuery::all()
        };
        Ok(self.store.list_rides(&query).await?)
    }

    /// Bookings, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - Storage errors.
    pub async fn bookings(
        &self,
        caller: &Caller,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>> {
        caller.require_admin()?;
        let query = BookingQuery {
            status,
            ..BookingQuery::all()
        };
        Ok(self.store.list_bookings(&query).await?)
    }

    /// Rides whose stored free-seat count disagrees with their confirmed
    /// bookings.
    ///
    /// Each ride is audited under its lock so an in-flight booking is never
    /// reported as drift.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::AdminRequired` unless the caller is an administrator.
    /// - `LifecycleError::Busy` if a ride lock wait expires.
    /// - Storage errors.
    pub async fn inventory_audit(&self, caller: &Caller) -> Result<Vec<InventoryAudit>> {
        caller.require_admin()?;

        let rides = self.store.list_rides(&RideQuery::all()).await?;
        let mut drifted = Vec::new();

        for ride in rides {
            let tx = match self.store.lock_ride(&ride.id).await {
                Ok(tx) => tx,
                // Deleted since the listing.
                Err(carpool_store::StoreError::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            };
            let unit = tx.unit();
            let report = inventory::audit(unit.ride(), unit.bookings());
            if !report.is_consistent() {
                tracing::error!(
                    ride_id = %report.ride_id,
                    seats_available = report.seats_available,
                    expected_available = report.expected_available,
                    "seat inventory drift detected"
                );
                drifted.push(report);
            }
        }

        Ok(drifted)
    }
}
