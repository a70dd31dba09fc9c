//! PostgreSQL storage implementation.
//!
//! Records live as JSONB documents with the columns needed for filtering
//! extracted next to them. A ride unit of work is one SQL transaction that
//! locks the ride row and its booking rows with `SELECT … FOR UPDATE` under
//! `SET LOCAL lock_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row, Transaction};

use carpool_core::{Booking, BookingId, Ride, RideId, User, UserId};

use crate::error::{Result, StoreError};
use crate::locks::DEFAULT_LOCK_TIMEOUT;
use crate::query::{normalize, BookingQuery, RideQuery};
use crate::unit::{RideTransaction, RideUnit};
use crate::{LedgerTarget, Store};

/// `lock_not_available`
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";

/// `deadlock_detected`
const DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect.
    pub async fn connect(database_url: &str, lock_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("failed to connect: {e}")))?;
        Ok(Self::from_pool(pool, lock_timeout))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Wrap an existing pool with the default lock wait.
    #[must_use]
    pub const fn with_default_timeout(pool: PgPool) -> Self {
        Self::from_pool(pool, DEFAULT_LOCK_TIMEOUT)
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
    }

    async fn begin_with_lock_timeout(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        // SET does not accept bind parameters; the value is an integer we format ourselves.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        Ok(tx)
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::Conflict(db.message().to_string()),
            Some(code) if is_transient_code(code) => StoreError::Transient(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            tracing::warn!(error = %err, "transient database failure");
            StoreError::Transient(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

fn is_transient_code(code: &str) -> bool {
    matches!(code, SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
}

fn lock_err(err: sqlx::Error, ride_id: &RideId) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            tracing::warn!(ride_id = %ride_id, "ride row lock wait timed out");
            return StoreError::LockTimeout {
                ride_id: ride_id.to_string(),
            };
        }
    }
    db_err(err)
}

fn doc<T: serde::de::DeserializeOwned>(row: &PgRow) -> Result<T> {
    row.try_get::<Json<T>, _>("doc")
        .map(|json| json.0)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

async fn upsert_ride(conn: &mut sqlx::PgConnection, ride: &Ride) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO rides
            (id, driver_id, status, seats_available, total_seats, source_key, destination_key, doc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            seats_available = EXCLUDED.seats_available,
            doc = EXCLUDED.doc
        ",
    )
    .bind(ride.id.to_string())
    .bind(*ride.driver_id.as_uuid())
    .bind(ride.status().as_str())
    .bind(i64::from(ride.seats_available()))
    .bind(i64::from(ride.total_seats()))
    .bind(normalize(&ride.source))
    .bind(normalize(&ride.destination))
    .bind(Json(ride))
    .execute(conn)
    .await
    .map(|_| ())
    .map_err(db_err)
}

async fn upsert_booking(conn: &mut sqlx::PgConnection, booking: &Booking) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO bookings (id, ride_id, passenger_id, status, doc)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            doc = EXCLUDED.doc
        ",
    )
    .bind(booking.id.to_string())
    .bind(booking.ride_id.to_string())
    .bind(*booking.passenger_id.as_uuid())
    .bind(booking.status().as_str())
    .bind(Json(booking))
    .execute(conn)
    .await
    .map(|_| ())
    .map_err(db_err)
}

#[async_trait]
impl Store for PostgresStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn insert_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO users (id, role, created_at, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(*user.id.as_uuid())
        .bind(user.role.to_string())
        .bind(user.created_at)
        .bind(Json(user))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "user already exists: {}",
                user.id
            )));
        }
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, role, created_at, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET role = EXCLUDED.role,
                doc = EXCLUDED.doc
            ",
        )
        .bind(*user.id.as_uuid())
        .bind(user.role.to_string())
        .bind(user.created_at)
        .bind(Json(user))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        sqlx::query("SELECT doc FROM users WHERE id = $1")
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| doc(&row))
            .transpose()
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(*user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        sqlx::query("SELECT doc FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(doc)
            .collect()
    }

    // =========================================================================
    // Ride Operations
    // =========================================================================

    async fn insert_ride(&self, ride: &Ride) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO rides
                (id, driver_id, status, seats_available, total_seats, source_key, destination_key, doc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(ride.id.to_string())
        .bind(*ride.driver_id.as_uuid())
        .bind(ride.status().as_str())
        .bind(i64::from(ride.seats_available()))
        .bind(i64::from(ride.total_seats()))
        .bind(normalize(&ride.source))
        .bind(normalize(&ride.destination))
        .bind(Json(ride))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "ride already exists: {}",
                ride.id
            )));
        }
        Ok(())
    }

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>> {
        sqlx::query("SELECT doc FROM rides WHERE id = $1")
            .bind(ride_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| doc(&row))
            .transpose()
    }

    async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>> {
        let mut sql: QueryBuilder<Postgres> = QueryBuilder::new("SELECT doc FROM rides WHERE TRUE");
        if let Some(status) = query.status {
            sql.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(driver_id) = query.driver_id {
            sql.push(" AND driver_id = ").push_bind(*driver_id.as_uuid());
        }
        if let Some(source) = &query.source {
            sql.push(" AND source_key = ").push_bind(source.clone());
        }
        if let Some(destination) = &query.destination {
            sql.push(" AND destination_key = ").push_bind(destination.clone());
        }
        if query.with_free_seats {
            sql.push(" AND seats_available > 0");
        }
        sql.push(" ORDER BY id");

        let rows = sql.build().fetch_all(&self.pool).await.map_err(db_err)?;
        let rides = rows.iter().map(doc).collect::<Result<Vec<Ride>>>()?;
        Ok(rides.into_iter().filter(|r| query.matches(r)).collect())
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    async fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>> {
        sqlx::query("SELECT doc FROM bookings WHERE id = $1")
            .bind(booking_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| doc(&row))
            .transpose()
    }

    async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>> {
        let mut sql: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT doc FROM bookings WHERE TRUE");
        if let Some(ride_ids) = &query.ride_ids {
            let ids: Vec<String> = ride_ids.iter().map(ToString::to_string).collect();
            sql.push(" AND ride_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(passenger_id) = query.passenger_id {
            sql.push(" AND passenger_id = ")
                .push_bind(*passenger_id.as_uuid());
        }
        if let Some(status) = query.status {
            sql.push(" AND status = ").push_bind(status.as_str());
        }
        sql.push(" ORDER BY id");

        let rows = sql.build().fetch_all(&self.pool).await.map_err(db_err)?;
        let bookings = rows.iter().map(doc).collect::<Result<Vec<Booking>>>()?;
        Ok(bookings.into_iter().filter(|b| query.matches(b)).collect())
    }

    // =========================================================================
    // Units of Work
    // =========================================================================

    async fn lock_ride(&self, ride_id: &RideId) -> Result<Box<dyn RideTransaction>> {
        let mut tx = self.begin_with_lock_timeout().await?;

        let ride: Ride = sqlx::query("SELECT doc FROM rides WHERE id = $1 FOR UPDATE")
            .bind(ride_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| lock_err(e, ride_id))?
            .map(|row| doc(&row))
            .transpose()?
            .ok_or_else(|| StoreError::not_found("ride", ride_id))?;

        let bookings = sqlx::query("SELECT doc FROM bookings WHERE ride_id = $1 ORDER BY id FOR UPDATE")
            .bind(ride_id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| lock_err(e, ride_id))?
            .iter()
            .map(doc)
            .collect::<Result<Vec<Booking>>>()?;

        Ok(Box::new(PgRideTransaction {
            tx,
            unit: RideUnit::new(ride, bookings),
        }))
    }

    async fn annotate(&self, target: LedgerTarget, reference: &str) -> Result<()> {
        let ride_id = target.ride_id();
        let mut tx = self.begin_with_lock_timeout().await?;

        let (sql, id, entity) = match target {
            LedgerTarget::Ride(id) => (
                "UPDATE rides SET doc = jsonb_set(doc, '{ledger_ref}', to_jsonb($2::text)) WHERE id = $1",
                id.to_string(),
                "ride",
            ),
            LedgerTarget::Booking { booking_id, .. } => (
                "UPDATE bookings SET doc = jsonb_set(doc, '{ledger_ref}', to_jsonb($2::text)) WHERE id = $1",
                booking_id.to_string(),
                "booking",
            ),
        };

        let result = sqlx::query(sql)
            .bind(&id)
            .bind(reference)
            .execute(&mut *tx)
            .await
            .map_err(|e| lock_err(e, &ride_id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(entity, id));
        }
        tx.commit().await.map_err(db_err)
    }
}

struct PgRideTransaction {
    tx: Transaction<'static, Postgres>,
    unit: RideUnit,
}

#[async_trait]
impl RideTransaction for PgRideTransaction {
    fn unit(&self) -> &RideUnit {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut RideUnit {
        &mut self.unit
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut tx, unit } = *self;
        let writes = unit.into_writes();

        if let Some(ride) = &writes.ride {
            upsert_ride(&mut *tx, ride).await?;
        }
        for booking in &writes.bookings {
            upsert_booking(&mut *tx, booking).await?;
        }
        if let Some(ride_id) = &writes.delete_ride {
            sqlx::query("DELETE FROM rides WHERE id = $1")
                .bind(ride_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_and_io_failures_are_transient() {
        assert!(matches!(
            db_err(sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            db_err(sqlx::Error::PoolClosed),
            StoreError::Transient(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            db_err(sqlx::Error::Io(io)),
            StoreError::Transient(_)
        ));
    }

    #[test]
    fn serialization_failures_and_deadlocks_are_transient() {
        assert!(is_transient_code(SERIALIZATION_FAILURE));
        assert!(is_transient_code(DEADLOCK_DETECTED));
        assert!(!is_transient_code(UNIQUE_VIOLATION));
        assert!(!is_transient_code("42P01"));
    }

    #[test]
    fn other_failures_stay_internal() {
        assert!(matches!(
            db_err(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
