//! Ride handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carpool_core::{format_amount, Car, NewRide, Ride, RideId, RideStatus};
use carpool_engine::RideCompletion;

use crate::auth::{AuthCaller, AuthUser};
use crate::error::ApiError;
use crate::handlers::bookings::{booking_list, BookingResponse};
use crate::state::AppState;

/// Ride response.
#[derive(Debug, Serialize)]
pub struct RideResponse {
    /// Ride ID.
    pub id: String,
    /// Driver user ID.
    pub driver_id: String,
    /// Departure place.
    pub source: String,
    /// Arrival place.
    pub destination: String,
    /// Scheduled departure.
    pub departure_at: String,
    /// Seats offered.
    pub total_seats: u32,
    /// Seats still free.
    pub seats_available: u32,
    /// Ride status.
    pub status: RideStatus,
    /// Vehicle.
    pub car: Car,
    /// Estimated distance in km.
    pub distance_km: f64,
    /// Price per seat in cents.
    pub price_per_seat_cents: i64,
    /// Price per seat formatted with two decimals.
    pub price_per_seat: String,
    /// External ledger reference, once recorded.
    pub ledger_ref: Option<String>,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&Ride> for RideResponse {
    fn from(ride: &Ride) -> Self {
        Self {
            id: ride.id.to_string(),
            driver_id: ride.driver_id.to_string(),
            source: ride.source.clone(),
            destination: ride.destination.clone(),
            departure_at: ride.departure_at.to_rfc3339(),
            total_seats: ride.total_seats(),
            seats_available: ride.seats_available(),
            status: ride.status(),
            car: ride.car.clone(),
            distance_km: ride.distance_km,
            price_per_seat_cents: ride.price_per_seat_cents,
            price_per_seat: format_amount(ride.price_per_seat_cents),
            ledger_ref: ride.ledger_ref.clone(),
            created_at: ride.created_at.to_rfc3339(),
        }
    }
}

pub(crate) fn ride_list(rides: &[Ride]) -> Json<Vec<RideResponse>> {
    Json(rides.iter().map(RideResponse::from).collect())
}

/// Create ride request.
#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    /// Departure place.
    pub source: String,
    /// Arrival place.
    pub destination: String,
    /// Scheduled departure (RFC 3339).
    pub departure_at: DateTime<Utc>,
    /// Seats offered (1 to 7).
    pub seats: u32,
    /// Vehicle.
    pub car: Car,
}

impl From<CreateRideRequest> for NewRide {
    fn from(req: CreateRideRequest) -> Self {
        Self {
            source: req.source,
            destination: req.destination,
            departure_at: req.departure_at,
            seats: req.seats,
            car: req.car,
        }
    }
}

/// Publish a ride as the caller.
pub async fn create_ride(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Json(body): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>), ApiError> {
    let ride = state.engine.create_ride(&caller, body.into()).await?;
    Ok((StatusCode::CREATED, Json(RideResponse::from(&ride))))
}

/// Active rides with free seats.
pub async fn available_rides(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let rides = state.engine.available_rides().await?;
    Ok(ride_list(&rides))
}

/// Route search parameters.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Departure place.
    #[serde(default)]
    pub source: String,
    /// Arrival place.
    #[serde(default)]
    pub destination: String,
}

/// Active rides with free seats on a route.
pub async fn search_rides(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let rides = state
        .engine
        .search_rides(&params.source, &params.destination)
        .await?;
    Ok(ride_list(&rides))
}

/// Rides published by the caller.
pub async fn my_rides(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let rides = state.engine.rides_for_driver(&caller).await?;
    Ok(ride_list(&rides))
}

/// Estimate parameters.
#[derive(Debug, Deserialize)]
pub struct EstimateParams {
    /// Departure place.
    #[serde(default)]
    pub source: String,
    /// Arrival place.
    #[serde(default)]
    pub destination: String,
    /// Seats the trip cost is split over (default 1).
    pub seats: Option<u32>,
}

/// Estimate response.
#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    /// Departure place.
    pub source: String,
    /// Arrival place.
    pub destination: String,
    /// Seats the trip cost is split over.
    pub seats: u32,
    /// Estimated distance in km.
    pub distance_km: f64,
    /// Price per seat in cents.
    pub price_per_seat_cents: i64,
    /// Price per seat formatted with two decimals.
    pub price_per_seat: String,
    /// Whole-trip cost in cents.
    pub trip_cost_cents: i64,
}

/// Distance and per-seat price for a prospective ride.
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(params): Query<EstimateParams>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let seats = params.seats.unwrap_or(1);
    let estimate = state
        .engine
        .estimate(&params.source, &params.destination, seats)?;

    Ok(Json(EstimateResponse {
        source: params.source,
        destination: params.destination,
        seats,
        distance_km: estimate.distance_km,
        price_per_seat_cents: estimate.price_per_seat_cents,
        price_per_seat: format_amount(estimate.price_per_seat_cents),
        trip_cost_cents: estimate.trip_cost_cents,
    }))
}

/// Get a ride.
pub async fn get_ride(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride_id = id.parse::<RideId>()?;
    let ride = state.engine.ride(&ride_id).await?;
    Ok(Json(RideResponse::from(&ride)))
}

/// Bookings on a ride, for its driver or an administrator.
pub async fn ride_bookings(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let ride_id = id.parse::<RideId>()?;
    let bookings = state.engine.bookings_for_ride(&caller, &ride_id).await?;
    Ok(booking_list(&bookings))
}

/// Ride completion response.
#[derive(Debug, Serialize)]
pub struct CompleteRideResponse {
    /// The completed ride.
    pub ride: RideResponse,
    /// Bookings settled together with the ride.
    pub settled_bookings: Vec<String>,
}

impl From<&RideCompletion> for CompleteRideResponse {
    fn from(completion: &RideCompletion) -> Self {
        Self {
            ride: RideResponse::from(&completion.ride),
            settled_bookings: completion.settled.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Complete a ride and settle its confirmed bookings.
pub async fn complete_ride(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
) -> Result<Json<CompleteRideResponse>, ApiError> {
    let ride_id = id.parse::<RideId>()?;
    let completion = state.engine.complete_ride(&caller, ride_id).await?;
    Ok(Json(CompleteRideResponse::from(&completion)))
}
