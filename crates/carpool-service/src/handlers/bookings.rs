//! Booking handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use carpool_core::{format_amount, Booking, BookingId, BookingStatus, RideId};

use crate::auth::AuthCaller;
use crate::error::ApiError;
use crate::state::AppState;

/// Booking response.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Booking ID.
    pub id: String,
    /// Ride ID.
    pub ride_id: String,
    /// Passenger user ID.
    pub passenger_id: String,
    /// Seats held.
    pub seats_booked: u32,
    /// Total amount in cents.
    pub total_amount_cents: i64,
    /// Total amount formatted with two decimals.
    pub total_amount: String,
    /// Booking status.
    pub status: BookingStatus,
    /// External ledger reference, once recorded.
    pub ledger_ref: Option<String>,
    /// Booking timestamp.
    pub booked_at: String,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id.to_string(),
            ride_id: booking.ride_id.to_string(),
            passenger_id: booking.passenger_id.to_string(),
            seats_booked: booking.seats_booked(),
            total_amount_cents: booking.total_amount_cents,
            total_amount: format_amount(booking.total_amount_cents),
            status: booking.status(),
            ledger_ref: booking.ledger_ref.clone(),
            booked_at: booking.booked_at.to_rfc3339(),
        }
    }
}

pub(crate) fn booking_list(bookings: &[Booking]) -> Json<Vec<BookingResponse>> {
    Json(bookings.iter().map(BookingResponse::from).collect())
}

/// Booking request.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    /// The ride to book.
    pub ride_id: String,
    /// Seats to reserve.
    pub seats: u32,
}

/// Reserve seats on a ride for the caller.
pub async fn book_ride(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Json(body): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let ride_id = body.ride_id.parse::<RideId>()?;
    let booking = state.engine.book_ride(&caller, ride_id, body.seats).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(&booking))))
}

/// The caller's bookings as a passenger.
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.engine.bookings_for_passenger(&caller).await?;
    Ok(booking_list(&bookings))
}

/// Bookings made on the caller's rides.
pub async fn passenger_bookings(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.engine.bookings_for_driver(&caller).await?;
    Ok(booking_list(&bookings))
}

/// Get a booking visible to the caller.
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = id.parse::<BookingId>()?;
    let booking = state.engine.booking(&caller, &booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// Cancel a booking and release its seats.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = id.parse::<BookingId>()?;
    let booking = state.engine.cancel_booking(&caller, booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// Mark a booking as completed.
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = id.parse::<BookingId>()?;
    let booking = state.engine.complete_booking(&caller, booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}
