//! Administrative handlers.
//!
//! Every handler here takes an [`AdminCaller`]; the engine and reporter
//! check the role again on their side.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use carpool_core::{
    format_amount, BookingStatus, InventoryAudit, RideId, RideStatus, Role, UserId,
};
use carpool_engine::{DashboardStats, UserStats};

use crate::auth::AdminCaller;
use crate::error::ApiError;
use crate::handlers::bookings::{booking_list, BookingResponse};
use crate::handlers::rides::{ride_list, RideResponse};
use crate::handlers::users::UserResponse;
use crate::state::AppState;

/// Dashboard response.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Raw counters.
    #[serde(flatten)]
    pub stats: DashboardStats,
    /// Revenue formatted with two decimals.
    pub total_revenue: String,
}

/// Platform-wide counters.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.reporter.dashboard(&caller).await?;
    let total_revenue = format_amount(stats.total_revenue_cents);
    Ok(Json(DashboardResponse {
        stats,
        total_revenue,
    }))
}

/// All users.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.reporter.users(&caller).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// Per-user activity.
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
) -> Result<Json<Vec<UserStats>>, ApiError> {
    Ok(Json(state.reporter.user_stats(&caller).await?))
}

/// Role change request.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    /// New role (`ORDINARY`, `USER` or `ADMIN`).
    pub role: String,
}

/// Change a user's role.
pub async fn set_role(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    Path(id): Path<String>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = id.parse::<UserId>()?;
    let role = body.role.parse::<Role>()?;
    let user = state.engine.set_role(&caller, user_id, role).await?;

    tracing::info!(admin_id = %caller.user_id, user_id = %user_id, role = %role, "Role changed");
    Ok(Json(UserResponse::from(&user)))
}

/// Delete a non-administrator user.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = id.parse::<UserId>()?;
    state.engine.delete_user(&caller, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Optional status filter.
#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    /// Status name, case-insensitive.
    pub status: Option<String>,
}

/// All rides, optionally filtered by status.
pub async fn list_rides(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<RideStatus>)
        .transpose()?;
    let rides = state.reporter.rides(&caller, status).await?;
    Ok(ride_list(&rides))
}

/// Delete a ride with no confirmed bookings.
pub async fn delete_ride(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ride_id = id.parse::<RideId>()?;
    state.engine.delete_ride(&caller, ride_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// All bookings, optionally filtered by status.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<BookingStatus>)
        .transpose()?;
    let bookings = state.reporter.bookings(&caller, status).await?;
    Ok(booking_list(&bookings))
}

/// Rides whose stored inventory disagrees with their confirmed bookings.
pub async fn inventory_audit(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
) -> Result<Json<Vec<InventoryAudit>>, ApiError> {
    Ok(Json(state.reporter.inventory_audit(&caller).await?))
}
