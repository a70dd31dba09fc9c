//! User registration and profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use carpool_core::{Role, User, UserProfile};

use crate::auth::{AuthCaller, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// User response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Role (`ORDINARY` or `ADMIN`).
    pub role: Role,
    /// Average rating.
    pub rating: f64,
    /// Completed rides.
    pub total_rides: u32,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            rating: user.rating,
            total_rides: user.total_rides,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
}

/// Register the profile of the authenticated subject.
pub async fn register(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = if state.config.is_admin(&auth.user_id) {
        Role::Admin
    } else {
        Role::Ordinary
    };

    let profile = UserProfile {
        name: body.name,
        email: body.email,
        phone: body.phone,
    };

    let user = state
        .engine
        .register_user(auth.user_id, profile, role)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Get the caller's profile.
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.engine.user(&caller.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}
