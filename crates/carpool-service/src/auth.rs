//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - a verified bearer token, registered or not
//! - `AuthCaller` - a registered user, carried into the engine as a `Caller`
//! - `AdminCaller` - a registered administrator

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use carpool_core::{Caller, Role, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims accepted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    pub iat: i64,
}

/// HS256 bearer-token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })?;

        data.claims.sub.parse::<UserId>().map_err(|_| {
            tracing::debug!(sub = %data.claims.sub, "JWT subject is not a user id");
            ApiError::Unauthorized
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

/// A verified token subject. The user may not be registered yet.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user_id = state.verifier.verify(token)?;
        Ok(Self { user_id })
    }
}

/// A registered user acting on their own behalf.
///
/// The role comes from the stored profile. Users listed in `ADMIN_USER_IDS`
/// always act as administrators.
#[derive(Debug, Clone, Copy)]
pub struct AuthCaller(pub Caller);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user_id } = AuthUser::from_request_parts(parts, state).await?;
        let user = state.engine.user(&user_id).await?;

        let mut caller = user.as_caller();
        if state.config.is_admin(&user_id) {
            caller.role = Role::Admin;
        }

        Ok(Self(caller))
    }
}

/// A registered administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller(pub Caller);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthCaller(caller) = AuthCaller::from_request_parts(parts, state).await?;
        caller.require_admin()?;

        tracing::info!(admin_id = %caller.user_id, "Admin authenticated");
        Ok(Self(caller))
    }
}
