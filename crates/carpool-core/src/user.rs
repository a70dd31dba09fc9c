//! User profiles, roles and the caller capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, Result};
use crate::ids::UserId;

/// Rating assigned to every newly registered user.
pub const INITIAL_RATING: f64 = 5.0;

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A regular rider or driver.
    #[default]
    #[serde(alias = "USER")]
    Ordinary,
    /// An administrator.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordinary => f.write_str("ORDINARY"),
            Self::Admin => f.write_str("ADMIN"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORDINARY" | "USER" => Ok(Self::Ordinary),
            "ADMIN" => Ok(Self::Admin),
            other => Err(LifecycleError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Registration input for a user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone number.
    pub phone: String,
}

impl UserProfile {
    /// Validate and normalize the profile fields.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Validation` for a blank name or phone
    /// or a malformed email address.
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_ascii_lowercase();
        let phone = self.phone.trim().to_string();

        if name.is_empty() {
            return Err(LifecycleError::Validation("name must not be blank".into()));
        }
        if phone.is_empty() {
            return Err(LifecycleError::Validation("phone must not be blank".into()));
        }
        if !is_valid_email(&email) {
            return Err(LifecycleError::Validation(format!(
                "invalid email address: {email}"
            )));
        }

        Ok(Self { name, email, phone })
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider subject.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email (lowercased).
    pub email: String,
    /// Contact phone number.
    pub phone: String,
    /// Current role.
    pub role: Role,
    /// Average rating, starting at [`INITIAL_RATING`].
    pub rating: f64,
    /// Lifetime ride count.
    pub total_rides: u32,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user from a validated profile.
    #[must_use]
    pub fn new(id: UserId, profile: UserProfile, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            role,
            rating: INITIAL_RATING,
            total_rides: 0,
            created_at: now,
        }
    }

    /// The capability this user acts with.
    #[must_use]
    pub const fn as_caller(&self) -> Caller {
        Caller {
            user_id: self.id,
            role: self.role,
        }
    }
}

/// The authenticated principal behind an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Who is calling.
    pub user_id: UserId,
    /// Role resolved at authentication time.
    pub role: Role,
}

impl Caller {
    /// Build a caller with the ordinary role.
    #[must_use]
    pub const fn ordinary(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Ordinary,
        }
    }

    /// Build a caller with the admin role.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Whether the caller holds the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Fail unless the caller is an administrator.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::AdminRequired` otherwise.
    pub const fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(LifecycleError::AdminRequired)
        }
    }
}

/// Basic structural email check.
fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 255 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    let domain_ok = domain
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'));

    local_ok && domain_ok
}
