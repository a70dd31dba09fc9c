//! Error types for carpool storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// The backend failed in a way a retry may clear (pool exhaustion,
    /// dropped connection, serialization failure or deadlock).
    #[error("transient database error: {0}")]
    Transient(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`user`, `ride`, `booking`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The ride lock could not be acquired within the configured wait.
    #[error("timed out waiting for lock on ride {ride_id}")]
    LockTimeout {
        /// The contended ride.
        ride_id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for carpool_core::LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::LockTimeout { ride_id } => Self::Busy { ride_id },
            StoreError::Transient(msg) => Self::StorageUnavailable(msg),
            StoreError::Database(msg)
            | StoreError::Serialization(msg)
            | StoreError::Conflict(msg) => Self::Storage(msg),
        }
    }
}
