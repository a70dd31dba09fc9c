//! Error types for ride and booking lifecycle operations.

use crate::booking::BookingStatus;
use crate::ids::{BookingId, IdError, RideId, UserId};
use crate::ride::RideStatus;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Broad classification of a [`LifecycleError`].
///
/// Transports map each kind onto a single response class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input failed validation.
    Validation,
    /// The current state forbids the operation.
    Conflict,
    /// The caller may not perform the operation.
    Authorization,
    /// A referenced entity does not exist.
    NotFound,
    /// Contention; the caller may retry.
    Retryable,
    /// Invariant violation or infrastructure failure.
    Internal,
}

/// Errors raised by the lifecycle state machines and the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    /// Seat count outside the permitted range.
    #[error("invalid seat count {seats}: must be between {min} and {max}")]
    InvalidSeatCount {
        /// The rejected count.
        seats: u32,
        /// Smallest accepted value.
        min: u32,
        /// Largest accepted value.
        max: u32,
    },

    /// Departure time is not in the future.
    #[error("departure time {departure_at} is not in the future")]
    InvalidSchedule {
        /// The rejected departure time.
        departure_at: chrono::DateTime<chrono::Utc>,
    },

    /// Generic input validation failure.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The passenger already holds a confirmed booking on the ride.
    #[error("passenger {passenger_id} already has a confirmed booking on ride {ride_id}")]
    DuplicateBooking {
        /// The ride.
        ride_id: RideId,
        /// The passenger.
        passenger_id: UserId,
    },

    /// Not enough free seats.
    #[error("insufficient seats: available={available}, requested={requested}")]
    InsufficientInventory {
        /// Seats currently free.
        available: u32,
        /// Seats asked for.
        requested: u32,
    },

    /// The ride does not accept bookings in its current status.
    #[error("ride {ride_id} is not open for booking (status {status})")]
    RideNotBookable {
        /// The ride.
        ride_id: RideId,
        /// Its current status.
        status: RideStatus,
    },

    /// The booking is already cancelled or completed.
    #[error("booking {booking_id} is already {status}")]
    AlreadyTerminal {
        /// The booking.
        booking_id: BookingId,
        /// Its terminal status.
        status: BookingStatus,
    },

    /// The booking must be confirmed for this operation.
    #[error("booking {booking_id} is {status}, expected CONFIRMED")]
    NotConfirmed {
        /// The booking.
        booking_id: BookingId,
        /// Its current status.
        status: BookingStatus,
    },

    /// The ride must be active for this operation.
    #[error("ride {ride_id} is {status}, expected ACTIVE")]
    NotActive {
        /// The ride.
        ride_id: RideId,
        /// Its current status.
        status: RideStatus,
    },

    /// The ride still has confirmed bookings.
    #[error("ride {ride_id} has {count} confirmed booking(s)")]
    ActiveBookingsExist {
        /// The ride.
        ride_id: RideId,
        /// Number of confirmed bookings.
        count: usize,
    },

    /// A profile already exists for this user.
    #[error("user {user_id} is already registered")]
    AlreadyRegistered {
        /// The user.
        user_id: UserId,
    },

    /// Administrator accounts cannot be deleted.
    #[error("user {user_id} is an administrator and cannot be deleted")]
    ProtectedAccount {
        /// The user.
        user_id: UserId,
    },

    /// A driver tried to book a seat on their own ride.
    #[error("drivers cannot book their own ride")]
    SelfBookingForbidden,

    /// Only the passenger who made the booking may do this.
    #[error("only the booking's passenger may perform this action")]
    NotOwner,

    /// Only the passenger or the ride's driver may do this.
    #[error("only the passenger or the driver may perform this action")]
    NotParticipant,

    /// Only the ride's driver may do this.
    #[error("only the ride's driver may perform this action")]
    NotDriver,

    /// The caller is not an administrator.
    #[error("administrator role required")]
    AdminRequired,

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`user`, `ride`, `booking`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The ride is locked by another operation for longer than the lock timeout.
    #[error("ride {ride_id} is busy, retry later")]
    Busy {
        /// The contended ride.
        ride_id: String,
    },

    /// Releasing seats would exceed the ride's capacity.
    #[error("inventory overflow on ride {ride_id}: {attempted} seats exceeds capacity {total}")]
    InventoryOverflow {
        /// The ride.
        ride_id: RideId,
        /// Total seats of the ride.
        total: u32,
        /// Seat count the release would have produced.
        attempted: u32,
    },

    /// The store could not serve the request right now.
    #[error("storage temporarily unavailable: {0}")]
    StorageUnavailable(String),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LifecycleError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSeatCount { .. } | Self::InvalidSchedule { .. } | Self::Validation(_) => {
                ErrorKind::Validation
            }
            Self::DuplicateBooking { .. }
            | Self::InsufficientInventory { .. }
            | Self::RideNotBookable { .. }
            | Self::AlreadyTerminal { .. }
            | Self::NotConfirmed { .. }
            | Self::NotActive { .. }
            | Self::ActiveBookingsExist { .. }
            | Self::AlreadyRegistered { .. }
            | Self::ProtectedAccount { .. } => ErrorKind::Conflict,
            Self::SelfBookingForbidden
            | Self::NotOwner
            | Self::NotParticipant
            | Self::NotDriver
            | Self::AdminRequired => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Busy { .. } | Self::StorageUnavailable(_) => ErrorKind::Retryable,
            Self::InventoryOverflow { .. } | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSeatCount { .. } => "invalid_seat_count",
            Self::InvalidSchedule { .. } => "invalid_schedule",
            Self::Validation(_) => "validation_failed",
            Self::DuplicateBooking { .. } => "duplicate_booking",
            Self::InsufficientInventory { .. } => "insufficient_inventory",
            Self::RideNotBookable { .. } => "ride_not_bookable",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::NotConfirmed { .. } => "not_confirmed",
            Self::NotActive { .. } => "not_active",
            Self::ActiveBookingsExist { .. } => "active_bookings_exist",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::ProtectedAccount { .. } => "protected_account",
            Self::SelfBookingForbidden => "self_booking_forbidden",
            Self::NotOwner => "not_owner",
            Self::NotParticipant => "not_participant",
            Self::NotDriver => "not_driver",
            Self::AdminRequired => "admin_required",
            Self::NotFound { .. } => "not_found",
            Self::Busy { .. } => "busy",
            Self::InventoryOverflow { .. } => "inventory_overflow",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Convenience constructor for [`LifecycleError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<IdError> for LifecycleError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}
