//! Column families of the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User profiles, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Rides, keyed by `ride_id` (ULID).
    pub const RIDES: &str = "rides";

    /// Bookings, keyed by `booking_id` (ULID).
    pub const BOOKINGS: &str = "bookings";

    /// Index: bookings by ride, keyed by `ride_id || booking_id`.
    /// Value is empty (index only).
    pub const BOOKINGS_BY_RIDE: &str = "bookings_by_ride";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::USERS, cf::RIDES, cf::BOOKINGS, cf::BOOKINGS_BY_RIDE]
}
