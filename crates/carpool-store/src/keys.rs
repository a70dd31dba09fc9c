//! Key encoding for the `RocksDB` backend.

use carpool_core::{BookingId, RideId, UserId};

/// Key of a user record.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Key of a ride record.
#[must_use]
pub fn ride_key(ride_id: &RideId) -> Vec<u8> {
    ride_id.to_bytes().to_vec()
}

/// Key of a booking record.
#[must_use]
pub fn booking_key(booking_id: &BookingId) -> Vec<u8> {
    booking_id.to_bytes().to_vec()
}

/// Ride-booking index key.
///
/// Format: `ride_id (16 bytes) || booking_id (16 bytes)`. Bookings of a ride
/// sort by creation time under the ride's prefix.
#[must_use]
pub fn ride_booking_key(ride_id: &RideId, booking_id: &BookingId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&ride_id.to_bytes());
    key.extend_from_slice(&booking_id.to_bytes());
    key
}

/// Prefix covering every index entry of a ride.
#[must_use]
pub fn ride_bookings_prefix(ride_id: &RideId) -> Vec<u8> {
    ride_id.to_bytes().to_vec()
}

/// Booking id from a ride-booking index key, or `None` if the key is short.
#[must_use]
pub fn booking_id_from_index_key(key: &[u8]) -> Option<BookingId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(BookingId::from_bytes(bytes))
}
