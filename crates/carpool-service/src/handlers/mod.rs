//! HTTP request handlers.

pub mod admin;
pub mod bookings;
pub mod health;
pub mod rides;
pub mod users;
