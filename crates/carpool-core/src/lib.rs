//! Core types and state machines for the carpool engine.
//!
//! This crate holds the domain model shared by every other crate:
//!
//! - **Identifiers**: `UserId`, `RideId`, `BookingId`
//! - **Users**: `User`, `UserProfile`, `Role`, `Caller`
//! - **Rides**: `Ride`, `NewRide`, `RideStatus` and the ride state machine
//! - **Bookings**: `Booking`, `BookingStatus` and the booking state machine
//! - **Inventory**: seat reservation and release, plus consistency audits
//! - **Pricing**: `PricingConfig`, `RouteEstimate`
//!
//! # Money
//!
//! Amounts are `i64` cents. A 350 km trip at 8.00/km split over 4 seats is
//! `70_000` cents per seat.
//!
//! # Inventory invariant
//!
//! For every ride, after every committed operation:
//!
//! ```text
//! seats_available == total_seats − Σ seats_booked(CONFIRMED bookings)
//! ```
//!
//! The fields that carry this invariant are only writable from inside this
//! crate, through `Booking::reserve`, `Booking::cancel` and `Ride::complete`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod booking;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod pricing;
pub mod ride;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use error::{ErrorKind, LifecycleError, Result};
pub use ids::{BookingId, IdError, RideId, UserId};
pub use inventory::InventoryAudit;
pub use pricing::{format_amount, KnownRoute, PricingConfig, RouteEstimate};
pub use ride::{Car, NewRide, Ride, RideStatus, MAX_SEATS, MIN_SEATS};
pub use user::{Caller, Role, User, UserProfile, INITIAL_RATING};
