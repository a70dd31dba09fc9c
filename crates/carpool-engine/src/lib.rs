//! Ride and booking lifecycle engine.
//!
//! [`LifecycleEngine`] is the single entry point for every mutation of users,
//! rides and bookings. Each ride-affecting call runs as one unit of work
//! under the ride's lock:
//!
//! 1. the store loads the ride and all of its bookings,
//! 2. the state machines in `carpool-core` compute the next state and the
//!    seat-inventory delta in memory,
//! 3. the unit commits atomically, or is dropped and leaves no trace.
//!
//! After a successful commit the engine hands an event to the
//! [`LedgerDispatcher`], which records it on the external ledger from a
//! spawned task. Ledger failures are logged and never reach the caller.
//!
//! [`Reporter`] serves the administrative read side.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod ledger;
pub mod reporting;

pub use engine::{LifecycleEngine, RideCompletion};
pub use ledger::{
    LedgerDispatcher, LedgerError, LedgerEvent, LedgerEventKind, LedgerRecorder, LedgerReference,
};
pub use reporting::{DashboardStats, Reporter, UserStats};
