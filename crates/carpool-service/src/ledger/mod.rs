//! External ledger integration.
//!
//! Ride creations and booking confirmations or cancellations are appended to
//! an external, append-only ledger for auditing. The engine dispatches them
//! after commit; this module provides the HTTP recorder it calls.

pub mod client;
pub mod types;

pub use client::{LedgerClient, LedgerClientError};
pub use types::*;
