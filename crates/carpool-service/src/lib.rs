//! Carpool HTTP API Service.
//!
//! This crate exposes the lifecycle engine over HTTP:
//!
//! - User registration and profiles
//! - Ride publishing, search and completion
//! - Seat booking, cancellation and completion
//! - Administrative reports and moderation
//!
//! # Authentication
//!
//! Every `/v1` route expects an HS256 JWT bearer token whose `sub` is the
//! user's UUID. The role is resolved from the registered profile on each
//! request and handed to the engine as a `Caller`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health handler is async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod routes;
pub mod state;

pub use auth::{Claims, TokenVerifier};
pub use config::{ConfigError, ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use ledger::{LedgerClient, LedgerClientError};
pub use routes::create_router;
pub use state::AppState;
