//! Ledger API request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/records`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRecordRequest<'a> {
    /// The record to append.
    pub record: RecordInput<'a>,
}

/// A record to append to the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct RecordInput<'a> {
    /// Event kind (`ride_created`, `booking_confirmed`, `booking_cancelled`).
    pub kind: &'a str,
    /// Event payload.
    pub payload: &'a serde_json::Value,
}

/// Response wrapper for a stored record.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordResponse {
    /// The stored record.
    pub record: Record,
}

/// A stored ledger record.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    /// Opaque reference assigned by the ledger.
    pub reference: String,
    /// When the ledger accepted the record.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Ledger API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerErrorResponse {
    /// Status code.
    pub status: u16,
    /// Error type.
    pub error: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Error details.
    #[serde(default)]
    pub error_details: Option<serde_json::Value>,
}
