//! Ledger API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use carpool_engine::{LedgerError, LedgerEventKind, LedgerRecorder, LedgerReference};

use super::types::{CreateRecordRequest, LedgerErrorResponse, RecordInput, RecordResponse};

/// Error type for ledger HTTP operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ledger API returned an error.
    #[error("Ledger API error: {status} - {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        error: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LedgerClientError {
    /// Whether the ledger could not be reached or failed on its side.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Serialization(_) | Self::Configuration(_) => false,
        }
    }
}

impl From<LedgerClientError> for LedgerError {
    fn from(err: LedgerClientError) -> Self {
        if err.is_unavailable() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Rejected(err.to_string())
        }
    }
}

/// External ledger API client.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Ledger API URL (e.g., `"http://localhost:4000"`)
    /// * `api_key` - Ledger API key
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerClientError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(LedgerClientError::Configuration(
                "ledger base URL is empty".into(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// The configured base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append a record and return the reference the ledger assigned.
    pub async fn create_record(
        &self,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<String, LedgerClientError> {
        let url = format!("{}/api/v1/records", self.base_url);
        let request = CreateRecordRequest {
            record: RecordInput { kind, payload },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        self.handle_response::<RecordResponse>(response)
            .await
            .map(|r| r.record.reference)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, LedgerClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<LedgerErrorResponse, _> = response.json().await;

        match error_body {
            Ok(ledger_error) => {
                let error_msg = if let Some(details) = &ledger_error.error_details {
                    format!("{} - details: {}", ledger_error.error, details)
                } else {
                    ledger_error.error
                };
                Err(LedgerClientError::Api {
                    status: ledger_error.status,
                    error: error_msg,
                    code: ledger_error.code,
                })
            }
            Err(_) => Err(LedgerClientError::Api {
                status: status.as_u16(),
                error: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl LedgerRecorder for LedgerClient {
    async fn record(
        &self,
        kind: LedgerEventKind,
        payload: &serde_json::Value,
    ) -> Result<LedgerReference, LedgerError> {
        let reference = self.create_record(kind.as_str(), payload).await?;
        Ok(LedgerReference::new(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client =
            LedgerClient::new("http://ledger.local/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://ledger.local");
    }

    #[test]
    fn rejects_empty_url() {
        let err = LedgerClient::new("  ", "key", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, LedgerClientError::Configuration(_)));
    }

    #[test]
    fn server_errors_are_unavailable() {
        let err = LedgerClientError::Api {
            status: 503,
            error: "down".into(),
            code: None,
        };
        assert!(matches!(LedgerError::from(err), LedgerError::Unavailable(_)));

        let err = LedgerClientError::Api {
            status: 422,
            error: "bad payload".into(),
            code: Some("invalid".into()),
        };
        assert!(matches!(LedgerError::from(err), LedgerError::Rejected(_)));
    }
}
