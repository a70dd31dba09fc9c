//! Application state.

use std::sync::Arc;
use std::time::Duration;

use carpool_engine::{LedgerRecorder, LifecycleEngine, Reporter};
use carpool_store::Store;

use crate::auth::TokenVerifier;
use crate::config::{ConfigError, ServiceConfig};
use crate::ledger::LedgerClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle engine.
    pub engine: LifecycleEngine,

    /// Admin reporting reads.
    pub reporter: Reporter,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Bearer-token verifier.
    pub verifier: TokenVerifier,

    /// External ledger client (optional).
    pub ledger: Option<Arc<LedgerClient>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingAuthSecret` if no signing secret is configured.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, ConfigError> {
        let verifier = TokenVerifier::new(
            config.auth_secret()?,
            &config.auth_issuer,
            &config.auth_audience,
        );

        let ledger = config
            .ledger_api_url
            .as_ref()
            .zip(config.ledger_api_key.as_ref())
            .and_then(|(url, key)| {
                let timeout = Duration::from_secs(config.ledger_timeout_seconds);
                match LedgerClient::new(url, key, timeout) {
                    Ok(client) => {
                        tracing::info!(ledger_url = %url, "External ledger enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create ledger client");
                        None
                    }
                }
            });

        if ledger.is_none() {
            tracing::warn!("Ledger not configured - lifecycle events will not be recorded");
        }

        let mut engine = LifecycleEngine::new(Arc::clone(&store), config.pricing.clone());
        if let Some(client) = &ledger {
            let recorder: Arc<dyn LedgerRecorder> = client.clone();
            engine = engine.with_ledger(recorder);
        }

        Ok(Self {
            engine,
            reporter: Reporter::new(store),
            config,
            verifier,
            ledger,
        })
    }

    /// Check if the external ledger is configured.
    #[must_use]
    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }
}
