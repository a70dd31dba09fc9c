//! Service configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use carpool_core::{PricingConfig, UserId};

/// Configuration that cannot be served.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `AUTH_SECRET` is unset or blank.
    #[error("AUTH_SECRET must be set to a non-empty signing secret")]
    MissingAuthSecret,
}

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process tables, lost on restart.
    #[default]
    Memory,
    /// `RocksDB` under `data_dir`.
    RocksDb,
    /// PostgreSQL at `database_url`.
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Storage backend (default: memory).
    pub store_backend: StoreBackend,

    /// Path to `RocksDB` data directory (default: "/data/carpool").
    pub data_dir: String,

    /// PostgreSQL connection URL.
    pub database_url: Option<String>,

    /// How long a request waits for a ride lock, in milliseconds.
    pub lock_timeout_ms: u64,

    /// HS256 secret for bearer tokens. Required; there is no built-in key.
    pub auth_secret: Option<String>,

    /// Expected token issuer (default: "carpool-auth").
    pub auth_issuer: String,

    /// Expected token audience (default: "carpool").
    pub auth_audience: String,

    /// Users that always act as administrators.
    pub admin_user_ids: Vec<UserId>,

    /// External ledger API URL (optional).
    pub ledger_api_url: Option<String>,

    /// External ledger API key (optional).
    pub ledger_api_key: Option<String>,

    /// External ledger request timeout in seconds.
    pub ledger_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Pricing configuration.
    pub pricing: PricingConfig,
}

/// Ledger secrets file structure.
#[derive(Debug, Deserialize)]
struct LedgerSecrets {
    api_url: String,
    api_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (ledger_api_url, ledger_api_key) = load_ledger_secrets();

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse::<StoreBackend>().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Falling back to in-memory store");
                StoreBackend::Memory
            }),
            Err(_) => defaults.store_backend,
        };

        let mut pricing = defaults.pricing;
        if let Some(rate) = env_parse("RATE_PER_KM_CENTS") {
            pricing.rate_per_km_cents = checked_rate(rate, pricing.rate_per_km_cents);
        }

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            store_backend,
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            database_url: std::env::var("DATABASE_URL").ok(),
            lock_timeout_ms: env_parse("LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout_ms),
            auth_secret: std::env::var("AUTH_SECRET").ok(),
            auth_issuer: std::env::var("AUTH_ISSUER").unwrap_or(defaults.auth_issuer),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or(defaults.auth_audience),
            admin_user_ids: std::env::var("ADMIN_USER_IDS")
                .map(|ids| parse_user_ids(&ids))
                .unwrap_or_default(),
            ledger_api_url,
            ledger_api_key,
            ledger_timeout_seconds: env_parse("LEDGER_TIMEOUT_SECONDS")
                .unwrap_or(defaults.ledger_timeout_seconds),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            pricing,
        }
    }

    /// The configured signing secret.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingAuthSecret` if no non-blank secret is set.
    pub fn auth_secret(&self) -> Result<&str, ConfigError> {
        self.auth_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingAuthSecret)
    }

    /// Check that the configuration can be served.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth_secret().map(|_| ())
    }

    /// Ride lock wait as a `Duration`.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Whether `user_id` is a configured administrator.
    #[must_use]
    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.admin_user_ids.contains(user_id)
    }
}

/// Keep `current` unless `rate` is at least one cent per kilometre.
fn checked_rate(rate: i64, current: i64) -> i64 {
    if rate < 1 {
        tracing::warn!(rate, kept = current, "Ignoring RATE_PER_KM_CENTS below 1");
        current
    } else {
        rate
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a comma-separated list of user ids, skipping malformed entries.
fn parse_user_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(value = %s, "Ignoring malformed admin user id");
                None
            }
        })
        .collect()
}

/// Load ledger secrets from file or environment.
fn load_ledger_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/ledger.json",
        "carpool/.secrets/ledger.json",
        "../.secrets/ledger.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<LedgerSecrets>(path) {
            tracing::info!(path = %path, "Loaded ledger secrets from file");
            return (Some(secrets.api_url), Some(secrets.api_key));
        }
    }

    tracing::debug!("Ledger secrets file not found, using environment variables");
    (
        std::env::var("LEDGER_API_URL").ok(),
        std::env::var("LEDGER_API_KEY").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<T, std::io::Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            store_backend: StoreBackend::Memory,
            data_dir: "/data/carpool".into(),
            database_url: None,
            lock_timeout_ms: 2_000,
            auth_secret: None,
            auth_issuer: "carpool-auth".into(),
            auth_audience: "carpool".into(),
            admin_user_ids: Vec::new(),
            ledger_api_url: None,
            ledger_api_key: None,
            ledger_timeout_seconds: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            pricing: PricingConfig::default(),
        }
    }
}
