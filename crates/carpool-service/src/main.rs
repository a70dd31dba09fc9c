//! Carpool Service - HTTP API for ride sharing
//!
//! This is the main entry point for the carpool service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carpool_service::{create_router, AppState, ServiceConfig, StoreBackend};
use carpool_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,carpool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Carpool Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        store_backend = ?config.store_backend,
        lock_timeout_ms = config.lock_timeout_ms,
        admins = config.admin_user_ids.len(),
        ledger_configured = %config.ledger_api_url.is_some(),
        "Service configuration loaded"
    );

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Refusing to start");
        return Err(e.into());
    }

    let store = open_store(&config).await?;

    // Build app state
    let state = AppState::new(store, config.clone())?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store - data is lost on restart");
            Ok(Arc::new(MemoryStore::with_lock_timeout(config.lock_timeout())))
        }
        #[cfg(feature = "rocksdb-backend")]
        StoreBackend::RocksDb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            let store = carpool_store::RocksStore::open_with_lock_timeout(
                &config.data_dir,
                config.lock_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres-backend")]
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres backend")?;
            tracing::info!("Connecting to PostgreSQL");
            let store = carpool_store::PostgresStore::connect(url, config.lock_timeout()).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(format!("store backend {other:?} is not compiled into this binary").into()),
    }
}
