use meteo_server::config::{Config, StoreBackend};
use meteo_server::metrics;
use meteo_server::rest::{self, AppState};
use meteo_server::store::{self, MemoryStore, PgStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting meteo server");
    info!("HTTP server: {}", config.http_addr);
    if !config.api_prefix.is_empty() {
        info!("API prefix: {}", config.api_prefix);
    }

    if let Err(e) = metrics::init_metrics() {
        warn!("Failed to register metrics: {}", e);
    }

    let store: Arc<dyn Store> = match &config.backend {
        StoreBackend::Postgres { url, max_connections } => {
            info!("Database: {}", url.split('@').last().unwrap_or("***"));
            match PgStore::connect(url, *max_connections).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    std::process::exit(1);
                }
            }
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    match store::register_missing(store.as_ref(), &config.bootstrap_stations).await {
        Ok(0) => {}
        Ok(count) => info!("Bootstrapped {} stations", count),
        Err(e) => {
            error!("Failed to bootstrap stations: {}", e);
            std::process::exit(1);
        }
    }

    let app = rest::app(AppState::new(store), &config.api_prefix);

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    let server = async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}
