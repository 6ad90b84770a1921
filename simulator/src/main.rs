use clap::Parser;
use station_simulator::config::SimulatorConfig;
use station_simulator::device::{create_router, run_push_loop, SimulatorState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = SimulatorConfig::parse();

    info!("Starting station simulator");
    info!(
        "Station: {}, port: {}, server: {}",
        config.station_id, config.port, config.server_url
    );

    let push_interval = config.push_interval_secs;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(SimulatorState::new(config));

    let push_handle = (push_interval > 0).then(|| {
        tokio::spawn(run_push_loop(
            state.clone(),
            Duration::from_secs(push_interval),
        ))
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Simulated device listening on {}", addr);

    tokio::select! {
        result = async { axum::serve(listener, create_router(state)).await } => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if let Some(handle) = push_handle {
        handle.abort();
    }
    info!("Shutting down");
    Ok(())
}
