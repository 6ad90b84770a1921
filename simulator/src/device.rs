//! The simulated device's own HTTP API, mirroring the firmware endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::SimulatorConfig;
use crate::sync::{sync_station, ServerClient};
use crate::telemetry::{generate_reading, generate_status, Dataset, TIMESTAMP_FORMAT};

pub struct SimulatorState {
    pub config: SimulatorConfig,
    pub dataset: RwLock<Dataset>,
    pub server: ServerClient,
    started: Instant,
}

impl SimulatorState {
    pub fn new(config: SimulatorConfig) -> Self {
        let server = ServerClient::new(config.server_url.clone());
        Self::with_client(config, server)
    }

    pub fn with_client(config: SimulatorConfig, server: ServerClient) -> Self {
        let dataset = Dataset::simulated(config.base_date);
        Self {
            config,
            dataset: RwLock::new(dataset),
            server,
            started: Instant::now(),
        }
    }

    fn owns(&self, station_id: &str) -> bool {
        self.config.station_id == station_id
    }
}

pub fn create_router(state: Arc<SimulatorState>) -> Router {
    Router::new()
        .route("/api/status/:id/", get(status))
        .route("/api/lastreport/:id/", get(last_report))
        .route("/api/history/:id/", get(history))
        .route("/api/minmax/history/:id/", get(minmax_history))
        .route("/api/lastupdate/:id/", get(last_update))
        .route("/api/sync/", get(sync_default))
        .route("/api/sync/:id/", get(sync))
        .with_state(state)
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

async fn status(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    if !state.owns(&id) {
        return not_found("Station not found");
    }
    let status = state.dataset.read().await.status;
    Json(json!({
        "id": id,
        "upt": status.upt,
        "mem": status.mem,
        "wif": status.wif,
    }))
    .into_response()
}

async fn last_report(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    let dataset = state.dataset.read().await;
    match dataset.latest_weather().filter(|_| state.owns(&id)) {
        Some(record) => Json(json!({
            "id": id,
            "ts": record.ts,
            "tmp": record.tmp,
            "hum": record.hum,
        }))
        .into_response(),
        None => not_found("No weather data available"),
    }
}

async fn history(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    if !state.owns(&id) {
        return not_found("No history found");
    }
    let dataset = state.dataset.read().await;
    Json(json!({"id": id, "history": dataset.weather})).into_response()
}

async fn minmax_history(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    if !state.owns(&id) {
        return not_found("No min/max data available");
    }
    let dataset = state.dataset.read().await;
    Json(json!({"id": id, "history": dataset.minmax})).into_response()
}

async fn last_update(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    let dataset = state.dataset.read().await;
    match dataset.latest_weather().filter(|_| state.owns(&id)) {
        Some(record) => Json(json!({"ts": record.ts})).into_response(),
        None => not_found("No weather data found"),
    }
}

async fn sync_default(State(state): State<Arc<SimulatorState>>) -> Response {
    let station_id = state.config.station_id.clone();
    run_sync(&state, station_id).await
}

async fn sync(
    State(state): State<Arc<SimulatorState>>,
    Path(id): Path<String>,
) -> Response {
    run_sync(&state, id).await
}

async fn run_sync(state: &SimulatorState, station_id: String) -> Response {
    info!("Sync triggered for station {}", station_id);

    // Only this device's own status is known
    let status = if state.owns(&station_id) {
        let ts = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        Some((ts, state.dataset.read().await.status))
    } else {
        None
    };

    match sync_station(&state.server, &station_id, status).await {
        Ok(report) if report.synced_anything() => Json(json!({
            "msg": format!("Sync completed for {}", station_id),
        }))
        .into_response(),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Sync failed for {}: {:#}", station_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch last update timestamp"})),
            )
                .into_response()
        }
    }
}

/// Uploads a fresh reading and status every `interval`, as a deployed
/// station would. Runs until the task is dropped.
pub async fn run_push_loop(state: Arc<SimulatorState>, interval: Duration) {
    info!(
        "Pushing readings for {} every {:?}",
        state.config.station_id, interval
    );
    let mut ticker = tokio::time::interval(interval);
    let mut pushed = 0u64;

    loop {
        ticker.tick().await;

        let now = Local::now().naive_local();
        let (reading, status) = {
            let mut rng = rand::thread_rng();
            let uptime = state.started.elapsed().as_millis() as i64 + rng.gen_range(0..1000);
            (generate_reading(&mut rng, now), generate_status(&mut rng, uptime))
        };

        {
            let mut dataset = state.dataset.write().await;
            dataset.record_reading(reading.clone());
            dataset.status = status;
        }

        let station_id = &state.config.station_id;
        match state
            .server
            .upload_weather(station_id, std::slice::from_ref(&reading))
            .await
        {
            Ok(code) if code.is_success() => {
                pushed += 1;
                if pushed % 60 == 0 {
                    info!("Pushed {} readings", pushed);
                }
            }
            Ok(code) => warn!("Reading rejected by server: HTTP {}", code),
            Err(e) => warn!("Failed to push reading: {:#}", e),
        }

        let ts = now.format(TIMESTAMP_FORMAT).to_string();
        if let Err(e) = state.server.upload_status(station_id, &ts, status).await {
            warn!("Failed to push status: {:#}", e);
        }
    }
}
