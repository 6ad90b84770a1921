mod ingest;
mod query;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{Authorization, OriginPolicy, RegisteredAddressPolicy};
use crate::errors::ApiError;
use crate::metrics::{self, FORBIDDEN_REQUESTS_TOTAL};
use crate::model::Station;
use crate::store::Store;

pub const STATION_NOT_DEFINED: &str = "Station not defined";
pub const ORIGIN_MISMATCH: &str = "IP and ID not coherent";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub policy: Arc<dyn OriginPolicy>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            policy: Arc::new(RegisteredAddressPolicy),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn OriginPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Resolves a station for a write or watermark request: unknown is a 404.
    async fn station_or_404(&self, station_ref: &str) -> Result<Station, ApiError> {
        self.store
            .find_station(station_ref)
            .await?
            .ok_or_else(|| ApiError::NotFound(STATION_NOT_DEFINED.to_string()))
    }

    fn check_origin(&self, station: &Station, origin: Option<&str>) -> Result<(), ApiError> {
        match self.policy.authorize(station, origin) {
            Authorization::Allow => Ok(()),
            Authorization::Deny => {
                FORBIDDEN_REQUESTS_TOTAL.inc();
                warn!(
                    "Origin {} does not match station {}",
                    origin.unwrap_or("<unknown>"),
                    station.station_ref
                );
                Err(ApiError::Forbidden(ORIGIN_MISMATCH.to_string()))
            }
        }
    }
}

/// Station API routes, relative to the API prefix.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/stations/", get(query::list_stations))
        .route("/status/:id/", get(query::status))
        .route("/lastreport/:id/", get(query::last_report))
        .route("/history/:id/", get(query::history))
        .route("/minmax/history/:id/", get(query::minmax_history))
        .route("/lastupdate/:id/", get(query::last_update))
        .route("/weather/upload/", put(ingest::upload_weather))
        .route("/minmax/upload/", put(ingest::upload_minmax))
        .route("/status/upload/", put(ingest::upload_status))
        .with_state(state)
}

/// Full application: station API under `api_prefix`, plus health and metrics.
pub fn app(state: AppState, api_prefix: &str) -> Router {
    let api = create_router(state);
    let api = if api_prefix.is_empty() {
        api
    } else {
        Router::new().nest(api_prefix, api)
    };

    Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
