//! GET endpoints. Apart from the watermark, a missing station or missing
//! data is reported as `200` with an `error` body.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Local;

use super::AppState;
use crate::aggregate::{compute_daily_aggregates_from_samples, window_start, HISTORY_DAYS};
use crate::auth::Origin;
use crate::errors::ApiError;
use crate::model::{
    HistoryResponse, Lookup, MinMaxHistoryResponse, ReportResponse, Station, StationsResponse,
    StatusResponse, WatermarkResponse,
};
use crate::validate::format_timestamp;

pub const HISTORY_LIMIT: usize = 50;
/// Watermark reported for a station that has never uploaded a sample
pub const EMPTY_WATERMARK: &str = "19700101000000";

const STATION_NOT_FOUND: &str = "Station not found";
const NO_STATUS: &str = "No system status available";
const NO_WEATHER_DATA: &str = "No weather data available";

type LookupResult<T> = Result<Json<Lookup<T>>, ApiError>;

pub async fn list_stations(
    State(state): State<AppState>,
) -> Result<Json<StationsResponse>, ApiError> {
    let stations = state.store.list_stations().await?;
    Ok(Json(StationsResponse {
        stations: stations.iter().map(Station::to_entry).collect(),
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Path(station_ref): Path<String>,
) -> LookupResult<StatusResponse> {
    let Some(station) = state.store.find_station(&station_ref).await? else {
        return Ok(Json(Lookup::Missing { error: STATION_NOT_FOUND }));
    };

    let response = match state.store.latest_status(station.id).await? {
        Some(status) => Lookup::Found(StatusResponse {
            id: station_ref,
            ts: format_timestamp(&status.timestamp),
            upt: status.uptime_ms,
            mem: status.free_heap,
            wif: status.wifi_rssi,
        }),
        None => Lookup::Missing { error: NO_STATUS },
    };
    Ok(Json(response))
}

pub async fn last_report(
    State(state): State<AppState>,
    Path(station_ref): Path<String>,
) -> LookupResult<ReportResponse> {
    let Some(station) = state.store.find_station(&station_ref).await? else {
        return Ok(Json(Lookup::Missing { error: STATION_NOT_FOUND }));
    };

    let response = match state.store.latest_sample(station.id).await? {
        Some(sample) => {
            let entry = sample.to_entry();
            Lookup::Found(ReportResponse {
                id: station_ref,
                ts: entry.ts,
                tmp: entry.tmp,
                hum: entry.hum,
            })
        }
        None => Lookup::Missing {
            error: NO_WEATHER_DATA,
        },
    };
    Ok(Json(response))
}

pub async fn history(
    State(state): State<AppState>,
    Path(station_ref): Path<String>,
) -> LookupResult<HistoryResponse> {
    let Some(station) = state.store.find_station(&station_ref).await? else {
        return Ok(Json(Lookup::Missing { error: STATION_NOT_FOUND }));
    };

    let samples = state.store.recent_samples(station.id, HISTORY_LIMIT).await?;
    Ok(Json(Lookup::Found(HistoryResponse {
        id: station_ref,
        history: samples.iter().map(|s| s.to_entry()).collect(),
    })))
}

/// Min/max per day over the last week, derived from raw samples on every call.
/// Pushed aggregates are not consulted.
pub async fn minmax_history(
    State(state): State<AppState>,
    Path(station_ref): Path<String>,
) -> LookupResult<MinMaxHistoryResponse> {
    let Some(station) = state.store.find_station(&station_ref).await? else {
        return Ok(Json(Lookup::Missing { error: STATION_NOT_FOUND }));
    };

    let today = Local::now().date_naive();
    let samples = state
        .store
        .samples_since(station.id, window_start(today, HISTORY_DAYS))
        .await?;
    let aggregates = compute_daily_aggregates_from_samples(&samples, today, HISTORY_DAYS);

    Ok(Json(Lookup::Found(MinMaxHistoryResponse {
        id: station_ref,
        history: aggregates.iter().map(|a| a.to_entry()).collect(),
    })))
}

/// Timestamp of the newest sample, used by devices to decide whether to sync.
pub async fn last_update(
    State(state): State<AppState>,
    Path(station_ref): Path<String>,
    origin: Origin,
) -> Result<Json<WatermarkResponse>, ApiError> {
    let station = state.station_or_404(&station_ref).await?;
    state.check_origin(&station, origin.as_deref())?;

    let ts = match state.store.latest_sample(station.id).await? {
        Some(sample) => format_timestamp(&sample.timestamp),
        None => EMPTY_WATERMARK.to_string(),
    };
    Ok(Json(WatermarkResponse { id: station_ref, ts }))
}
