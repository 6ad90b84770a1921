//! PUT endpoints used by stations to push readings.
//!
//! Every upload goes through the same steps: parse JSON, resolve the `id`
//! station, check the request origin, validate the payload, then write.
//! A batch is validated completely before anything is written.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{info, warn};

use super::AppState;
use crate::auth::Origin;
use crate::errors::{ApiError, Error};
use crate::metrics::{
    AGGREGATES_WRITTEN_TOTAL, REJECTED_UPLOADS_TOTAL, SAMPLES_WRITTEN_TOTAL, STATUS_REPORTS_TOTAL,
};
use crate::model::{
    AggregateRecord, DailyAggregate, NewSample, SampleRecord, Station, StatusUpload,
    UploadResponse,
};
use crate::validate::{validate_aggregate, validate_sample, validate_status};

type UploadResult = Result<(StatusCode, Json<UploadResponse>), ApiError>;

pub async fn upload_weather(
    State(state): State<AppState>,
    origin: Origin,
    body: Bytes,
) -> UploadResult {
    ingest_weather(&state, origin, &body)
        .await
        .map_err(|e| rejected("weather", e))
}

pub async fn upload_minmax(
    State(state): State<AppState>,
    origin: Origin,
    body: Bytes,
) -> UploadResult {
    ingest_minmax(&state, origin, &body)
        .await
        .map_err(|e| rejected("minmax", e))
}

pub async fn upload_status(
    State(state): State<AppState>,
    origin: Origin,
    body: Bytes,
) -> UploadResult {
    ingest_status(&state, origin, &body)
        .await
        .map_err(|e| rejected("status", e))
}

async fn ingest_weather(state: &AppState, origin: Origin, body: &[u8]) -> UploadResult {
    let payload = parse_body(body)?;
    let station = authorized_station(state, &payload, &origin).await?;

    let records: Vec<SampleRecord> = data_records(&payload)?;
    let samples = records
        .iter()
        .map(validate_sample)
        .collect::<Result<Vec<NewSample>, Error>>()?;

    let count = state.store.insert_samples(station.id, &samples).await?;
    SAMPLES_WRITTEN_TOTAL.inc_by(count as f64);
    info!("Stored {} weather samples for {}", count, station.station_ref);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            msg: "Weather data received",
            count: Some(count),
        }),
    ))
}

async fn ingest_minmax(state: &AppState, origin: Origin, body: &[u8]) -> UploadResult {
    let payload = parse_body(body)?;
    let station = authorized_station(state, &payload, &origin).await?;

    let records: Vec<AggregateRecord> = data_records(&payload)?;
    let aggregates = records
        .iter()
        .map(validate_aggregate)
        .collect::<Result<Vec<DailyAggregate>, Error>>()?;

    let count = state
        .store
        .upsert_daily_aggregates(station.id, &aggregates)
        .await?;
    AGGREGATES_WRITTEN_TOTAL.inc_by(count as f64);
    info!("Stored {} daily aggregates for {}", count, station.station_ref);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            msg: "Min/Max data received",
            count: Some(count),
        }),
    ))
}

async fn ingest_status(state: &AppState, origin: Origin, body: &[u8]) -> UploadResult {
    let payload = parse_body(body)?;
    let station = authorized_station(state, &payload, &origin).await?;

    let upload: StatusUpload = serde_json::from_value(payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid status payload: {}", e)))?;
    let status = validate_status(&upload)?;

    state.store.insert_status(station.id, &status).await?;
    STATUS_REPORTS_TOTAL.inc();
    info!("Stored status for {}", station.station_ref);

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            msg: "System status updated",
            count: None,
        }),
    ))
}

fn rejected(kind: &str, err: ApiError) -> ApiError {
    if !matches!(err, ApiError::Forbidden(_)) {
        REJECTED_UPLOADS_TOTAL.inc();
    }
    warn!("Rejected {} upload ({}): {}", kind, err.status(), err);
    err
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid JSON".to_string()))
}

async fn authorized_station(
    state: &AppState,
    payload: &Value,
    origin: &Origin,
) -> Result<Station, ApiError> {
    let station_ref = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("Missing station id".to_string()))?;

    let station = state.station_or_404(station_ref).await?;
    state.check_origin(&station, origin.as_deref())?;
    Ok(station)
}

fn data_records<T: DeserializeOwned>(payload: &Value) -> Result<Vec<T>, ApiError> {
    let data = match payload.get("data") {
        Some(data @ Value::Array(_)) => data,
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid data format. Expected a list.".to_string(),
            ))
        }
    };
    Vec::<T>::deserialize(data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid record: {}", e)))
}
