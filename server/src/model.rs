use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::{format_date, format_timestamp, round_one_decimal};

/// A registered weather station
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Station {
    pub id: i64,
    pub station_ref: String,
    pub name: String,
    pub location: Option<String>,
    /// Network origin the station is expected to call from, e.g. `http://192.168.1.20:5000`
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStation {
    pub station_ref: String,
    pub name: String,
    pub location: Option<String>,
    pub address: Option<String>,
}

impl NewStation {
    pub fn new(station_ref: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            station_ref: station_ref.into(),
            name: name.into(),
            location: None,
            address: None,
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Temperature/humidity reading stamped with the device clock
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeatherSample {
    pub station_id: i64,
    pub timestamp: NaiveDateTime,
    pub temperature: f32,
    pub humidity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewSample {
    pub timestamp: NaiveDateTime,
    pub temperature: f32,
    pub humidity: f32,
}

/// Per-day min/max summary, either pushed by a device or derived from samples
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct DailyAggregate {
    pub day: NaiveDate,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub min_humidity: f32,
    pub max_humidity: f32,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StatusSnapshot {
    pub station_id: i64,
    pub timestamp: NaiveDateTime,
    pub uptime_ms: i64,
    pub free_heap: i64,
    pub wifi_rssi: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewStatus {
    pub timestamp: NaiveDateTime,
    pub uptime_ms: i64,
    pub free_heap: i64,
    pub wifi_rssi: i32,
}

// Inbound payloads

#[derive(Debug, Deserialize)]
pub struct SampleRecord {
    pub ts: String,
    pub tmp: f64,
    pub hum: f64,
}

#[derive(Debug, Deserialize)]
pub struct AggregateRecord {
    pub dt: String,
    pub tmin: f64,
    pub tmax: f64,
    pub hmin: f64,
    pub hmax: f64,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpload {
    pub ts: String,
    pub upt: i64,
    pub mem: i64,
    pub wif: i32,
}

// Outbound payloads

#[derive(Debug, Serialize)]
pub struct StationEntry {
    pub id: String,
    pub name: String,
    pub loc: Option<String>,
    pub created: String,
}

#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub stations: Vec<StationEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub ts: String,
    pub upt: i64,
    pub mem: i64,
    pub wif: i32,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub ts: String,
    pub tmp: f32,
    pub hum: f32,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub ts: String,
    pub tmp: f32,
    pub hum: f32,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct MinMaxEntry {
    pub dt: String,
    pub tmin: f32,
    pub tmax: f32,
    pub hmin: f32,
    pub hmax: f32,
}

#[derive(Debug, Serialize)]
pub struct MinMaxHistoryResponse {
    pub id: String,
    pub history: Vec<MinMaxEntry>,
}

#[derive(Debug, Serialize)]
pub struct WatermarkResponse {
    pub id: String,
    pub ts: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub msg: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Read endpoints answer `200` either way; a miss carries an `error` body.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Found(T),
    Missing { error: &'static str },
}

impl Station {
    pub fn to_entry(&self) -> StationEntry {
        StationEntry {
            id: self.station_ref.clone(),
            name: self.name.clone(),
            loc: self.location.clone(),
            created: format_timestamp(&self.created_at.with_timezone(&Local).naive_local()),
        }
    }
}

impl WeatherSample {
    pub fn to_entry(&self) -> HistoryEntry {
        HistoryEntry {
            ts: format_timestamp(&self.timestamp),
            tmp: round_one_decimal(self.temperature),
            hum: round_one_decimal(self.humidity),
        }
    }
}

impl DailyAggregate {
    /// Shapes a pushed or derived aggregate for the wire
    pub fn to_entry(&self) -> MinMaxEntry {
        MinMaxEntry {
            dt: format_date(&self.day),
            tmin: round_one_decimal(self.min_temperature),
            tmax: round_one_decimal(self.max_temperature),
            hmin: round_one_decimal(self.min_humidity),
            hmax: round_one_decimal(self.max_humidity),
        }
    }
}
