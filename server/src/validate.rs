use chrono::{NaiveDate, NaiveDateTime};

use crate::errors::{Error, Result};
use crate::model::{
    AggregateRecord, DailyAggregate, NewSample, NewStatus, SampleRecord, StatusUpload,
};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const DATE_FORMAT: &str = "%Y%m%d";

const TIMESTAMP_LEN: usize = 14;
const DATE_LEN: usize = 8;

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a `YYYYMMDDHHMMSS` instant. Separators, padding or extra digits are rejected.
pub fn parse_timestamp(ts: &str) -> Result<NaiveDateTime> {
    if !all_digits(ts, TIMESTAMP_LEN) {
        return Err(Error::Validation(format!("Invalid timestamp format: {}", ts)));
    }
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .map_err(|_| Error::Validation(format!("Invalid timestamp format: {}", ts)))
}

/// Parses a `YYYYMMDD` calendar date.
pub fn parse_date(dt: &str) -> Result<NaiveDate> {
    if !all_digits(dt, DATE_LEN) {
        return Err(Error::Validation(format!("Invalid date format: {}", dt)));
    }
    NaiveDate::parse_from_str(dt, DATE_FORMAT)
        .map_err(|_| Error::Validation(format!("Invalid date format: {}", dt)))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(day: &NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

pub fn round_one_decimal(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Rounds a reading to one decimal; values that do not fit an `f32` are rejected.
fn reading(value: f64) -> Result<f32> {
    let rounded = ((value * 10.0).round() / 10.0) as f32;
    if rounded.is_finite() {
        Ok(rounded)
    } else {
        Err(Error::Validation(format!("Invalid reading: {}", value)))
    }
}

pub fn validate_sample(record: &SampleRecord) -> Result<NewSample> {
    Ok(NewSample {
        timestamp: parse_timestamp(&record.ts)?,
        temperature: reading(record.tmp)?,
        humidity: reading(record.hum)?,
    })
}

pub fn validate_aggregate(record: &AggregateRecord) -> Result<DailyAggregate> {
    Ok(DailyAggregate {
        day: parse_date(&record.dt)?,
        min_temperature: reading(record.tmin)?,
        max_temperature: reading(record.tmax)?,
        min_humidity: reading(record.hmin)?,
        max_humidity: reading(record.hmax)?,
    })
}

pub fn validate_status(upload: &StatusUpload) -> Result<NewStatus> {
    Ok(NewStatus {
        timestamp: parse_timestamp(&upload.ts)?,
        uptime_ms: upload.upt,
        free_heap: upload.mem,
        wifi_rssi: upload.wif,
    })
}
