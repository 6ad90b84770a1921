use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Readings kept in device memory, one simulated day at 30 minute spacing
pub const MAX_READINGS: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub ts: String,
    pub tmp: f64,
    pub hum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxRecord {
    pub dt: String,
    pub tmin: f64,
    pub tmax: f64,
    pub hmin: f64,
    pub hmax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub upt: i64,
    pub mem: i64,
    pub wif: i32,
}

/// Readings held by the simulated device
#[derive(Debug, Clone)]
pub struct Dataset {
    pub weather: Vec<WeatherRecord>,
    pub minmax: Vec<MinMaxRecord>,
    pub status: SystemStatus,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn curve_temperature(hour: u32) -> f64 {
    18.0 + hour as f64 / 2.0
}

fn curve_humidity(hour: u32) -> f64 {
    40.0 + hour as f64 / 4.0
}

impl Dataset {
    /// A day of half-hourly readings on `base_date`, plus a week of daily
    /// min/max ending on it.
    pub fn simulated(base_date: NaiveDate) -> Self {
        let weather = (0..24)
            .flat_map(|hour| [0, 30].map(|minute| (hour, minute)))
            .filter_map(|(hour, minute)| {
                let ts = base_date.and_hms_opt(hour, minute, 0)?;
                Some(WeatherRecord {
                    ts: ts.format(TIMESTAMP_FORMAT).to_string(),
                    tmp: round1(curve_temperature(hour)),
                    hum: round1(curve_humidity(hour)),
                })
            })
            .collect();

        let minmax = (0..7u64)
            .filter_map(|i| {
                let day = base_date.checked_sub_days(Days::new(i))?;
                let i = i as f64;
                Some(MinMaxRecord {
                    dt: day.format(DATE_FORMAT).to_string(),
                    tmin: round1(14.0 + i * 0.2),
                    tmax: round1(28.0 + i * 0.3),
                    hmin: round1(37.0 + i * 0.4),
                    hmax: round1(53.0 + i * 0.5),
                })
            })
            .collect();

        Self {
            weather,
            minmax,
            status: SystemStatus {
                upt: 150000,
                mem: 220000,
                wif: -70,
            },
        }
    }

    pub fn latest_weather(&self) -> Option<&WeatherRecord> {
        self.weather.last()
    }

    /// Appends a live reading, dropping the oldest ones beyond [`MAX_READINGS`].
    pub fn record_reading(&mut self, reading: WeatherRecord) {
        self.weather.push(reading);
        let excess = self.weather.len().saturating_sub(MAX_READINGS);
        self.weather.drain(..excess);
    }
}

/// A live reading following the daily curve with some sensor noise.
pub fn generate_reading(rng: &mut impl Rng, now: NaiveDateTime) -> WeatherRecord {
    let hour = now.hour();
    WeatherRecord {
        ts: now.format(TIMESTAMP_FORMAT).to_string(),
        tmp: round1(curve_temperature(hour) + rng.gen_range(-0.5..0.5)),
        hum: round1((curve_humidity(hour) + rng.gen_range(-2.0..2.0)).clamp(0.0, 100.0)),
    }
}

pub fn generate_status(rng: &mut impl Rng, uptime_ms: i64) -> SystemStatus {
    SystemStatus {
        upt: uptime_ms,
        mem: rng.gen_range(200_000..240_000),
        wif: rng.gen_range(-80..-55),
    }
}
