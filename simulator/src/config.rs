use chrono::NaiveDate;
use clap::Parser;

fn parse_base_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|_| format!("expected YYYYMMDD, got {}", value))
}

/// Everything one simulated station needs; passed explicitly to startup.
#[derive(Debug, Clone, Parser)]
#[command(name = "station-simulator", about = "Simulated ESP32 weather station")]
pub struct SimulatorConfig {
    /// External station reference reported to the server
    #[arg(long, env = "STATION_ID", default_value = "esp32-001")]
    pub station_id: String,

    /// Port of the simulated device API
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Base URL of the station API, including its prefix
    #[arg(long, env = "SERVER_URL", default_value = "http://127.0.0.1:8000/api")]
    pub server_url: String,

    /// Day covered by the simulated readings (YYYYMMDD)
    #[arg(long, env = "BASE_DATE", default_value = "20250220", value_parser = parse_base_date)]
    pub base_date: NaiveDate,

    /// Push a fresh reading and status every N seconds (0 disables)
    #[arg(long, env = "PUSH_INTERVAL_SECS", default_value_t = 0)]
    pub push_interval_secs: u64,
}

impl SimulatorConfig {
    pub fn new(station_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            port: 5000,
            server_url: server_url.into(),
            base_date: NaiveDate::from_ymd_opt(2025, 2, 20).unwrap_or_default(),
            push_interval_secs: 0,
        }
    }
}
