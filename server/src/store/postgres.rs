use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

use super::Store;
use crate::errors::{Error, Result};
use crate::metrics::STORE_WRITE_SECONDS;
use crate::model::{
    DailyAggregate, NewSample, NewStation, NewStatus, Station, StatusSnapshot, WeatherSample,
};

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        Ok(Self::new(make_pool(database_url, max_connections).await?))
    }
}

const STATION_COLUMNS: &str = "id, station_ref, name, location, address, created_at";

#[async_trait]
impl Store for PgStore {
    async fn find_station(&self, station_ref: &str) -> Result<Option<Station>> {
        let query = format!("SELECT {} FROM stations WHERE station_ref = $1", STATION_COLUMNS);
        let station = sqlx::query_as::<_, Station>(&query)
            .bind(station_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(station)
    }

    async fn list_stations(&self) -> Result<Vec<Station>> {
        let query = format!("SELECT {} FROM stations ORDER BY id", STATION_COLUMNS);
        let stations = sqlx::query_as::<_, Station>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(stations)
    }

    async fn create_station(&self, station: NewStation) -> Result<Station> {
        let query = format!(
            "INSERT INTO stations (station_ref, name, location, address)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            STATION_COLUMNS
        );
        sqlx::query_as::<_, Station>(&query)
            .bind(&station.station_ref)
            .bind(&station.name)
            .bind(&station.location)
            .bind(&station.address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    Error::DuplicateStation(station.station_ref.clone())
                }
                other => Error::Database(other),
            })
    }

    async fn insert_samples(&self, station_id: i64, samples: &[NewSample]) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }

        let timer = STORE_WRITE_SECONDS.start_timer();
        let timestamps: Vec<NaiveDateTime> = samples.iter().map(|s| s.timestamp).collect();
        let temperatures: Vec<f32> = samples.iter().map(|s| s.temperature).collect();
        let humidities: Vec<f32> = samples.iter().map(|s| s.humidity).collect();

        // One statement, so the batch commits or fails as a whole
        let query = r#"
            INSERT INTO weather_samples (station_id, ts, temperature, humidity)
            SELECT $1, * FROM UNNEST($2::timestamp[], $3::float4[], $4::float4[])
            "#;

        let result = sqlx::query(query)
            .bind(station_id)
            .bind(&timestamps)
            .bind(&temperatures)
            .bind(&humidities)
            .execute(&self.pool)
            .await?;
        timer.observe_duration();

        debug!("Inserted {} samples for station {}", result.rows_affected(), station_id);
        Ok(result.rows_affected() as usize)
    }

    async fn latest_sample(&self, station_id: i64) -> Result<Option<WeatherSample>> {
        let sample = sqlx::query_as::<_, WeatherSample>(
            "SELECT station_id, ts AS timestamp, temperature, humidity
             FROM weather_samples
             WHERE station_id = $1
             ORDER BY ts DESC, id DESC
             LIMIT 1",
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sample)
    }

    async fn recent_samples(&self, station_id: i64, limit: usize) -> Result<Vec<WeatherSample>> {
        let samples = sqlx::query_as::<_, WeatherSample>(
            "SELECT station_id, ts AS timestamp, temperature, humidity
             FROM weather_samples
             WHERE station_id = $1
             ORDER BY ts DESC, id DESC
             LIMIT $2",
        )
        .bind(station_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(samples)
    }

    async fn samples_since(
        &self,
        station_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<WeatherSample>> {
        let samples = sqlx::query_as::<_, WeatherSample>(
            "SELECT station_id, ts AS timestamp, temperature, humidity
             FROM weather_samples
             WHERE station_id = $1 AND ts >= $2
             ORDER BY ts ASC",
        )
        .bind(station_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(samples)
    }

    async fn sample_count(&self, station_id: i64) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM weather_samples WHERE station_id = $1")
                .bind(station_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn upsert_daily_aggregates(
        &self,
        station_id: i64,
        aggregates: &[DailyAggregate],
    ) -> Result<usize> {
        if aggregates.is_empty() {
            return Ok(0);
        }

        let timer = STORE_WRITE_SECONDS.start_timer();
        let mut tx = self.pool.begin().await?;

        // Row by row: a batch may name the same day twice and the later record wins
        for aggregate in aggregates {
            sqlx::query(
                "INSERT INTO daily_aggregates
                    (station_id, day, min_temperature, max_temperature, min_humidity, max_humidity)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (station_id, day) DO UPDATE SET
                    min_temperature = EXCLUDED.min_temperature,
                    max_temperature = EXCLUDED.max_temperature,
                    min_humidity = EXCLUDED.min_humidity,
                    max_humidity = EXCLUDED.max_humidity",
            )
            .bind(station_id)
            .bind(aggregate.day)
            .bind(aggregate.min_temperature)
            .bind(aggregate.max_temperature)
            .bind(aggregate.min_humidity)
            .bind(aggregate.max_humidity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.observe_duration();

        Ok(aggregates.len())
    }

    async fn daily_aggregates(
        &self,
        station_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<DailyAggregate>> {
        let aggregates = sqlx::query_as::<_, DailyAggregate>(
            "SELECT day, min_temperature, max_temperature, min_humidity, max_humidity
             FROM daily_aggregates
             WHERE station_id = $1 AND day >= $2
             ORDER BY day DESC",
        )
        .bind(station_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(aggregates)
    }

    async fn insert_status(&self, station_id: i64, status: &NewStatus) -> Result<()> {
        sqlx::query(
            "INSERT INTO status_snapshots (station_id, ts, uptime_ms, free_heap, wifi_rssi)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(station_id)
        .bind(status.timestamp)
        .bind(status.uptime_ms)
        .bind(status.free_heap)
        .bind(status.wifi_rssi)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_status(&self, station_id: i64) -> Result<Option<StatusSnapshot>> {
        let status = sqlx::query_as::<_, StatusSnapshot>(
            "SELECT station_id, ts AS timestamp, uptime_ms, free_heap, wifi_rssi
             FROM status_snapshots
             WHERE station_id = $1
             ORDER BY ts DESC, id DESC
             LIMIT 1",
        )
        .bind(station_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }
}
