//! Persistence seam shared by every handler.
//!
//! Each operation maps to one table of the station database. Batch writes
//! are atomic: either every record of a request is stored or none is.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{make_pool, PgStore};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::errors::Result;
use crate::model::{
    DailyAggregate, NewSample, NewStation, NewStatus, Station, StatusSnapshot, WeatherSample,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve an external station reference
    async fn find_station(&self, station_ref: &str) -> Result<Option<Station>>;

    async fn list_stations(&self) -> Result<Vec<Station>>;

    /// Administrative creation; fails on a duplicate reference
    async fn create_station(&self, station: NewStation) -> Result<Station>;

    /// Append a batch of samples in a single transaction, returning the number written
    async fn insert_samples(&self, station_id: i64, samples: &[NewSample]) -> Result<usize>;

    async fn latest_sample(&self, station_id: i64) -> Result<Option<WeatherSample>>;

    /// Most recent samples first
    async fn recent_samples(&self, station_id: i64, limit: usize) -> Result<Vec<WeatherSample>>;

    /// Samples stamped at or after `since`, oldest first
    async fn samples_since(
        &self,
        station_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<WeatherSample>>;

    async fn sample_count(&self, station_id: i64) -> Result<u64>;

    /// Insert or replace one aggregate per day, in a single transaction
    async fn upsert_daily_aggregates(
        &self,
        station_id: i64,
        aggregates: &[DailyAggregate],
    ) -> Result<usize>;

    /// Pushed aggregates on or after `since`, newest first
    async fn daily_aggregates(
        &self,
        station_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<DailyAggregate>>;

    async fn insert_status(&self, station_id: i64, status: &NewStatus) -> Result<()>;

    async fn latest_status(&self, station_id: i64) -> Result<Option<StatusSnapshot>>;
}

/// Creates each station whose reference is not registered yet.
pub async fn register_missing(store: &dyn Store, stations: &[NewStation]) -> Result<usize> {
    let mut created = 0;
    for station in stations {
        if store.find_station(&station.station_ref).await?.is_none() {
            store.create_station(station.clone()).await?;
            info!("Registered station {}", station.station_ref);
            created += 1;
        }
    }
    Ok(created)
}
