use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::Store;
use crate::errors::{Error, Result};
use crate::model::{
    DailyAggregate, NewSample, NewStation, NewStatus, Station, StatusSnapshot, WeatherSample,
};

#[derive(Debug, Default)]
struct Tables {
    stations: Vec<Station>,
    samples: Vec<WeatherSample>,
    aggregates: BTreeMap<(i64, NaiveDate), DailyAggregate>,
    statuses: Vec<StatusSnapshot>,
}

impl Tables {
    fn ensure_station(&self, station_id: i64) -> Result<()> {
        if self.stations.iter().any(|s| s.id == station_id) {
            Ok(())
        } else {
            Err(Error::UnknownStation(station_id))
        }
    }
}

/// In-process store with the same semantics as [`super::PgStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_station(&self, station_ref: &str) -> Result<Option<Station>> {
        let tables = self.tables.read().await;
        Ok(tables
            .stations
            .iter()
            .find(|s| s.station_ref == station_ref)
            .cloned())
    }

    async fn list_stations(&self) -> Result<Vec<Station>> {
        Ok(self.tables.read().await.stations.clone())
    }

    async fn create_station(&self, station: NewStation) -> Result<Station> {
        let mut tables = self.tables.write().await;
        if tables
            .stations
            .iter()
            .any(|s| s.station_ref == station.station_ref)
        {
            return Err(Error::DuplicateStation(station.station_ref));
        }

        let created = Station {
            id: tables.stations.len() as i64 + 1,
            station_ref: station.station_ref,
            name: station.name,
            location: station.location,
            address: station.address,
            created_at: Utc::now(),
        };
        tables.stations.push(created.clone());
        Ok(created)
    }

    async fn insert_samples(&self, station_id: i64, samples: &[NewSample]) -> Result<usize> {
        let mut tables = self.tables.write().await;
        tables.ensure_station(station_id)?;
        tables
            .samples
            .extend(samples.iter().map(|s| WeatherSample {
                station_id,
                timestamp: s.timestamp,
                temperature: s.temperature,
                humidity: s.humidity,
            }));
        Ok(samples.len())
    }

    async fn latest_sample(&self, station_id: i64) -> Result<Option<WeatherSample>> {
        Ok(self.recent_samples(station_id, 1).await?.into_iter().next())
    }

    async fn recent_samples(&self, station_id: i64, limit: usize) -> Result<Vec<WeatherSample>> {
        let tables = self.tables.read().await;
        let mut samples: Vec<WeatherSample> = tables
            .samples
            .iter()
            .filter(|s| s.station_id == station_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps; newest insert wins ties
        samples.reverse();
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        samples.truncate(limit);
        Ok(samples)
    }

    async fn samples_since(
        &self,
        station_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<WeatherSample>> {
        let tables = self.tables.read().await;
        let mut samples: Vec<WeatherSample> = tables
            .samples
            .iter()
            .filter(|s| s.station_id == station_id && s.timestamp >= since)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn sample_count(&self, station_id: i64) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .samples
            .iter()
            .filter(|s| s.station_id == station_id)
            .count() as u64)
    }

    async fn upsert_daily_aggregates(
        &self,
        station_id: i64,
        aggregates: &[DailyAggregate],
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        tables.ensure_station(station_id)?;
        for aggregate in aggregates {
            tables
                .aggregates
                .insert((station_id, aggregate.day), *aggregate);
        }
        Ok(aggregates.len())
    }

    async fn daily_aggregates(
        &self,
        station_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<DailyAggregate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .aggregates
            .range((station_id, since)..=(station_id, NaiveDate::MAX))
            .rev()
            .map(|(_, aggregate)| *aggregate)
            .collect())
    }

    async fn insert_status(&self, station_id: i64, status: &NewStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_station(station_id)?;
        tables.statuses.push(StatusSnapshot {
            station_id,
            timestamp: status.timestamp,
            uptime_ms: status.uptime_ms,
            free_heap: status.free_heap,
            wifi_rssi: status.wifi_rssi,
        });
        Ok(())
    }

    async fn latest_status(&self, station_id: i64) -> Result<Option<StatusSnapshot>> {
        let tables = self.tables.read().await;
        // Later insert wins on equal timestamps
        Ok(tables
            .statuses
            .iter()
            .filter(|s| s.station_id == station_id)
            .max_by_key(|s| s.timestamp)
            .cloned())
    }
}
