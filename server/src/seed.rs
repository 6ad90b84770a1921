//! Demo data for a fresh database: a few stations with a day of hourly
//! samples, a week of pushed min/max records and one status report each.

use chrono::{Days, Duration, NaiveDateTime};
use rand::Rng;
use tracing::info;

use crate::errors::Result;
use crate::model::{DailyAggregate, NewSample, NewStation, NewStatus};
use crate::store::Store;
use crate::validate::round_one_decimal;

pub fn demo_stations() -> Vec<NewStation> {
    vec![
        NewStation::new("esp32-test-001", "Test Weather Station").location("Test Lab"),
        NewStation::new("esp32-outdoor", "Outdoor Station").location("Garden"),
        NewStation::new("esp32-indoor", "Indoor Station").location("Living Room"),
    ]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub stations_created: usize,
    pub samples: usize,
    pub aggregates: usize,
    pub statuses: usize,
}

/// Seeds every demo station, creating the ones that do not exist yet.
/// Readings are generated backwards from `now`.
pub async fn seed_demo_data(
    store: &dyn Store,
    now: NaiveDateTime,
    rng: &mut impl Rng,
) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for new_station in demo_stations() {
        let station = match store.find_station(&new_station.station_ref).await? {
            Some(existing) => existing,
            None => {
                summary.stations_created += 1;
                store.create_station(new_station).await?
            }
        };

        let samples: Vec<NewSample> = (0..24)
            .map(|i| NewSample {
                timestamp: now - Duration::hours(i),
                temperature: round_one_decimal(rng.gen_range(18.0..35.0)),
                humidity: round_one_decimal(rng.gen_range(30.0..80.0)),
            })
            .collect();
        summary.samples += store.insert_samples(station.id, &samples).await?;

        let aggregates: Vec<DailyAggregate> = (0..7)
            .filter_map(|i| now.date().checked_sub_days(Days::new(i)))
            .map(|day| DailyAggregate {
                day,
                min_temperature: round_one_decimal(rng.gen_range(15.0..25.0)),
                max_temperature: round_one_decimal(rng.gen_range(30.0..40.0)),
                min_humidity: round_one_decimal(rng.gen_range(30.0..50.0)),
                max_humidity: round_one_decimal(rng.gen_range(60.0..80.0)),
            })
            .collect();
        summary.aggregates += store
            .upsert_daily_aggregates(station.id, &aggregates)
            .await?;

        let status = NewStatus {
            timestamp: now,
            uptime_ms: rng.gen_range(100_000..500_000),
            free_heap: rng.gen_range(200_000..300_000),
            wifi_rssi: rng.gen_range(-80..-40),
        };
        store.insert_status(station.id, &status).await?;
        summary.statuses += 1;

        info!("Seeded {}", station.station_ref);
    }

    Ok(summary)
}
