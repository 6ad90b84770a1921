use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

use crate::model::{DailyAggregate, WeatherSample};

/// Days covered by the derived min/max history, today included.
pub const HISTORY_DAYS: u64 = 7;

/// First instant of the derived history window ending on `today`.
pub fn window_start(today: NaiveDate, days: u64) -> NaiveDateTime {
    today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::default())
}

/// Derives one min/max record per day from raw samples over the `days`
/// calendar days ending on `today`, newest day first. Days without samples
/// are left out.
pub fn compute_daily_aggregates_from_samples(
    samples: &[WeatherSample],
    today: NaiveDate,
    days: u64,
) -> Vec<DailyAggregate> {
    let first_day = window_start(today, days).date();
    let mut by_day: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();

    for sample in samples {
        let day = sample.timestamp.date();
        if day < first_day || day > today {
            continue;
        }
        by_day
            .entry(day)
            .and_modify(|agg| {
                agg.min_temperature = agg.min_temperature.min(sample.temperature);
                agg.max_temperature = agg.max_temperature.max(sample.temperature);
                agg.min_humidity = agg.min_humidity.min(sample.humidity);
                agg.max_humidity = agg.max_humidity.max(sample.humidity);
            })
            .or_insert(DailyAggregate {
                day,
                min_temperature: sample.temperature,
                max_temperature: sample.temperature,
                min_humidity: sample.humidity,
                max_humidity: sample.humidity,
            });
    }

    by_day.into_values().rev().collect()
}
