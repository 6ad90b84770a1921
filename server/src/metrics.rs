use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SAMPLES_WRITTEN_TOTAL: Counter = Counter::with_opts(Opts::new(
        "meteo_samples_written_total",
        "Total weather samples stored from device uploads"
    ))
    .unwrap();
    pub static ref AGGREGATES_WRITTEN_TOTAL: Counter = Counter::with_opts(Opts::new(
        "meteo_aggregates_written_total",
        "Total daily min/max records upserted from device uploads"
    ))
    .unwrap();
    pub static ref STATUS_REPORTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "meteo_status_reports_total",
        "Total status snapshots stored"
    ))
    .unwrap();
    pub static ref REJECTED_UPLOADS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "meteo_rejected_uploads_total",
        "Total upload requests rejected (bad payload, unknown station, storage failure)"
    ))
    .unwrap();
    pub static ref FORBIDDEN_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "meteo_forbidden_requests_total",
        "Total requests whose origin did not match the station's registered address"
    ))
    .unwrap();
    pub static ref STORE_WRITE_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "meteo_store_write_seconds",
            "Time taken to write an upload batch to the database"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SAMPLES_WRITTEN_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AGGREGATES_WRITTEN_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_REPORTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REJECTED_UPLOADS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FORBIDDEN_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_WRITE_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
