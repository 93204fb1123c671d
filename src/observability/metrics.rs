use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use crate::error::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Cycle metrics
    pub static ref CYCLES_COMPLETED: IntCounter = IntCounter::new(
        "cycles_completed_total",
        "Total number of scrape cycles completed"
    ).unwrap();

    pub static ref CYCLE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cycle_duration_seconds",
            "Wall time of one scrape cycle"
        ).buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0])
    ).unwrap();

    pub static ref DEGRADED_ROUTES: IntGauge = IntGauge::new(
        "degraded_routes",
        "Routes whose persistence failure streak reached the degraded threshold"
    ).unwrap();

    // Route metrics
    pub static ref ROUTE_SUCCESSES: IntCounter = IntCounter::new(
        "route_successes_total",
        "Route fetches that completed the pipeline"
    ).unwrap();

    pub static ref ROUTE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("route_failures_total", "Route failures by category"),
        &["category"]
    ).unwrap();

    // Store metrics
    pub static ref SAMPLES_INSERTED: IntCounter = IntCounter::new(
        "samples_inserted_total",
        "Samples appended to a route history"
    ).unwrap();

    pub static ref SAMPLES_DEDUPLICATED: IntCounter = IntCounter::new(
        "samples_deduplicated_total",
        "Samples dropped because they repeated the latest quote"
    ).unwrap();

    pub static ref LOG_RECORDS_TRUNCATED: IntCounter = IntCounter::new(
        "log_truncations_total",
        "Route logs whose damaged tail was truncated on load"
    ).unwrap();

    // Alert metrics
    pub static ref ALERTS_EMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("alerts_emitted_total", "Alerts raised by rule"),
        &["rule"]
    ).unwrap();
}

/// Register every collector with `REGISTRY`. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CYCLES_COMPLETED.clone()))?;
    REGISTRY.register(Box::new(CYCLE_DURATION.clone()))?;
    REGISTRY.register(Box::new(DEGRADED_ROUTES.clone()))?;
    REGISTRY.register(Box::new(ROUTE_SUCCESSES.clone()))?;
    REGISTRY.register(Box::new(ROUTE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(SAMPLES_INSERTED.clone()))?;
    REGISTRY.register(Box::new(SAMPLES_DEDUPLICATED.clone()))?;
    REGISTRY.register(Box::new(LOG_RECORDS_TRUNCATED.clone()))?;
    REGISTRY.register(Box::new(ALERTS_EMITTED.clone()))?;
    Ok(())
}
