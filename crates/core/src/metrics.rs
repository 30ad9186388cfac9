//! Prometheus metrics for the resolver core.
//!
//! - Fetch request counts and latency
//! - Cache hit/miss counts
//! - Pipeline run outcomes
//! - Singleflight coalescing

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

/// Core metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Fetch requests by result (hit, resolved, invalid_input, timeout,
/// pipeline_failure, internal).
pub static FETCH_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stashlink_fetch_requests_total", "Total fetch requests"),
        &["result"],
    )
    .unwrap()
});

/// Fetch duration in seconds, cache hits included.
pub static FETCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stashlink_fetch_duration_seconds",
            "Fetch duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.025, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
        ]),
    )
    .unwrap()
});

/// Cache lookups that returned a stored link.
pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("stashlink_cache_hits_total", "Cache lookups that hit").unwrap()
});

/// Cache lookups that missed (including read errors degraded to misses).
pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("stashlink_cache_misses_total", "Cache lookups that missed").unwrap()
});

/// Pipeline runs by outcome (resolved, not_found, automation_timeout,
/// upload_failed, unknown).
pub static PIPELINE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stashlink_pipeline_runs_total", "Acquisition pipeline runs"),
        &["outcome"],
    )
    .unwrap()
});

/// Acquisitions currently running.
pub static ACQUISITIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stashlink_acquisitions_in_flight",
        "Acquisition pipeline runs currently in flight",
    )
    .unwrap()
});

/// Callers that attached to an already in-flight acquisition instead of
/// starting their own.
pub static SINGLEFLIGHT_SHARED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "stashlink_singleflight_shared_total",
        "Waits coalesced onto an in-flight acquisition",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(FETCH_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(FETCH_DURATION_SECONDS.clone()))
        .unwrap();
    registry.register(Box::new(CACHE_HITS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_RUNS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(ACQUISITIONS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(SINGLEFLIGHT_SHARED_TOTAL.clone()))
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_gathers_registered_metrics() {
        FETCH_REQUESTS_TOTAL.with_label_values(&["hit"]).inc();
        CACHE_HITS_TOTAL.inc();

        let families = REGISTRY.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"stashlink_fetch_requests_total"));
        assert!(names.contains(&"stashlink_cache_hits_total"));
        assert!(names.contains(&"stashlink_pipeline_runs_total"));
    }
}
