//! Prometheus metrics for a grab run.
//!
//! This module provides metrics for:
//! - Engine (searches, candidate verdicts, downloads, continuation hops)
//! - Site requests (latency, counts, errors)
//! - Side effects (notifications, ledger writes)
//!
//! There is no HTTP endpoint; the binary renders the registry to a text file
//! for the node_exporter textfile collector.

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Searches total by mode and outcome.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_searches_total", "Total searches issued"),
        &["mode", "outcome"], // outcome: "selected", "no_match", "error"
    )
    .unwrap()
});

/// Classified candidates by verdict.
pub static CANDIDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_candidates_total", "Search results by filter verdict"),
        &["verdict"],
    )
    .unwrap()
});

/// Download attempts by mode and result.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_downloads_total", "Total download attempts"),
        &["mode", "result"], // result: "completed", "already_recorded", "no_torrent", "failed"
    )
    .unwrap()
});

/// Continuation hops by outcome.
pub static CONTINUATION_HOPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediagrab_continuation_hops_total",
            "Follow-up searches for the next missing episode",
        ),
        &["outcome"],
    )
    .unwrap()
});

/// Per-item processing time in seconds.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediagrab_item_duration_seconds",
            "Time spent resolving one wanted item",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["mode"],
    )
    .unwrap()
});

// =============================================================================
// Site Metrics
// =============================================================================

/// Site request duration.
pub static SITE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediagrab_site_request_duration_seconds",
            "Duration of site requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// Site requests total.
pub static SITE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_site_requests_total", "Total site requests"),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Results returned per search.
pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "mediagrab_search_results",
            "Number of entries on a search result page",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

// =============================================================================
// Side Effect Metrics
// =============================================================================

/// Notifications by status.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_notifications_total", "Notifications sent"),
        &["status"],
    )
    .unwrap()
});

/// Ledger I/O errors by operation.
pub static LEDGER_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediagrab_ledger_errors_total", "Ledger read/write failures"),
        &["operation"], // operation: "load", "append"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record one site request.
pub fn observe_site_request(operation: &str, elapsed: Duration, ok: bool) {
    SITE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
    SITE_REQUESTS
        .with_label_values(&[operation, if ok { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Engine
        Box::new(SEARCHES.clone()),
        Box::new(CANDIDATES.clone()),
        Box::new(DOWNLOADS.clone()),
        Box::new(CONTINUATION_HOPS.clone()),
        Box::new(ITEM_DURATION.clone()),
        // Site
        Box::new(SITE_REQUEST_DURATION.clone()),
        Box::new(SITE_REQUESTS.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Side effects
        Box::new(NOTIFICATIONS.clone()),
        Box::new(LEDGER_ERRORS.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write the rendered metrics to `path`.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render())
}
