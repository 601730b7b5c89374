//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Downloads (started, completed, failed by stage, bytes streamed)
//! - Engine processes (active runs, exits by result, duration)
//! - Probes and extractor runs

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Downloads
// =============================================================================

/// Downloads started by mode.
pub static DOWNLOADS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediabroker_downloads_started_total", "Total downloads started"),
        &["mode"], // "transcode", "raw"
    )
    .unwrap()
});

/// Downloads whose output was fully delivered.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediabroker_downloads_completed_total",
        "Total downloads completed successfully",
    )
    .unwrap()
});

/// Failed downloads by stage.
pub static DOWNLOADS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediabroker_downloads_failed_total", "Total failed downloads"),
        &["stage"], // "format", "extract", "select", "fetch", "transcode", "cancelled"
    )
    .unwrap()
});

/// Bytes handed to download callers.
pub static BYTES_STREAMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediabroker_bytes_streamed_total",
        "Total bytes streamed to download callers",
    )
    .unwrap()
});

// =============================================================================
// Engine
// =============================================================================

/// Engine processes currently running.
pub static ENGINE_PROCESSES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediabroker_engine_processes_active",
        "Number of engine processes currently running",
    )
    .unwrap()
});

/// Engine runs by outcome.
pub static ENGINE_EXITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediabroker_engine_exits_total", "Total engine runs by outcome"),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Probe runs by outcome.
pub static PROBES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediabroker_probes_total", "Total probe runs by outcome"),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Extractor
// =============================================================================

/// Extractor run duration in seconds.
pub static EXTRACT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediabroker_extract_duration_seconds",
            "Duration of extractor runs",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Downloads
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOADS_COMPLETED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(BYTES_STREAMED.clone()),
        // Engine
        Box::new(ENGINE_PROCESSES_ACTIVE.clone()),
        Box::new(ENGINE_EXITS.clone()),
        Box::new(PROBES_TOTAL.clone()),
        // Extractor
        Box::new(EXTRACT_DURATION.clone()),
    ]
}
