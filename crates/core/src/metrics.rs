//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Version pipelines (results, failing stages, timeouts)
//! - Storage backend calls
//! - Operation durations

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipelines
// =============================================================================

/// Finished version pipelines by result.
pub static VERSION_PIPELINES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quiver_version_pipelines_total",
            "Total version pipelines run",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Version failures by the stage they failed in.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quiver_stage_failures_total",
            "Total version failures by stage",
        ),
        &["stage"], // "transform", "postprocess", "processing", "storage"
    )
    .unwrap()
});

/// Versions cancelled at the operation deadline.
pub static VERSION_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "quiver_version_timeouts_total",
        "Total version units cancelled at the deadline",
    )
    .unwrap()
});

// =============================================================================
// Storage
// =============================================================================

/// Storage backend calls by operation and result.
pub static STORAGE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "quiver_storage_operations_total",
            "Total storage backend calls",
        ),
        &["operation", "result"], // "save"/"delete"/"copy"/"retrieve", "success"/"failed"
    )
    .unwrap()
});

// =============================================================================
// Operations
// =============================================================================

/// Duration of orchestrator operations in seconds.
pub static OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "quiver_operation_duration_seconds",
            "Duration of orchestrator operations",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0, 60.0]),
        &["operation"], // "store", "delete", "copy", "regenerate", "retrieve"
    )
    .unwrap()
});

/// Records the outcome of one storage call.
pub fn record_storage(operation: &str, success: bool) {
    let result = if success { "success" } else { "failed" };
    STORAGE_OPERATIONS
        .with_label_values(&[operation, result])
        .inc();
}

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipelines
        Box::new(VERSION_PIPELINES.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(VERSION_TIMEOUTS.clone()),
        // Storage
        Box::new(STORAGE_OPERATIONS.clone()),
        // Operations
        Box::new(OPERATION_DURATION.clone()),
    ]
}
