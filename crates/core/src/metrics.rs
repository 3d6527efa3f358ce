//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline runs (outcomes, stage durations)
//! - Subset downloads
//! - Notifications and the command mailbox

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline
// =============================================================================

/// Finished runs by mode and outcome.
pub static RUN_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("droughtwatch_runs_total", "Total pipeline runs"),
        &["mode", "outcome"], // outcome: "completed", "no_data", "failed"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "droughtwatch_stage_duration_seconds",
            "Duration of pipeline stages",
        )
        .buckets(vec![1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Downloads
// =============================================================================

/// Data files downloaded.
pub static ITEMS_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "droughtwatch_items_downloaded_total",
        "Total data files downloaded",
    )
    .unwrap()
});

/// Data files that failed to download.
pub static DOWNLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "droughtwatch_downloads_failed_total",
        "Total data files that failed to download",
    )
    .unwrap()
});

// =============================================================================
// Notifications and commands
// =============================================================================

/// Notifications by result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("droughtwatch_notifications_total", "Total notifications"),
        &["result"], // "sent", "failed", "unreachable", "disabled"
    )
    .unwrap()
});

/// Mailbox requests accepted.
pub static MAILBOX_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "droughtwatch_mailbox_requests_total",
        "Total operator requests accepted from the mailbox",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUN_OUTCOMES.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(ITEMS_DOWNLOADED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(NOTIFICATIONS.clone()),
        Box::new(MAILBOX_REQUESTS.clone()),
    ]
}
