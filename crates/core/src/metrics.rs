//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Catalog clients (requests, rate-limit waits)
//! - Resolver (matches per strategy)
//! - Sync tasks (track outcomes, task outcomes, durations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Catalog requests by provider and outcome.
pub static CATALOG_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crossfade_catalog_requests_total",
            "Total catalog API requests",
        ),
        // "success", "rate_limited", "unauthorized", "client_error", "server_error", "timeout", "network"
        &["provider", "outcome"],
    )
    .unwrap()
});

/// Times a caller was suspended by a rate limiter.
pub static RATE_LIMIT_WAITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crossfade_rate_limit_waits_total",
            "Total rate limiter suspensions",
        ),
        &["provider"],
    )
    .unwrap()
});

/// Rate limiter suspension durations.
pub static RATE_LIMIT_WAIT_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "crossfade_rate_limit_wait_seconds",
            "Time spent waiting for rate limiter capacity",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Resolver Metrics
// =============================================================================

/// Resolutions by winning strategy ("none" when nothing matched).
pub static TRACK_MATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("crossfade_track_matches_total", "Track resolutions by strategy"),
        &["strategy"], // "isrc", "artist_title", "artist_only", "title_only", "none"
    )
    .unwrap()
});

// =============================================================================
// Sync Metrics
// =============================================================================

/// Per-track sync outcomes.
pub static TRACKS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("crossfade_tracks_processed_total", "Tracks processed by result"),
        &["result"], // "success", "not_found", "error"
    )
    .unwrap()
});

/// Finished sync tasks by terminal status.
pub static SYNC_TASKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("crossfade_sync_tasks_total", "Sync tasks by terminal status"),
        &["status"], // "completed", "partial", "failed"
    )
    .unwrap()
});

/// Wall-clock duration of sync tasks.
pub static SYNC_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "crossfade_sync_duration_seconds",
            "Duration of sync tasks from start to terminal status",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["status"],
    )
    .unwrap()
});

/// All metrics, for registering with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Catalog
        Box::new(CATALOG_REQUESTS.clone()),
        Box::new(RATE_LIMIT_WAITS.clone()),
        Box::new(RATE_LIMIT_WAIT_SECONDS.clone()),
        // Resolver
        Box::new(TRACK_MATCHES.clone()),
        // Sync
        Box::new(TRACKS_PROCESSED.clone()),
        Box::new(SYNC_TASKS.clone()),
        Box::new(SYNC_DURATION.clone()),
    ]
}
