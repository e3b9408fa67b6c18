//! Metrics emitted by the cache and the render pipeline.
//!
//! Recorded through the `metrics` facade; the binary decides where they go.

use metrics::{counter, histogram};

use pkgif_models::RenderKind;

/// Metric names as constants for consistency.
pub mod names {
    // Fetch metrics
    pub const FETCHES_STARTED_TOTAL: &str = "pkgif_fetches_started_total";
    pub const FETCHES_COMPLETED_TOTAL: &str = "pkgif_fetches_completed_total";
    pub const FETCHES_FAILED_TOTAL: &str = "pkgif_fetches_failed_total";
    pub const FETCH_DURATION_SECONDS: &str = "pkgif_fetch_duration_seconds";

    // Render metrics
    pub const RENDERS_TOTAL: &str = "pkgif_renders_total";
    pub const RENDER_CACHE_HITS_TOTAL: &str = "pkgif_render_cache_hits_total";
    pub const ENCODER_DURATION_SECONDS: &str = "pkgif_encoder_duration_seconds";
}

pub fn record_fetch_started() {
    counter!(names::FETCHES_STARTED_TOTAL).increment(1);
}

pub fn record_fetch_completed(duration_secs: f64) {
    counter!(names::FETCHES_COMPLETED_TOTAL).increment(1);
    histogram!(names::FETCH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_fetch_failed() {
    counter!(names::FETCHES_FAILED_TOTAL).increment(1);
}

/// Record a finished render. `target` is a clip kind or `video_preview`.
pub fn record_render(target: &str, outcome: &str) {
    let labels = [("kind", target.to_string()), ("outcome", outcome.to_string())];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
}

pub fn record_render_cache_hit(kind: RenderKind) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::RENDER_CACHE_HITS_TOTAL, &labels).increment(1);
}

pub fn record_encoder_duration(target: &str, duration_secs: f64) {
    let labels = [("kind", target.to_string())];
    histogram!(names::ENCODER_DURATION_SECONDS, &labels).record(duration_secs);
}
