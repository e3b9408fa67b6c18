//! Structured render logging.
//!
//! Gives every render the same lifecycle vocabulary and contextual fields
//! (target id, artifact kind) so renders can be followed in the logs.

use pkgif_media::FfmpegProgress;
use tracing::{error, info, warn, Span};

/// Logger for one render of one target.
#[derive(Debug, Clone)]
pub struct RenderLogger {
    target_id: String,
    kind: String,
}

impl RenderLogger {
    /// Create a logger for a target (clip or video id) and artifact kind.
    pub fn new(target_id: impl ToString, kind: impl ToString) -> Self {
        Self {
            target_id: target_id.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            target_id = %self.target_id,
            kind = %self.kind,
            "Render started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            target_id = %self.target_id,
            kind = %self.kind,
            "Render progress: {}", message
        );
    }

    /// Report an encoder snapshot. `total_ms` is the expected output length
    /// when known.
    pub fn log_encode_progress(&self, progress: &FfmpegProgress, total_ms: Option<i64>) {
        self.log_progress(&progress_message(progress, total_ms));
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            target_id = %self.target_id,
            kind = %self.kind,
            "Render warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            target_id = %self.target_id,
            kind = %self.kind,
            "Render error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            target_id = %self.target_id,
            kind = %self.kind,
            "Render completed: {}", message
        );
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Span covering the whole render, for instrumenting the future.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "render",
            target_id = %self.target_id,
            kind = %self.kind
        )
    }
}

fn progress_message(progress: &FfmpegProgress, total_ms: Option<i64>) -> String {
    match total_ms {
        Some(total) if total > 0 => format!(
            "{:.0}% ({} frames, {:.1}x)",
            progress.percentage(total),
            progress.frame,
            progress.speed
        ),
        _ => format!(
            "{} frames, {:.1}s written ({:.1}x)",
            progress.frame,
            progress.out_time_ms as f64 / 1000.0,
            progress.speed
        ),
    }
}
