//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use pkgif_media::{check_ffmpeg, check_ytdlp};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Outcome of one readiness probe.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Check {
    Ok { latency_ms: u64 },
    Error { error: String },
}

impl Check {
    fn timed<T, E: std::fmt::Display>(probe: impl FnOnce() -> Result<T, E>) -> Self {
        let start = Instant::now();
        match probe() {
            Ok(_) => Check::Ok {
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => Check::Error { error: e.to_string() },
        }
    }

    fn passed(&self) -> bool {
        matches!(self, Check::Ok { .. })
    }
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    /// Artifact root accepts new files
    pub storage: Check,
    pub ffmpeg: Check,
    pub ytdlp: Check,
}

/// Readiness probe: the artifact root is writable and both tools are on PATH.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let root = state.service.cache().layout().root().to_path_buf();
    let storage = tokio::task::spawn_blocking(move || Check::timed(|| tempfile::tempfile_in(&root)))
        .await
        .unwrap_or_else(|e| Check::Error { error: e.to_string() });

    let ffmpeg = Check::timed(check_ffmpeg);
    let ytdlp = Check::timed(check_ytdlp);

    let all_ok = storage.passed() && ffmpeg.passed() && ytdlp.passed();
    let status = if all_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" },
        storage,
        ffmpeg,
        ytdlp,
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_serialization() {
        let ok = serde_json::to_value(Check::Ok { latency_ms: 3 }).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "ok", "latency_ms": 3}));

        let failed = Check::timed(|| Err::<(), _>("ffmpeg missing"));
        assert!(!failed.passed());
        let failed = serde_json::to_value(failed).unwrap();
        assert_eq!(failed["status"], "error");
        assert_eq!(failed["error"], "ffmpeg missing");
    }
}
