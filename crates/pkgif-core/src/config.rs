//! Core configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Caption font used when `PKGIF_FONT_PATH` is unset.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

/// Core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Artifact root holding sources, video previews and clip renders
    pub data_dir: PathBuf,
    /// Font file for caption overlays
    pub font_path: String,
    /// Encoder timeout
    pub ffmpeg_timeout: Duration,
    /// How long a render waits for a fetching source; zero fails fast
    pub source_wait: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            font_path: DEFAULT_FONT_PATH.to_string(),
            ffmpeg_timeout: Duration::from_secs(600),
            source_wait: Duration::ZERO,
        }
    }
}

impl CoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("PKGIF_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            font_path: std::env::var("PKGIF_FONT_PATH").unwrap_or(defaults.font_path),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("PKGIF_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            source_wait: Duration::from_secs(
                std::env::var("PKGIF_SOURCE_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            ),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_source_wait(mut self, wait: Duration) -> Self {
        self.source_wait = wait;
        self
    }
}
