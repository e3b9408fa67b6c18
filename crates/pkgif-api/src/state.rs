//! Application state.

use std::sync::Arc;

use tracing::info;

use pkgif_core::{ClipService, CoreConfig};
use pkgif_media::{FfmpegEncoder, YtDlpFetcher};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<ClipService>,
}

impl AppState {
    /// Create application state backed by yt-dlp and ffmpeg.
    pub async fn new(config: ApiConfig, core_config: CoreConfig) -> anyhow::Result<Self> {
        let encoder = FfmpegEncoder::new().with_timeout(core_config.ffmpeg_timeout.as_secs());
        let service = ClipService::new(core_config, Arc::new(YtDlpFetcher::new()), Arc::new(encoder));
        service.cache().layout().ensure_root().await?;
        info!(data_dir = %service.config().data_dir.display(), "Artifact root ready");

        Ok(Self::with_service(config, service))
    }

    /// Wrap an already-built service, seeding the demo clip when enabled.
    pub fn with_service(config: ApiConfig, service: ClipService) -> Self {
        if config.demo_routes {
            service.seed_demo();
        }
        Self {
            config,
            service: Arc::new(service),
        }
    }
}
