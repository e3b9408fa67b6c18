//! Render pipeline.
//!
//! Turns a clip snapshot and an artifact kind into an ordered stage list,
//! skips the encoder when the artifact on disk is current, and otherwise
//! encodes into a temporary file that is moved over the canonical path only
//! on success. Renders of the same clip and kind are serialized; different
//! clips and kinds run in parallel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempPath;
use tracing::Instrument;

use pkgif_media::{DrawText, EncodeJob, Encoder, FilterStage, MediaError, ProgressCallback, StreamSelection};
use pkgif_models::{Clip, ClipId, RenderKind, RenderState, RenderStatus, VideoId};

use crate::clip_registry::ClipRegistry;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::keyed_lock::KeyedLocks;
use crate::layout::{ArtifactLayout, PREVIEW_EXT};
use crate::logging::RenderLogger;
use crate::metrics;
use crate::video_cache::VideoCache;

/// Frame rate of preview renders and of the per-video preview.
pub const PREVIEW_FPS: u32 = 15;

/// Frame rate of full renders.
pub const FULL_FPS: u32 = 15;

/// Width of previews; height follows the aspect ratio.
pub const PREVIEW_WIDTH: u32 = 240;

pub const PREVIEW_FONT_SIZE: u32 = 16;
pub const FULL_FONT_SIZE: u32 = 48;

const CAPTION_X: &str = "(w-text_w)/2";
const CAPTION_Y: &str = "h-th-10";
const CAPTION_COLOR: &str = "white";
const CAPTION_BORDER_WIDTH: u32 = 2;
const CAPTION_BORDER_COLOR: &str = "black";

/// Label used for the per-video preview in logs and metrics.
const VIDEO_PREVIEW: &str = "video_preview";

/// Build the ordered stage list for `clip` rendered as `kind`.
///
/// Caption stages follow the clip's stored caption order, which is not
/// necessarily time order.
pub fn build_stages(clip: &Clip, kind: RenderKind, font_path: &str) -> Vec<FilterStage> {
    let (fps, font_size) = match kind {
        RenderKind::Preview => (PREVIEW_FPS, PREVIEW_FONT_SIZE),
        RenderKind::Full => (FULL_FPS, FULL_FONT_SIZE),
    };

    let mut stages = Vec::with_capacity(clip.captions.len() + 3);
    stages.push(FilterStage::Trim {
        start: clip.clip_start,
        duration: clip.duration(),
    });
    stages.push(FilterStage::FrameRate { fps });
    if kind == RenderKind::Preview {
        stages.push(FilterStage::Scale { width: PREVIEW_WIDTH });
    }

    stages.extend(clip.captions.iter().map(|caption| {
        FilterStage::DrawText(DrawText {
            text: caption.text.clone(),
            x: CAPTION_X.to_string(),
            y: CAPTION_Y.to_string(),
            font_file: font_path.to_string(),
            font_size,
            font_color: CAPTION_COLOR.to_string(),
            border_width: CAPTION_BORDER_WIDTH,
            border_color: CAPTION_BORDER_COLOR.to_string(),
            enable_start: caption.start,
            enable_end: caption.end,
        })
    }));

    stages
}

/// Stages of the per-video preview derivative.
pub fn video_preview_stages() -> Vec<FilterStage> {
    vec![
        FilterStage::FrameRate { fps: PREVIEW_FPS },
        FilterStage::Scale { width: PREVIEW_WIDTH },
    ]
}

fn streams_for(kind: RenderKind) -> StreamSelection {
    match kind {
        RenderKind::Preview => StreamSelection::VideoAndAudio,
        RenderKind::Full => StreamSelection::VideoOnly,
    }
}

/// Forward encoder snapshots to the render log.
fn progress_reporter(logger: &RenderLogger, total_ms: Option<i64>) -> ProgressCallback {
    let logger = logger.clone();
    Box::new(move |progress| logger.log_encode_progress(&progress, total_ms))
}

pub struct RenderPipeline {
    cache: VideoCache,
    registry: ClipRegistry,
    encoder: Arc<dyn Encoder>,
    config: CoreConfig,
    layout: ArtifactLayout,
    clip_locks: KeyedLocks<(ClipId, RenderKind)>,
    preview_locks: KeyedLocks<VideoId>,
}

impl RenderPipeline {
    pub fn new(cache: VideoCache, registry: ClipRegistry, encoder: Arc<dyn Encoder>, config: CoreConfig) -> Self {
        let layout = cache.layout().clone();
        Self {
            cache,
            registry,
            encoder,
            config,
            layout,
            clip_locks: KeyedLocks::new(),
            preview_locks: KeyedLocks::new(),
        }
    }

    /// Canonical artifact path of a clip and kind.
    pub fn output_path(&self, clip_id: &ClipId, kind: RenderKind) -> PathBuf {
        self.layout.clip_output(clip_id, kind)
    }

    /// Produce the artifact of `kind` for the clip and return its path.
    pub async fn render(&self, clip_id: &ClipId, kind: RenderKind) -> CoreResult<PathBuf> {
        let logger = RenderLogger::new(clip_id, kind);
        let span = logger.create_span();
        self.render_inner(clip_id, kind, &logger).instrument(span).await
    }

    async fn render_inner(&self, clip_id: &ClipId, kind: RenderKind, logger: &RenderLogger) -> CoreResult<PathBuf> {
        let key = (clip_id.clone(), kind);
        let _guard = self.clip_locks.lock(&key).await;

        // Everything below works from this snapshot
        let clip = self.registry.get(clip_id)?;
        let output = self.output_path(&clip.id, kind);

        if !clip.is_stale_for(kind) && tokio::fs::try_exists(&output).await.unwrap_or(false) {
            logger.log_progress("artifact is current, skipping encoder");
            metrics::record_render_cache_hit(kind);
            return Ok(output);
        }

        self.cache.wait_ready(&clip.video_id, self.config.source_wait).await?;

        let input = match kind {
            RenderKind::Preview => self.video_preview(&clip.video_id).await.map_err(|e| match e {
                CoreError::PreviewFailed { source, .. } => CoreError::render_failed(&clip.id, kind, source),
                other => other,
            })?,
            RenderKind::Full => self.cache.local_path(&clip.video_id),
        };

        let stages = build_stages(&clip, kind, &self.config.font_path);
        logger.log_start(&format!(
            "{} caption(s) from {} at revision {}",
            clip.captions.len(),
            input.display(),
            clip.revision()
        ));

        let temp = self
            .temp_output(&ArtifactLayout::temp_suffix(kind))
            .await
            .map_err(|e| CoreError::render_failed(&clip.id, kind, e))?;
        let job = EncodeJob::new(&input, temp.to_path_buf(), stages).with_streams(streams_for(kind));

        let total_ms = clip.duration().map(|secs| (secs * 1000.0) as i64);
        let started = Instant::now();
        let result = self
            .encoder
            .run_with_progress(&job, progress_reporter(logger, total_ms))
            .await;
        metrics::record_encoder_duration(kind.as_str(), started.elapsed().as_secs_f64());

        if let Err(e) = result {
            logger.log_error(&e.to_string());
            metrics::record_render(kind.as_str(), "failed");
            return Err(CoreError::render_failed(&clip.id, kind, e));
        }

        temp.persist(&output)
            .map_err(|e| CoreError::render_failed(&clip.id, kind, MediaError::Io(e.error)))?;

        if !self.registry.mark_rendered(&clip.id, kind, clip.revision())? {
            logger.log_warning("clip changed while rendering, artifact left stale");
        }

        metrics::record_render(kind.as_str(), "success");
        logger.log_completion(&output.display().to_string());
        Ok(output)
    }

    /// Return the low-resolution derivative of a video, deriving it if absent.
    ///
    /// Requires the source to be `Ready`. Derivation is serialized per video.
    pub async fn video_preview(&self, video_id: &VideoId) -> CoreResult<PathBuf> {
        let output = self.layout.video_preview(video_id);
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Ok(output);
        }

        let source = self.cache.wait_ready(video_id, self.config.source_wait).await?;

        let _guard = self.preview_locks.lock(video_id).await;
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Ok(output);
        }

        let logger = RenderLogger::new(video_id, VIDEO_PREVIEW);
        logger.log_start("deriving low-resolution copy of the source");

        let preview_failed = |source| CoreError::PreviewFailed {
            video_id: video_id.clone(),
            source,
        };

        let temp = self
            .temp_output(&format!(".{}", PREVIEW_EXT))
            .await
            .map_err(preview_failed)?;
        let job = EncodeJob::new(self.cache.local_path(video_id), temp.to_path_buf(), video_preview_stages())
            .with_streams(StreamSelection::VideoAndAudio);

        let total_ms = Some(i64::from(source.duration_seconds) * 1000);
        let started = Instant::now();
        let result = self
            .encoder
            .run_with_progress(&job, progress_reporter(&logger, total_ms))
            .await;
        metrics::record_encoder_duration(VIDEO_PREVIEW, started.elapsed().as_secs_f64());

        if let Err(e) = result {
            logger.log_error(&e.to_string());
            metrics::record_render(VIDEO_PREVIEW, "failed");
            return Err(preview_failed(e));
        }

        temp.persist(&output)
            .map_err(|e| preview_failed(MediaError::Io(e.error)))?;

        metrics::record_render(VIDEO_PREVIEW, "success");
        logger.log_completion(&output.display().to_string());
        Ok(output)
    }

    /// Current render state of a clip snapshot for `kind`.
    ///
    /// `Rendering` while a render of that clip and kind holds its lock.
    pub fn render_state(&self, clip: &Clip, kind: RenderKind) -> RenderState {
        if self.clip_locks.is_locked(&(clip.id.clone(), kind)) {
            return RenderState::Rendering;
        }
        if !clip.is_stale_for(kind) && self.output_path(&clip.id, kind).exists() {
            RenderState::Cached
        } else {
            RenderState::NeedsRender
        }
    }

    pub fn render_status(&self, clip: &Clip) -> RenderStatus {
        RenderStatus {
            preview: self.render_state(clip, RenderKind::Preview),
            full: self.render_state(clip, RenderKind::Full),
        }
    }

    /// Reserve a temporary output beside the canonical artifacts, so the final
    /// move stays on one filesystem. Deleted on drop unless persisted.
    async fn temp_output(&self, suffix: &str) -> Result<TempPath, MediaError> {
        self.layout.ensure_root().await?;
        let temp = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(suffix)
            .tempfile_in(self.layout.root())?;
        Ok(temp.into_temp_path())
    }
}
