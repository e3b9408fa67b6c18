//! Facade over the cache, the registry and the pipeline.
//!
//! This is the surface the HTTP layer talks to: video references arrive as
//! raw strings and clips leave as `ClipView`s.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use pkgif_media::{Encoder, FetchAdapter, ResolvedVideo};
use pkgif_models::{
    Caption, Clip, ClipId, ClipUpdate, ClipView, RenderKind, VideoId, VideoRecord, VideoRef,
};

use crate::clip_registry::ClipRegistry;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::layout::ArtifactLayout;
use crate::render::RenderPipeline;
use crate::video_cache::VideoCache;

/// Fixed clip seeded for the demo routes.
pub mod demo {
    pub const CLIP_ID: &str = "b6cab676-9952-46bf-969b-de7099627ae8";
    pub const VIDEO_ID: &str = "cpPeXEh5Wkk";
    pub const TITLE: &str = "Max and Paddys Road to Nowhere Episode 01";
    pub const VIDEO_LENGTH: u32 = 1423;
    pub const CLIP_START: f64 = 709.007074;
    pub const CLIP_END: f64 = 711.429409;
    pub const CAPTIONS: [(f64, f64, &str); 2] = [
        (0.416659, 1.425548, "we went from that"),
        (1.59158, 2.556552, "to that"),
    ];
}

pub struct ClipService {
    cache: VideoCache,
    registry: ClipRegistry,
    pipeline: RenderPipeline,
    config: CoreConfig,
}

impl ClipService {
    pub fn new(config: CoreConfig, fetcher: Arc<dyn FetchAdapter>, encoder: Arc<dyn Encoder>) -> Self {
        let cache = VideoCache::new(ArtifactLayout::new(&config.data_dir), fetcher);
        let registry = ClipRegistry::new(cache.clone());
        let pipeline = RenderPipeline::new(cache.clone(), registry.clone(), encoder, config.clone());
        Self {
            cache,
            registry,
            pipeline,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &VideoCache {
        &self.cache
    }

    pub fn registry(&self) -> &ClipRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Resolve an id or URL, optionally starting to cache the source.
    pub async fn resolve_video(&self, reference: &str, save: bool) -> CoreResult<VideoRecord> {
        let reference = VideoRef::parse(reference)?;
        self.cache.ensure_cached(&reference, save).await
    }

    /// Current record of a video, resolving it on first reference.
    pub async fn get_video(&self, id: &str) -> CoreResult<VideoRecord> {
        self.resolve_video(id, false).await
    }

    /// Path of the video's low-resolution derivative, derived on demand.
    pub async fn video_preview(&self, id: &str) -> CoreResult<PathBuf> {
        let record = self.get_video(id).await?;
        self.pipeline.video_preview(&record.id).await
    }

    pub async fn create_clip(
        &self,
        video: &str,
        clip_start: f64,
        clip_end: f64,
        captions: Vec<Caption>,
    ) -> CoreResult<ClipView> {
        let reference = VideoRef::parse(video)?;
        let clip = self.registry.create(&reference, clip_start, clip_end, captions).await?;
        Ok(self.view(clip))
    }

    pub fn list_clips(&self) -> Vec<ClipView> {
        self.registry.list().into_iter().map(|c| self.view(c)).collect()
    }

    pub fn get_clip(&self, id: &str) -> CoreResult<ClipView> {
        let clip = self.registry.get(&parse_clip_id(id)?)?;
        Ok(self.view(clip))
    }

    pub fn update_clip(&self, id: &str, update: ClipUpdate) -> CoreResult<ClipView> {
        let clip = self.registry.update(&parse_clip_id(id)?, update)?;
        Ok(self.view(clip))
    }

    pub async fn render_clip(&self, id: &str, kind: RenderKind) -> CoreResult<PathBuf> {
        self.pipeline.render(&parse_clip_id(id)?, kind).await
    }

    pub fn view(&self, clip: Clip) -> ClipView {
        let render = self.pipeline.render_status(&clip);
        ClipView {
            stale: clip.stale(),
            clip,
            render,
        }
    }

    /// Register the demo video and clip without touching the network.
    pub fn seed_demo(&self) -> Clip {
        let video = self.cache.register(ResolvedVideo {
            id: VideoId::from(demo::VIDEO_ID),
            title: demo::TITLE.to_string(),
            duration_seconds: demo::VIDEO_LENGTH,
            thumbnails: Vec::new(),
            webpage_url: format!("https://www.youtube.com/watch?v={}", demo::VIDEO_ID),
        });

        let captions = demo::CAPTIONS
            .iter()
            .map(|(start, end, text)| Caption::new(*start, *end, *text))
            .collect();
        let clip = Clip::with_id(ClipId::from(demo::CLIP_ID), &video, demo::CLIP_START, demo::CLIP_END)
            .with_captions(captions);

        self.registry.insert(clip.clone());
        info!(clip_id = demo::CLIP_ID, video_id = demo::VIDEO_ID, "Demo clip seeded");
        clip
    }

    /// Render the demo clip, then leave it stale so the next call renders again.
    pub async fn render_demo(&self, kind: RenderKind) -> CoreResult<PathBuf> {
        let clip_id = ClipId::from(demo::CLIP_ID);
        let video = VideoRef::Id(VideoId::from(demo::VIDEO_ID));
        self.cache.ensure_cached(&video, true).await?;

        let result = self.pipeline.render(&clip_id, kind).await;
        self.registry.invalidate(&clip_id)?;
        result
    }
}

fn parse_clip_id(id: &str) -> CoreResult<ClipId> {
    let id = ClipId::from(id);
    if !id.is_storage_safe() {
        return Err(CoreError::ClipNotFound(id));
    }
    Ok(id)
}
