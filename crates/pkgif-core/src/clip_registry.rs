//! In-memory clip store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use pkgif_models::{Caption, Clip, ClipId, ClipUpdate, RenderKind, VideoRef};

use crate::error::{CoreError, CoreResult};
use crate::video_cache::VideoCache;

/// Owns every clip for the lifetime of the process; cheap to clone.
///
/// Reads hand out snapshots, so a caller never observes a clip halfway
/// through an update.
#[derive(Clone)]
pub struct ClipRegistry {
    clips: Arc<RwLock<HashMap<ClipId, Clip>>>,
    cache: VideoCache,
}

impl ClipRegistry {
    pub fn new(cache: VideoCache) -> Self {
        Self {
            clips: Arc::new(RwLock::new(HashMap::new())),
            cache,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClipId, Clip>> {
        self.clips.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClipId, Clip>> {
        self.clips.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a clip over `video`. Also asks the cache to fetch the source.
    pub async fn create(
        &self,
        video: &VideoRef,
        clip_start: f64,
        clip_end: f64,
        captions: Vec<Caption>,
    ) -> CoreResult<Clip> {
        let record = self.cache.ensure_cached(video, true).await?;

        let mut clip = Clip::new(&record, clip_start, clip_end);
        if !captions.is_empty() {
            clip.replace_captions(captions);
        }

        self.write().insert(clip.id.clone(), clip.clone());
        info!(
            clip_id = %clip.id,
            video_id = %clip.video_id,
            clip_start = clip_start,
            clip_end = clip_end,
            "Clip created"
        );
        Ok(clip)
    }

    /// Insert a fully built clip, replacing any clip with the same id.
    pub fn insert(&self, clip: Clip) {
        debug!(clip_id = %clip.id, "Clip inserted");
        self.write().insert(clip.id.clone(), clip);
    }

    pub fn get(&self, id: &ClipId) -> CoreResult<Clip> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::ClipNotFound(id.clone()))
    }

    /// Apply `update`; any change invalidates every rendered kind.
    pub fn update(&self, id: &ClipId, update: ClipUpdate) -> CoreResult<Clip> {
        let mut clips = self.write();
        let clip = clips
            .get_mut(id)
            .ok_or_else(|| CoreError::ClipNotFound(id.clone()))?;

        if clip.apply(update) {
            debug!(clip_id = %id, revision = clip.revision(), "Clip updated");
        }
        Ok(clip.clone())
    }

    /// Replace the caption list wholesale.
    pub fn update_captions(&self, id: &ClipId, captions: Vec<Caption>) -> CoreResult<Clip> {
        self.update(id, ClipUpdate::captions(captions))
    }

    /// Every clip, in no particular order.
    pub fn list(&self) -> Vec<Clip> {
        self.read().values().cloned().collect()
    }

    /// Record a render of `kind` made from the clip at `revision`.
    ///
    /// Returns `false` if the clip changed since, leaving it stale.
    pub fn mark_rendered(&self, id: &ClipId, kind: RenderKind, revision: u64) -> CoreResult<bool> {
        let mut clips = self.write();
        let clip = clips
            .get_mut(id)
            .ok_or_else(|| CoreError::ClipNotFound(id.clone()))?;
        Ok(clip.mark_rendered(kind, revision))
    }

    /// Make every kind of the clip stale without changing its fields.
    pub fn invalidate(&self, id: &ClipId) -> CoreResult<()> {
        let mut clips = self.write();
        let clip = clips
            .get_mut(id)
            .ok_or_else(|| CoreError::ClipNotFound(id.clone()))?;
        clip.invalidate();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
