//! Local cache of source videos.
//!
//! Each video id moves through `Absent -> Fetching -> Ready`, falling back to
//! `Absent` when a fetch fails. The `Absent -> Fetching` check-and-set happens
//! under the map lock, so at most one fetch task per id is ever in flight.
//! Fetch tasks are tracked per entry and publish state changes on a watch
//! channel that renders can wait on.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pkgif_media::{FetchAdapter, MediaError, ResolvedVideo};
use pkgif_models::{CacheState, VideoId, VideoRecord, VideoRef};

use crate::error::{CoreError, CoreResult};
use crate::layout::ArtifactLayout;
use crate::metrics;

struct VideoEntry {
    resolved: ResolvedVideo,
    state: watch::Sender<CacheState>,
    fetch_task: Option<JoinHandle<()>>,
}

impl VideoEntry {
    fn new(resolved: ResolvedVideo) -> Self {
        let (state, _) = watch::channel(CacheState::Absent);
        Self {
            resolved,
            state,
            fetch_task: None,
        }
    }

    fn record(&self) -> VideoRecord {
        let mut record = VideoRecord::new(
            self.resolved.id.clone(),
            self.resolved.title.clone(),
            self.resolved.duration_seconds,
            self.resolved.thumbnails.clone(),
        );
        record.cache_state = *self.state.borrow();
        record
    }
}

struct Inner {
    layout: ArtifactLayout,
    fetcher: Arc<dyn FetchAdapter>,
    entries: Mutex<HashMap<VideoId, VideoEntry>>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<VideoId, VideoEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a state change if it is legal; returns whether it was applied.
    fn transition(&self, id: &VideoId, next: CacheState) -> bool {
        let entries = self.entries();
        let Some(entry) = entries.get(id) else {
            return false;
        };
        let current = *entry.state.borrow();
        if !current.can_transition_to(next) {
            warn!(video_id = %id, from = %current, to = %next, "Rejected cache state transition");
            return false;
        }
        entry.state.send_replace(next);
        debug!(video_id = %id, from = %current, to = %next, "Cache state changed");
        true
    }
}

/// Process-wide cache of source videos, cheap to clone.
#[derive(Clone)]
pub struct VideoCache {
    inner: Arc<Inner>,
}

impl VideoCache {
    pub fn new(layout: ArtifactLayout, fetcher: Arc<dyn FetchAdapter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                layout,
                fetcher,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Deterministic location of the source file; it need not exist.
    pub fn local_path(&self, id: &VideoId) -> PathBuf {
        self.inner.layout.source(id)
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.inner.layout
    }

    /// Look up or create the record for `reference`, optionally starting a fetch.
    ///
    /// A reference whose id is already known is not resolved again. When
    /// `want_fetch` is set and the video is `Absent`, exactly one caller moves
    /// it to `Fetching` and spawns the fetch; everybody returns immediately
    /// with the current record.
    pub async fn ensure_cached(&self, reference: &VideoRef, want_fetch: bool) -> CoreResult<VideoRecord> {
        let known = reference
            .known_id()
            .filter(|id| self.inner.entries().contains_key(*id))
            .cloned();

        let id = match known {
            Some(id) => id,
            None => {
                let resolved = self.resolve(reference).await?;
                let id = resolved.id.clone();
                self.inner
                    .entries()
                    .entry(id.clone())
                    .or_insert_with(|| VideoEntry::new(resolved));
                id
            }
        };

        let mut entries = self.inner.entries();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| CoreError::VideoNotFound(id.to_string()))?;

        if want_fetch && *entry.state.borrow() == CacheState::Absent {
            entry.state.send_replace(CacheState::Fetching);
            metrics::record_fetch_started();
            info!(video_id = %id, "Starting background fetch");

            let inner = self.inner.clone();
            let resolved = entry.resolved.clone();
            entry.fetch_task = Some(tokio::spawn(guarded_fetch(inner, resolved)));
        }

        Ok(entry.record())
    }

    /// Register metadata known up front. An existing entry is left untouched.
    pub fn register(&self, resolved: ResolvedVideo) -> VideoRecord {
        self.inner
            .entries()
            .entry(resolved.id.clone())
            .or_insert_with(|| VideoEntry::new(resolved))
            .record()
    }

    pub fn get(&self, id: &VideoId) -> Option<VideoRecord> {
        self.inner.entries().get(id).map(VideoEntry::record)
    }

    pub fn state(&self, id: &VideoId) -> CacheState {
        self.inner
            .entries()
            .get(id)
            .map(|e| *e.state.borrow())
            .unwrap_or_default()
    }

    /// Whether a fetch task for `id` is still running. Never blocks.
    pub fn fetch_in_progress(&self, id: &VideoId) -> bool {
        self.inner
            .entries()
            .get(id)
            .and_then(|e| e.fetch_task.as_ref())
            .is_some_and(|task| !task.is_finished())
    }

    /// Return the record once the source is `Ready`.
    ///
    /// A `Fetching` source is waited on for at most `wait`; anything else
    /// that is not `Ready` is reported as `SourceNotReady` right away.
    pub async fn wait_ready(&self, id: &VideoId, wait: Duration) -> CoreResult<VideoRecord> {
        let mut rx = {
            let entries = self.inner.entries();
            match entries.get(id) {
                Some(entry) => entry.state.subscribe(),
                None => {
                    return Err(CoreError::SourceNotReady {
                        video_id: id.clone(),
                        state: CacheState::Absent,
                    })
                }
            }
        };

        let state = *rx.borrow_and_update();
        let state = if state == CacheState::Fetching && !wait.is_zero() {
            let settled = tokio::time::timeout(wait, rx.wait_for(|s| *s != CacheState::Fetching))
                .await
                .ok()
                .and_then(|r| r.ok().map(|s| *s));
            settled.unwrap_or_else(|| *rx.borrow())
        } else {
            state
        };

        if state != CacheState::Ready {
            return Err(CoreError::SourceNotReady {
                video_id: id.clone(),
                state,
            });
        }

        self.get(id).ok_or_else(|| CoreError::VideoNotFound(id.to_string()))
    }

    async fn resolve(&self, reference: &VideoRef) -> CoreResult<ResolvedVideo> {
        let target = reference.as_target();
        let resolved = self.inner.fetcher.resolve(target).await.map_err(|e| match e {
            MediaError::VideoNotFound(_) => CoreError::VideoNotFound(target.to_string()),
            other => CoreError::Media(other),
        })?;

        if !resolved.id.is_storage_safe() {
            return Err(CoreError::malformed(format!(
                "video id {:?} cannot be stored",
                resolved.id.as_str()
            )));
        }
        Ok(resolved)
    }
}

/// Run the fetch task, putting the source back to `Absent` if it panics.
async fn guarded_fetch(inner: Arc<Inner>, resolved: ResolvedVideo) {
    let id = resolved.id.clone();
    if AssertUnwindSafe(run_fetch(inner.clone(), resolved))
        .catch_unwind()
        .await
        .is_err()
    {
        error!(video_id = %id, "Fetch task panicked, source reset to absent");
        inner.transition(&id, CacheState::Absent);
        metrics::record_fetch_failed();
    }
}

/// Background fetch. Ends in `Ready`, or back in `Absent` with nothing left
/// at the destination.
async fn run_fetch(inner: Arc<Inner>, resolved: ResolvedVideo) {
    let id = resolved.id.clone();
    let dest = inner.layout.source(&id);
    let started = Instant::now();

    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        info!(video_id = %id, path = %dest.display(), "Source already on disk, skipping fetch");
        inner.transition(&id, CacheState::Ready);
        metrics::record_fetch_completed(started.elapsed().as_secs_f64());
        return;
    }

    match fetch_to(inner.fetcher.as_ref(), &inner.layout, &resolved, &dest).await {
        Ok(bytes) => {
            let elapsed = started.elapsed().as_secs_f64();
            info!(
                video_id = %id,
                size_mb = bytes as f64 / (1024.0 * 1024.0),
                elapsed_secs = elapsed,
                "Fetched source video"
            );
            inner.transition(&id, CacheState::Ready);
            metrics::record_fetch_completed(elapsed);
        }
        Err(e) => {
            let err = CoreError::FetchFailed {
                video_id: id.clone(),
                message: e.to_string(),
            };
            warn!(video_id = %id, error = %err, "Fetch failed, source reset to absent");
            inner.transition(&id, CacheState::Absent);
            metrics::record_fetch_failed();
        }
    }
}

/// Stream the video into a temp file beside `dest`, then move it into place.
async fn fetch_to(
    fetcher: &dyn FetchAdapter,
    layout: &ArtifactLayout,
    resolved: &ResolvedVideo,
    dest: &Path,
) -> CoreResult<u64> {
    layout.ensure_root().await?;

    // Removed on drop, so every early return discards the partial file
    let (file, temp_path) = tempfile::Builder::new()
        .prefix(".fetch-")
        .suffix(".part")
        .tempfile_in(layout.root())?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut stream = fetcher.open_stream(resolved).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    if written == 0 {
        return Err(MediaError::fetch_failed("source stream was empty").into());
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    temp_path.persist(dest).map_err(|e| e.error)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use pkgif_media::{ByteStream, MediaResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct OneShotFetcher {
        opens: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FetchAdapter for OneShotFetcher {
        async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo> {
            if target == "missing" {
                return Err(MediaError::video_not_found(target));
            }
            Ok(ResolvedVideo {
                id: VideoId::from(target),
                title: "Road to Nowhere".to_string(),
                duration_seconds: 1423,
                thumbnails: vec![],
                webpage_url: format!("https://www.youtube.com/watch?v={}", target),
            })
        }

        async fn open_stream(&self, _video: &ResolvedVideo) -> MediaResult<ByteStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                let items = vec![
                    Ok(Bytes::from_static(b"partial")),
                    Err(std::io::Error::other("connection reset")),
                ];
                return Ok(stream::iter(items).boxed());
            }
            Ok(stream::iter(vec![Ok(Bytes::from_static(b"video-bytes"))]).boxed())
        }
    }

    /// Panics on the first stream it is asked for.
    #[derive(Default)]
    struct PanickingFetcher {
        opens: AtomicUsize,
    }

    #[async_trait]
    impl FetchAdapter for PanickingFetcher {
        async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo> {
            Ok(ResolvedVideo {
                id: VideoId::from(target),
                title: "Road to Nowhere".to_string(),
                duration_seconds: 1423,
                thumbnails: vec![],
                webpage_url: format!("https://www.youtube.com/watch?v={}", target),
            })
        }

        async fn open_stream(&self, _video: &ResolvedVideo) -> MediaResult<ByteStream> {
            if self.opens.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("adapter bug");
            }
            Ok(stream::iter(vec![Ok(Bytes::from_static(b"video-bytes"))]).boxed())
        }
    }

    fn cache(dir: &TempDir, fail: bool) -> (VideoCache, Arc<OneShotFetcher>) {
        let fetcher = Arc::new(OneShotFetcher {
            opens: AtomicUsize::new(0),
            fail,
        });
        (VideoCache::new(ArtifactLayout::new(dir.path()), fetcher.clone()), fetcher)
    }

    fn id_ref(id: &str) -> VideoRef {
        VideoRef::Id(VideoId::from(id))
    }

    #[tokio::test]
    async fn test_resolve_without_fetch_stays_absent() {
        let dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache(&dir, false);

        let record = cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), false).await.unwrap();
        assert_eq!(record.cache_state, CacheState::Absent);
        assert_eq!(record.duration_seconds, 1423);
        assert_eq!(fetcher.opens.load(Ordering::SeqCst), 0);
        assert!(!cache.fetch_in_progress(&record.id));
    }

    #[tokio::test]
    async fn test_unknown_video_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = cache(&dir, false);

        let err = cache.ensure_cached(&id_ref("missing"), true).await.unwrap_err();
        assert!(matches!(err, CoreError::VideoNotFound(_)));
        assert!(cache.get(&VideoId::from("missing")).is_none());
    }

    #[tokio::test]
    async fn test_fetch_reaches_ready() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = cache(&dir, false);
        let id = VideoId::from("cpPeXEh5Wkk");

        let record = cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        assert_eq!(record.cache_state, CacheState::Fetching);

        let record = cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap();
        assert!(record.is_ready());
        assert_eq!(std::fs::read(cache.local_path(&id)).unwrap(), b"video-bytes");
    }

    #[tokio::test]
    async fn test_failed_fetch_resets_to_absent_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache(&dir, true);
        let id = VideoId::from("cpPeXEh5Wkk");

        cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        let err = cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CoreError::SourceNotReady { state: CacheState::Absent, .. }));

        assert!(!cache.local_path(&id).exists());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);

        // Retry is caller-driven
        let record = cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        assert_eq!(record.cache_state, CacheState::Fetching);
        let _ = cache.wait_ready(&id, Duration::from_secs(5)).await;
        assert_eq!(fetcher.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache(&dir, false);
        let id = VideoId::from("cpPeXEh5Wkk");
        std::fs::write(cache.local_path(&id), b"already here").unwrap();

        cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap();

        assert_eq!(fetcher.opens.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(cache.local_path(&id)).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_wait_ready_fails_fast_when_absent() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = cache(&dir, false);
        let id = VideoId::from("cpPeXEh5Wkk");

        cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), false).await.unwrap();
        let err = cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CoreError::SourceNotReady { state: CacheState::Absent, .. }));
    }

    #[tokio::test]
    async fn test_panicking_fetch_resets_to_absent() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(PanickingFetcher::default());
        let cache = VideoCache::new(ArtifactLayout::new(dir.path()), fetcher.clone());
        let id = VideoId::from("cpPeXEh5Wkk");

        let record = cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        assert_eq!(record.cache_state, CacheState::Fetching);

        let err = cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CoreError::SourceNotReady { state: CacheState::Absent, .. }));
        assert_eq!(cache.state(&id), CacheState::Absent);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // A later caller can start the fetch again
        let record = cache.ensure_cached(&id_ref("cpPeXEh5Wkk"), true).await.unwrap();
        assert_eq!(record.cache_state, CacheState::Fetching);
        cache.wait_ready(&id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(fetcher.opens.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read(cache.local_path(&id)).unwrap(), b"video-bytes");
    }
}
