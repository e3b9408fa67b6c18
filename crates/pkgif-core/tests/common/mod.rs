//! In-process fakes for the fetch and encoder seams.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use pkgif_core::{ClipService, CoreConfig};
use pkgif_media::{
    ByteStream, EncodeJob, Encoder, FetchAdapter, FfmpegProgress, MediaError, MediaResult, ProgressCallback,
    ResolvedVideo,
};
use pkgif_models::VideoId;
use tempfile::TempDir;

pub const VIDEO_ID: &str = "cpPeXEh5Wkk";

/// Fetch adapter serving fixed bytes for any 11-character id.
#[derive(Default)]
pub struct FakeFetcher {
    pub resolves: AtomicUsize,
    pub opens: AtomicUsize,
    pub fail_stream: AtomicBool,
    /// When set, streams wait for a permit before yielding
    gate: Option<Arc<Semaphore>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams block until `release` is called.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(gate.clone()),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchAdapter for FakeFetcher {
    async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let id = target.rsplit('=').next().unwrap_or(target);
        if id.len() != 11 {
            return Err(MediaError::video_not_found(target));
        }
        Ok(ResolvedVideo {
            id: VideoId::from(id),
            title: "Max and Paddys Road to Nowhere Episode 01".to_string(),
            duration_seconds: 1423,
            thumbnails: vec![],
            webpage_url: format!("https://www.youtube.com/watch?v={}", id),
        })
    }

    async fn open_stream(&self, _video: &ResolvedVideo) -> MediaResult<ByteStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| MediaError::fetch_failed("gate closed"))?;
            permit.forget();
        }
        if self.fail_stream.load(Ordering::SeqCst) {
            let items = vec![
                Ok(Bytes::from_static(b"partial")),
                Err(std::io::Error::other("connection reset")),
            ];
            return Ok(stream::iter(items).boxed());
        }
        Ok(stream::iter(vec![Ok(Bytes::from_static(b"source-bytes"))]).boxed())
    }
}

/// Encoder that writes a marker file and records every job it sees.
#[derive(Default)]
pub struct FakeEncoder {
    pub jobs: Mutex<Vec<EncodeJob>>,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    /// Runs that were handed a progress callback
    pub progress_runs: AtomicUsize,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn jobs(&self) -> Vec<EncodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn run(&self, job: &EncodeJob) -> MediaResult<()> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // Half-written output, as a crashed encoder would leave
        tokio::fs::write(&job.output, b"partial").await?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Cannot find a valid font".to_string()),
                Some(1),
            ));
        }
        tokio::fs::write(&job.output, format!("rendered from {}", job.input.display())).await?;
        Ok(())
    }

    async fn run_with_progress(&self, job: &EncodeJob, on_progress: ProgressCallback) -> MediaResult<()> {
        self.progress_runs.fetch_add(1, Ordering::SeqCst);
        on_progress(FfmpegProgress {
            frame: 18,
            out_time_ms: 1200,
            speed: 1.5,
            is_complete: false,
        });
        let result = self.run(job).await;
        on_progress(FfmpegProgress {
            frame: 36,
            out_time_ms: 2400,
            speed: 1.5,
            is_complete: true,
        });
        result
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub fetcher: Arc<FakeFetcher>,
    pub encoder: Arc<FakeEncoder>,
    pub service: ClipService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeFetcher::new(), FakeEncoder::new(), Duration::ZERO)
    }

    pub fn with(fetcher: FakeFetcher, encoder: FakeEncoder, source_wait: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(fetcher);
        let encoder = Arc::new(encoder);
        let config = CoreConfig::default()
            .with_data_dir(dir.path())
            .with_source_wait(source_wait);
        let service = ClipService::new(config, fetcher.clone(), encoder.clone());
        Self {
            dir,
            fetcher,
            encoder,
            service,
        }
    }

    /// Wait until the source of `VIDEO_ID` is cached.
    pub async fn source_ready(&self) {
        self.service
            .cache()
            .wait_ready(&VideoId::from(VIDEO_ID), Duration::from_secs(5))
            .await
            .unwrap();
    }
}
