//! In-process fakes and a router harness.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use pkgif_api::{create_router, ApiConfig, AppState};
use pkgif_core::{ClipService, CoreConfig};
use pkgif_media::{ByteStream, EncodeJob, Encoder, FetchAdapter, MediaError, MediaResult, ResolvedVideo};
use pkgif_models::VideoId;

pub const VIDEO_ID: &str = "cpPeXEh5Wkk";

#[derive(Default)]
pub struct FakeFetcher {
    gate: Option<Arc<Semaphore>>,
}

impl FakeFetcher {
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self { gate: Some(gate.clone()) }, gate)
    }
}

#[async_trait]
impl FetchAdapter for FakeFetcher {
    async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo> {
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
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| MediaError::fetch_failed("gate closed"))?;
            permit.forget();
        }
        Ok(stream::iter(vec![Ok(Bytes::from_static(b"source-bytes"))]).boxed())
    }
}

#[derive(Default)]
pub struct FakeEncoder {
    pub jobs: Mutex<Vec<EncodeJob>>,
    runs: AtomicUsize,
}

impl FakeEncoder {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn run(&self, job: &EncodeJob) -> MediaResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());
        tokio::fs::write(&job.output, format!("rendered from {}", job.input.display())).await?;
        Ok(())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub encoder: Arc<FakeEncoder>,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(FakeFetcher::default(), ApiConfig::default())
    }

    pub fn with_demo() -> Self {
        let config = ApiConfig {
            demo_routes: true,
            ..ApiConfig::default()
        };
        Self::build(FakeFetcher::default(), config)
    }

    pub fn build(fetcher: FakeFetcher, config: ApiConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let core_config = CoreConfig::default().with_data_dir(dir.path());
        let service = ClipService::new(core_config, Arc::new(fetcher), encoder.clone());
        let state = AppState::with_service(config, service);
        let router = create_router(state.clone(), None);
        Self {
            dir,
            encoder,
            state,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: &str, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn source_ready(&self) {
        self.state
            .service
            .cache()
            .wait_ready(&VideoId::from(VIDEO_ID), Duration::from_secs(5))
            .await
            .unwrap();
    }
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
