//! The fetch seam: resolving a video reference and streaming its bytes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pkgif_models::{Thumbnail, VideoId};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Bytes of a source video, in order.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Read size for the download pipe.
const CHUNK_SIZE: usize = 256 * 1024;

/// Upper bound on a metadata lookup.
const RESOLVE_TIMEOUT_SECS: u64 = 120;

/// Single-file format with both audio and video, mp4 preferred.
const STREAM_FORMAT: &str = "b[ext=mp4]/b";

/// Stream metadata for a resolved reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVideo {
    pub id: VideoId,
    pub title: String,
    /// Whole seconds, floor of the real duration
    pub duration_seconds: u32,
    pub thumbnails: Vec<Thumbnail>,
    /// Canonical page URL handed back to `open_stream`
    pub webpage_url: String,
}

/// Source of remote videos.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Resolve an id or URL. Fails with `VideoNotFound` for unknown references.
    async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo>;

    /// Open the byte stream of a resolved video.
    async fn open_stream(&self, video: &ResolvedVideo) -> MediaResult<ByteStream>;
}

/// Subset of `yt-dlp --dump-single-json` output.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
    #[serde(default)]
    webpage_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl YtDlpInfo {
    fn into_resolved(self, target: &str) -> ResolvedVideo {
        ResolvedVideo {
            id: VideoId::from(self.id),
            title: self.title.unwrap_or_default(),
            duration_seconds: self
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.floor() as u32)
                .unwrap_or(0),
            thumbnails: self
                .thumbnails
                .into_iter()
                .map(|t| Thumbnail {
                    url: t.url,
                    width: t.width.unwrap_or(0),
                    height: t.height.unwrap_or(0),
                })
                .collect(),
            webpage_url: self.webpage_url.unwrap_or_else(|| target.to_string()),
        }
    }
}

/// `FetchAdapter` backed by the `yt-dlp` binary.
#[derive(Debug, Clone, Default)]
pub struct YtDlpFetcher {
    extra_args: Vec<String>,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra arguments passed to every invocation (cookies, proxies, ...).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl FetchAdapter for YtDlpFetcher {
    async fn resolve(&self, target: &str) -> MediaResult<ResolvedVideo> {
        let ytdlp = check_ytdlp()?;
        debug!(target = target, "Resolving video metadata");

        let output = Command::new(ytdlp)
            .args(["--dump-single-json", "--no-playlist", "--skip-download", "--no-warnings"])
            .args(&self.extra_args)
            .arg("--")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(RESOLVE_TIMEOUT_SECS), output)
            .await
            .map_err(|_| MediaError::Timeout(RESOLVE_TIMEOUT_SECS))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error_msg = stderr.lines().last().unwrap_or("Unknown error");
            if is_not_found_message(&stderr) {
                return Err(MediaError::video_not_found(target));
            }
            return Err(MediaError::fetch_failed(format!("yt-dlp failed: {}", error_msg)));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)?;
        let resolved = info.into_resolved(target);
        info!(
            video_id = %resolved.id,
            duration = resolved.duration_seconds,
            "Resolved video"
        );
        Ok(resolved)
    }

    async fn open_stream(&self, video: &ResolvedVideo) -> MediaResult<ByteStream> {
        let ytdlp = check_ytdlp()?;

        let mut child = Command::new(ytdlp)
            .args(["--no-playlist", "--no-progress", "--no-warnings", "-f", STREAM_FORMAT, "-o", "-"])
            .args(&self.extra_args)
            .arg("--")
            .arg(&video.webpage_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::fetch_failed("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::fetch_failed("stderr not captured"))?;

        // Drained concurrently so a chatty stderr cannot stall the pipe
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut text).await;
            text
        });

        debug!(video_id = %video.id, "Opened source stream");
        Ok(child_stream(child, stdout, stderr_task))
    }
}

struct PipeState {
    child: Option<Child>,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
}

/// Stream a child's stdout, then surface a non-zero exit as a final error.
fn child_stream(child: Child, stdout: ChildStdout, stderr_task: JoinHandle<String>) -> ByteStream {
    let state = PipeState {
        child: Some(child),
        stdout,
        stderr_task: Some(stderr_task),
    };

    stream::unfold(state, |mut state| async move {
        state.child.as_ref()?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        match state.stdout.read(&mut buf).await {
            Ok(0) => {
                let mut child = state.child.take()?;
                let status = match child.wait().await {
                    Ok(status) => status,
                    Err(e) => return Some((Err(e), state)),
                };
                if status.success() {
                    return None;
                }
                let stderr = match state.stderr_task.take() {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                let last = stderr.lines().last().unwrap_or("Unknown error").to_string();
                warn!(exit_code = ?status.code(), "yt-dlp stream ended with an error");
                Some((Err(io::Error::other(format!("yt-dlp failed: {}", last))), state))
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), state))
            }
            Err(e) => {
                state.child = None;
                Some((Err(e), state))
            }
        }
    })
    .boxed()
}

fn is_not_found_message(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "Video unavailable",
        "is not a valid URL",
        "Unsupported URL",
        "does not exist",
        "HTTP Error 404",
        "Incomplete YouTube ID",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}
