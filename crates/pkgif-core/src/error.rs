//! Core error types.

use thiserror::Error;

use pkgif_models::{CacheState, ClipId, RenderKind, VideoId, VideoRefError};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Fetch failed for {video_id}: {message}")]
    FetchFailed { video_id: VideoId, message: String },

    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    #[error("Source video {video_id} is not ready ({state})")]
    SourceNotReady { video_id: VideoId, state: CacheState },

    #[error("Render of {kind} for clip {clip_id} failed: {source}")]
    RenderFailed {
        clip_id: ClipId,
        kind: RenderKind,
        #[source]
        source: pkgif_media::MediaError,
    },

    #[error("Video preview for {video_id} failed: {source}")]
    PreviewFailed {
        video_id: VideoId,
        #[source]
        source: pkgif_media::MediaError,
    },

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Invalid video reference: {0}")]
    InvalidVideoRef(#[from] VideoRefError),

    #[error("Media error: {0}")]
    Media(#[from] pkgif_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn render_failed(clip_id: &ClipId, kind: RenderKind, source: pkgif_media::MediaError) -> Self {
        Self::RenderFailed {
            clip_id: clip_id.clone(),
            kind,
            source,
        }
    }

    /// Whether the same request may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::SourceNotReady { .. }
                | CoreError::RenderFailed { .. }
                | CoreError::PreviewFailed { .. }
                | CoreError::FetchFailed { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::VideoNotFound(_) | CoreError::ClipNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let not_ready = CoreError::SourceNotReady {
            video_id: VideoId::from("abc"),
            state: CacheState::Fetching,
        };
        assert!(not_ready.is_retryable());
        assert!(not_ready.to_string().contains("fetching"));

        let failed = CoreError::render_failed(
            &ClipId::from("c1"),
            RenderKind::Full,
            pkgif_media::MediaError::ffmpeg_failed("boom", None, Some(1)),
        );
        assert!(failed.is_retryable());
        assert!(!failed.is_not_found());

        assert!(CoreError::ClipNotFound(ClipId::from("c1")).is_not_found());
        assert!(!CoreError::malformed("videoId is required").is_retryable());
    }
}
