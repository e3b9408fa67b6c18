//! On-disk artifact layout.
//!
//! Every path is a pure function of an id (and kind); nothing here touches
//! the filesystem except `ensure_root`.

use std::path::{Path, PathBuf};

use pkgif_models::{ClipId, RenderKind, VideoId};

/// Extension of full renders (animated GIF).
pub const FULL_EXT: &str = "gif";

/// Extension of previews (MP4).
pub const PREVIEW_EXT: &str = "mp4";

/// Paths under a single artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<videoId>.mp4`
    pub fn source(&self, video_id: &VideoId) -> PathBuf {
        self.root.join(format!("{}.mp4", video_id))
    }

    /// `<root>/<videoId>-preview.mp4`
    pub fn video_preview(&self, video_id: &VideoId) -> PathBuf {
        self.root.join(format!("{}-preview.{}", video_id, PREVIEW_EXT))
    }

    /// `<root>/<clipId>.gif` or `<root>/<clipId>-preview.mp4`
    pub fn clip_output(&self, clip_id: &ClipId, kind: RenderKind) -> PathBuf {
        match kind {
            RenderKind::Full => self.root.join(format!("{}.{}", clip_id, FULL_EXT)),
            RenderKind::Preview => self.root.join(format!("{}-preview.{}", clip_id, PREVIEW_EXT)),
        }
    }

    /// File suffix used for temporary outputs of `kind`, so the encoder can
    /// infer the container from it.
    pub fn temp_suffix(kind: RenderKind) -> String {
        match kind {
            RenderKind::Full => format!(".{}", FULL_EXT),
            RenderKind::Preview => format!(".{}", PREVIEW_EXT),
        }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_keyed_by_id_and_kind() {
        let layout = ArtifactLayout::new("data");
        let video = VideoId::from("cpPeXEh5Wkk");
        let clip = ClipId::from("b6cab676-9952-46bf-969b-de7099627ae8");

        assert_eq!(layout.source(&video), PathBuf::from("data/cpPeXEh5Wkk.mp4"));
        assert_eq!(layout.video_preview(&video), PathBuf::from("data/cpPeXEh5Wkk-preview.mp4"));
        assert_eq!(
            layout.clip_output(&clip, RenderKind::Full),
            PathBuf::from("data/b6cab676-9952-46bf-969b-de7099627ae8.gif")
        );
        assert_eq!(
            layout.clip_output(&clip, RenderKind::Preview),
            PathBuf::from("data/b6cab676-9952-46bf-969b-de7099627ae8-preview.mp4")
        );
        assert_eq!(
            layout.clip_output(&clip, RenderKind::Full),
            layout.clip_output(&clip, RenderKind::Full)
        );
    }
}
