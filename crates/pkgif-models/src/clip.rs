//! Clip, caption and render bookkeeping models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{VideoId, VideoRecord};

/// Unique identifier of a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Generate a new random clip ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used verbatim as a file name under the artifact root.
    pub fn is_storage_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClipId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A caption shown over the clip between `start` and `end`.
///
/// Times are relative to the start of the clip, not the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Caption {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Output artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    /// Low-resolution MP4 for scrubbing in the editor
    Preview,
    /// Full-resolution export
    Full,
}

impl RenderKind {
    pub const ALL: [RenderKind; 2] = [RenderKind::Preview, RenderKind::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderKind::Preview => "preview",
            RenderKind::Full => "full",
        }
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render status of one clip and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    NeedsRender,
    Rendering,
    Cached,
}

/// Revision of the clip last rendered successfully, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RenderedRevisions {
    preview: Option<u64>,
    full: Option<u64>,
}

impl RenderedRevisions {
    fn get(&self, kind: RenderKind) -> Option<u64> {
        match kind {
            RenderKind::Preview => self.preview,
            RenderKind::Full => self.full,
        }
    }

    fn set(&mut self, kind: RenderKind, revision: u64) {
        match kind {
            RenderKind::Preview => self.preview = Some(revision),
            RenderKind::Full => self.full = Some(revision),
        }
    }
}

/// A time range of a source video plus its captions.
///
/// Every mutation of `clip_start`, `clip_end` or `captions` bumps `revision`,
/// which invalidates every previously rendered kind at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    pub title: String,
    #[serde(rename = "type")]
    pub clip_type: String,
    pub video_id: VideoId,
    pub video_length: u32,
    pub clip_start: f64,
    /// Equal to or before `clip_start` means "to the end of the source"
    pub clip_end: f64,
    pub captions: Vec<Caption>,
    #[serde(skip)]
    revision: u64,
    #[serde(skip)]
    #[schemars(skip)]
    rendered: RenderedRevisions,
}

impl Clip {
    /// Create a new clip over `video` with no captions.
    pub fn new(video: &VideoRecord, clip_start: f64, clip_end: f64) -> Self {
        Self::with_id(ClipId::new(), video, clip_start, clip_end)
    }

    /// Create a clip with a caller-chosen id.
    pub fn with_id(id: ClipId, video: &VideoRecord, clip_start: f64, clip_end: f64) -> Self {
        Self {
            id,
            title: video.title.clone(),
            clip_type: "clip".to_string(),
            video_id: video.id.clone(),
            video_length: video.duration_seconds,
            clip_start,
            clip_end,
            captions: Vec::new(),
            revision: 0,
            rendered: RenderedRevisions::default(),
        }
    }

    /// Builder-style caption setter, counts as a mutation.
    pub fn with_captions(mut self, captions: Vec<Caption>) -> Self {
        self.replace_captions(captions);
        self
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Duration of the clip, or `None` when it runs to the end of the source.
    pub fn duration(&self) -> Option<f64> {
        (self.clip_end > self.clip_start).then(|| self.clip_end - self.clip_start)
    }

    /// Replace the caption list wholesale.
    pub fn replace_captions(&mut self, captions: Vec<Caption>) {
        self.captions = captions;
        self.touch();
    }

    /// Move the clip window.
    pub fn set_range(&mut self, clip_start: f64, clip_end: f64) {
        self.clip_start = clip_start;
        self.clip_end = clip_end;
        self.touch();
    }

    /// Apply a partial update. Returns `true` if anything changed.
    pub fn apply(&mut self, update: ClipUpdate) -> bool {
        let mut changed = false;
        if let Some(captions) = update.captions {
            self.captions = captions;
            changed = true;
        }
        if let Some(start) = update.clip_start {
            self.clip_start = start;
            changed = true;
        }
        if let Some(end) = update.clip_end {
            self.clip_end = end;
            changed = true;
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// Invalidate every rendered kind without changing any field.
    pub fn invalidate(&mut self) {
        self.touch();
    }

    /// Whether the artifact of `kind` does not reflect the current field values.
    pub fn is_stale_for(&self, kind: RenderKind) -> bool {
        self.rendered.get(kind) != Some(self.revision)
    }

    /// `true` until some render completes for the current field values.
    pub fn stale(&self) -> bool {
        RenderKind::ALL.iter().all(|k| self.is_stale_for(*k))
    }

    /// Record a successful render of `kind` made from `revision`.
    ///
    /// Ignored (returns `false`) if the clip was mutated after that revision
    /// was read, so a render can never clear staleness for newer values.
    pub fn mark_rendered(&mut self, kind: RenderKind, revision: u64) -> bool {
        if revision != self.revision {
            return false;
        }
        self.rendered.set(kind, revision);
        true
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Partial update to a clip. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipUpdate {
    pub captions: Option<Vec<Caption>>,
    pub clip_start: Option<f64>,
    pub clip_end: Option<f64>,
}

impl ClipUpdate {
    pub fn captions(captions: Vec<Caption>) -> Self {
        Self {
            captions: Some(captions),
            ..Default::default()
        }
    }
}

/// Render status of both kinds of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RenderStatus {
    pub preview: RenderState,
    pub full: RenderState,
}

/// A clip as presented to callers, with its derived flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipView {
    #[serde(flatten)]
    pub clip: Clip,
    pub stale: bool,
    pub render: RenderStatus,
}
