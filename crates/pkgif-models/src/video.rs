//! Source video models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a source video as reported by the fetch adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
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

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of the locally stored copy of a source video.
///
/// Legal transitions are `Absent -> Fetching`, `Fetching -> Ready` and
/// `Fetching -> Absent` (fetch failure). Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    #[default]
    Absent,
    Fetching,
    Ready,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Absent => "absent",
            CacheState::Fetching => "fetching",
            CacheState::Ready => "ready",
        }
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: CacheState) -> bool {
        matches!(
            (self, next),
            (CacheState::Absent, CacheState::Fetching)
                | (CacheState::Fetching, CacheState::Ready)
                | (CacheState::Fetching, CacheState::Absent)
        )
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A preview image advertised by the video host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Metadata and cache state for one source video.
///
/// Created on first reference to an id and kept for the process lifetime.
/// Only `cache_state` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    /// Whole seconds, floor of the real duration
    #[serde(rename = "length")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(rename = "status")]
    pub cache_state: CacheState,
}

impl VideoRecord {
    /// Create a record in the `Absent` state.
    pub fn new(
        id: VideoId,
        title: impl Into<String>,
        duration_seconds: u32,
        thumbnails: Vec<Thumbnail>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            duration_seconds,
            thumbnails,
            cache_state: CacheState::Absent,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cache_state == CacheState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_state_transitions() {
        use CacheState::*;

        assert!(Absent.can_transition_to(Fetching));
        assert!(Fetching.can_transition_to(Ready));
        assert!(Fetching.can_transition_to(Absent));

        assert!(!Absent.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Absent));
        assert!(!Ready.can_transition_to(Fetching));
        assert!(!Fetching.can_transition_to(Fetching));
    }

    #[test]
    fn test_storage_safe_ids() {
        assert!(VideoId::from("cpPeXEh5Wkk").is_storage_safe());
        assert!(VideoId::from("a_b-c").is_storage_safe());
        assert!(!VideoId::from("").is_storage_safe());
        assert!(!VideoId::from("../etc/passwd").is_storage_safe());
        assert!(!VideoId::from("a b").is_storage_safe());
    }

    #[test]
    fn test_record_wire_format() {
        let record = VideoRecord::new(VideoId::from("cpPeXEh5Wkk"), "Road to Nowhere", 1423, vec![]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], "cpPeXEh5Wkk");
        assert_eq!(json["length"], 1423);
        assert_eq!(json["status"], "absent");
        assert!(json["thumbnails"].as_array().unwrap().is_empty());
    }
}
