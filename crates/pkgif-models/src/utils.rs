//! Video reference parsing.
//!
//! Callers may name a video by its bare id or by a watch URL. YouTube URLs
//! are reduced to their 11-character id up front so the same video maps to a
//! single cache record however it was referenced.

use thiserror::Error;
use url::Url;

use crate::VideoId;

/// Length of a YouTube video id.
const YOUTUBE_ID_LEN: usize = 11;

/// Errors that can occur while parsing a video reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoRefError {
    #[error("video reference is empty")]
    Empty,

    #[error("URL scheme must be http or https")]
    UnsupportedScheme,

    #[error("YouTube URL does not contain a video id")]
    VideoIdNotFound,

    #[error("video id has invalid format")]
    InvalidVideoId,
}

/// A caller-supplied video reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoRef {
    /// A bare id, usable as a cache key without asking the fetch adapter
    Id(VideoId),
    /// A URL whose canonical id only the fetch adapter can tell
    Url(String),
}

impl VideoRef {
    /// Parse an id or URL.
    pub fn parse(input: &str) -> Result<Self, VideoRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VideoRefError::Empty);
        }

        if !input.contains("://") {
            let id = VideoId::from(input);
            return if id.is_storage_safe() {
                Ok(VideoRef::Id(id))
            } else {
                Err(VideoRefError::InvalidVideoId)
            };
        }

        let url = Url::parse(input).map_err(|_| VideoRefError::UnsupportedScheme)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(VideoRefError::UnsupportedScheme);
        }

        if is_youtube_host(&url) {
            return youtube_id(&url).map(VideoRef::Id);
        }

        Ok(VideoRef::Url(input.to_string()))
    }

    /// Cache key known without resolving, if any.
    pub fn known_id(&self) -> Option<&VideoId> {
        match self {
            VideoRef::Id(id) => Some(id),
            VideoRef::Url(_) => None,
        }
    }

    /// String handed to the fetch adapter.
    pub fn as_target(&self) -> &str {
        match self {
            VideoRef::Id(id) => id.as_str(),
            VideoRef::Url(url) => url,
        }
    }
}

fn is_youtube_host(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com")
}

/// Pull the id out of watch, short-link, embed, `/v/` and shorts URLs.
fn youtube_id(url: &Url) -> Result<VideoId, VideoRefError> {
    if let Some((_, v)) = url.query_pairs().find(|(k, _)| *k == "v") {
        return validate_youtube_id(&v);
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if url.host_str().is_some_and(|h| h.eq_ignore_ascii_case("youtu.be")) {
        segments.first().copied()
    } else {
        match segments.as_slice() {
            ["embed" | "v" | "shorts" | "live", id, ..] => Some(*id),
            _ => None,
        }
    };

    candidate
        .ok_or(VideoRefError::VideoIdNotFound)
        .and_then(validate_youtube_id)
}

fn validate_youtube_id(id: &str) -> Result<VideoId, VideoRefError> {
    let id = VideoId::from(id.trim());
    if id.as_str().len() != YOUTUBE_ID_LEN || !id.is_storage_safe() {
        return Err(VideoRefError::InvalidVideoId);
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> VideoRef {
        VideoRef::Id(VideoId::from(s))
    }

    #[test]
    fn test_bare_ids() {
        assert_eq!(VideoRef::parse("cpPeXEh5Wkk").unwrap(), id("cpPeXEh5Wkk"));
        assert_eq!(VideoRef::parse("  cpPeXEh5Wkk ").unwrap(), id("cpPeXEh5Wkk"));
        assert_eq!(VideoRef::parse(""), Err(VideoRefError::Empty));
        assert_eq!(VideoRef::parse("../secret"), Err(VideoRefError::InvalidVideoId));
    }

    #[test]
    fn test_youtube_url_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=30",
            "https://youtu.be/dQw4w9WgXcQ?t=30",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/v/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://YOUTUBE.COM/watch?v=dQw4w9WgXcQ",
        ] {
            assert_eq!(VideoRef::parse(url).unwrap(), id("dQw4w9WgXcQ"), "{}", url);
        }
    }

    #[test]
    fn test_youtube_url_errors() {
        assert_eq!(
            VideoRef::parse("https://youtube.com/"),
            Err(VideoRefError::VideoIdNotFound)
        );
        assert_eq!(
            VideoRef::parse("https://youtube.com/watch?v=abc123"),
            Err(VideoRefError::InvalidVideoId)
        );
        assert_eq!(
            VideoRef::parse("https://youtube.com/watch?v=abc123def!!"),
            Err(VideoRefError::InvalidVideoId)
        );
        assert_eq!(
            VideoRef::parse("ftp://youtube.com/watch?v=dQw4w9WgXcQ"),
            Err(VideoRefError::UnsupportedScheme)
        );
    }

    #[test]
    fn test_other_hosts_are_passed_through() {
        let parsed = VideoRef::parse("https://vimeo.com/123456").unwrap();
        assert_eq!(parsed, VideoRef::Url("https://vimeo.com/123456".to_string()));
        assert!(parsed.known_id().is_none());
        assert_eq!(parsed.as_target(), "https://vimeo.com/123456");
    }
}
