//! Shared data models for the pkgif clip service.
//!
//! This crate provides Serde-serializable types for:
//! - Source videos and their local cache state
//! - Clips, captions and per-kind render bookkeeping
//! - Request bodies accepted by the HTTP boundary
//! - Video reference parsing (bare ids and watch URLs)

pub mod clip;
pub mod request;
pub mod utils;
pub mod video;

// Re-export common types
pub use clip::{Caption, Clip, ClipId, ClipUpdate, ClipView, RenderKind, RenderState, RenderStatus};
pub use request::{CreateClipRequest, CreateVideoRequest, UpdateClipRequest};
pub use utils::{VideoRef, VideoRefError};
pub use video::{CacheState, Thumbnail, VideoId, VideoRecord};
