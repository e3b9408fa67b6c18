//! Cache and render coordination for the pkgif clip service.
//!
//! This crate provides:
//! - `VideoCache`: fetch-at-most-once source cache with an explicit
//!   `Absent -> Fetching -> Ready` state machine
//! - `ClipRegistry`: in-memory clip store with per-kind staleness
//! - `RenderPipeline`: deterministic stage lists, single-flight renders and
//!   atomic artifact writes
//! - `ClipService`: the facade used by the HTTP layer

pub mod clip_registry;
pub mod config;
pub mod error;
pub mod keyed_lock;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod service;
pub mod video_cache;

pub use clip_registry::ClipRegistry;
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use keyed_lock::KeyedLocks;
pub use layout::ArtifactLayout;
pub use logging::RenderLogger;
pub use render::{build_stages, RenderPipeline};
pub use service::ClipService;
pub use video_cache::VideoCache;
