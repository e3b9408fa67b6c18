//! Adapters for the external media tools.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout,
//!   kill-on-drop and progress parsing from `-progress pipe:2`
//! - An ordered filter-stage description (trim, fps, scale, drawtext)
//! - The `Encoder` seam and its FFmpeg implementation
//! - The `FetchAdapter` seam and its yt-dlp implementation

pub mod command;
pub mod encoder;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod stage;

pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use encoder::{EncodeJob, Encoder, FfmpegEncoder, ProgressCallback, StreamSelection};
pub use error::{MediaError, MediaResult};
pub use fetch::{ByteStream, FetchAdapter, ResolvedVideo, YtDlpFetcher};
pub use progress::FfmpegProgress;
pub use stage::{DrawText, FilterStage};
