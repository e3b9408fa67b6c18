//! The encoder seam.
//!
//! Callers hand over an ordered stage list plus input and output paths. The
//! output path is always a temporary location owned by the caller, which
//! moves it into place on success.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;
use crate::stage::{filter_chain, trim_of, FilterStage};

/// Which input streams end up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSelection {
    /// First video stream only (GIF output)
    #[default]
    VideoOnly,
    /// First video stream plus audio when the input has any
    VideoAndAudio,
}

/// One encode: input, ordered stages, output.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub stages: Vec<FilterStage>,
    pub output: PathBuf,
    pub streams: StreamSelection,
}

impl EncodeJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, stages: Vec<FilterStage>) -> Self {
        Self {
            input: input.into(),
            stages,
            output: output.into(),
            streams: StreamSelection::default(),
        }
    }

    pub fn with_streams(mut self, streams: StreamSelection) -> Self {
        self.streams = streams;
        self
    }

    /// Fail early on stage lists the encoder cannot express.
    pub fn validate(&self) -> MediaResult<()> {
        let trims = self
            .stages
            .iter()
            .filter(|s| matches!(s, FilterStage::Trim { .. }))
            .count();
        if trims > 1 {
            return Err(MediaError::InvalidStage("at most one trim stage".to_string()));
        }
        if let Some((start, duration)) = trim_of(&self.stages) {
            if !start.is_finite() || start < 0.0 {
                return Err(MediaError::InvalidStage(format!("trim start {}", start)));
            }
            if duration.is_some_and(|d| !d.is_finite() || d <= 0.0) {
                return Err(MediaError::InvalidStage("trim duration must be positive".to_string()));
            }
        }
        for stage in &self.stages {
            match stage {
                FilterStage::FrameRate { fps: 0 } | FilterStage::Scale { width: 0 } => {
                    return Err(MediaError::InvalidStage(format!("{} must be non-zero", stage.name())));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Receives progress snapshots while an encode runs.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync>;

/// Executes an `EncodeJob`.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn run(&self, job: &EncodeJob) -> MediaResult<()>;

    /// Run `job`, reporting progress along the way. Encoders that cannot
    /// report progress just run the job.
    async fn run_with_progress(&self, job: &EncodeJob, on_progress: ProgressCallback) -> MediaResult<()> {
        drop(on_progress);
        self.run(job).await
    }
}

/// `Encoder` backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    timeout_secs: Option<u64>,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Translate a job into an FFmpeg invocation.
    pub fn command(job: &EncodeJob) -> MediaResult<FfmpegCommand> {
        job.validate()?;

        let mut cmd = FfmpegCommand::new(&job.input, &job.output);

        if let Some((start, duration)) = trim_of(&job.stages) {
            cmd = cmd.seek(start);
            if let Some(duration) = duration {
                cmd = cmd.duration(duration);
            }
        }

        if let Some(chain) = filter_chain(&job.stages) {
            cmd = cmd.video_filter(chain);
        }

        cmd = cmd.map("0:v:0");
        if job.streams == StreamSelection::VideoAndAudio {
            cmd = cmd.map("0:a?");
        }

        Ok(cmd)
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new();
        match self.timeout_secs {
            Some(secs) => runner.with_timeout(secs),
            None => runner,
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn run(&self, job: &EncodeJob) -> MediaResult<()> {
        self.run_with_progress(job, Box::new(|_| {})).await
    }

    async fn run_with_progress(&self, job: &EncodeJob, on_progress: ProgressCallback) -> MediaResult<()> {
        if !job.input.exists() {
            return Err(MediaError::FileNotFound(job.input.clone()));
        }

        let cmd = Self::command(job)?;
        debug!(
            input = %job.input.display(),
            output = %job.output.display(),
            stages = job.stages.len(),
            "Encoding"
        );

        self.runner().run_with_progress(&cmd, on_progress).await
    }
}
