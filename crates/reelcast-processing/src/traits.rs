//! Core traits for media processing
//!
//! `MediaRunner` is the seam between the pipeline and the external encoder. The production
//! implementation is [`crate::FfmpegOrchestrator`]; tests substitute their own.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::command::FfmpegCommand;
use crate::error::ProcessError;
use crate::metadata::MediaMetadata;
use crate::progress::EncodeProgress;

/// Result of a successful encoder invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub elapsed: Duration,
    pub last_progress: Option<EncodeProgress>,
}

#[async_trait]
pub trait MediaRunner: Send + Sync {
    /// True when the file exists, is non-empty and probes cleanly. Never errors.
    async fn validate_input(&self, path: &Path) -> bool;

    /// Probe a media file.
    async fn metadata(&self, path: &Path) -> Result<MediaMetadata, ProcessError>;

    /// Run one encoder command under a wall-clock timeout. No internal retries.
    async fn run(
        &self,
        command: &FfmpegCommand,
        timeout: Duration,
    ) -> Result<RunOutcome, ProcessError>;
}
