//! Error types for encoder invocation, pipeline stages and thumbnails.

use reelcast_core::models::PipelineStage;
use reelcast_core::AppError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single encoder or probe invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Binary not found: {binary}")]
    BinaryNotFound { binary: String },

    #[error("{operation} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        operation: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout { operation: String, timeout: Duration },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Why a stage did not produce a usable output.
#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Output missing or empty: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("Asset not found: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageError {
    pub stage: PipelineStage,
    #[source]
    pub cause: StageCause,
}

impl StageError {
    pub fn new(stage: PipelineStage, cause: impl Into<StageCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Fatal stage errors abort the composition; soft ones are recorded as warnings.
    pub fn is_fatal(&self) -> bool {
        self.stage.is_fatal()
    }
}

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Composition failed: {0}")]
    FatalStage(#[from] StageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<AppError> for CompositionError {
    fn from(err: AppError) -> Self {
        CompositionError::Validation(err.to_string())
    }
}

impl From<CompositionError> for AppError {
    fn from(err: CompositionError) -> Self {
        match err {
            CompositionError::Validation(message) => AppError::InvalidInput(message),
            other => AppError::CompositionFailed(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Thumbnail timestamp must not be negative: {0}")]
    NegativeTimestamp(f64),

    #[error("Thumbnail width must be greater than zero")]
    InvalidWidth,

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Thumbnail output missing or empty: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ThumbnailError> for AppError {
    fn from(err: ThumbnailError) -> Self {
        match err {
            ThumbnailError::NegativeTimestamp(_) | ThumbnailError::InvalidWidth => {
                AppError::InvalidInput(err.to_string())
            }
            other => AppError::CompositionFailed(other.to_string()),
        }
    }
}
