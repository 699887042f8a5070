//! Reelcast Media Processing Library
//!
//! This crate drives the external encoder: process orchestration with progress reporting,
//! the staged composition pipeline, quality-ladder renditions, thumbnail extraction and the
//! on-disk storage layout those stages write into.

pub mod command;
pub mod error;
pub mod filters;
pub mod ladder;
pub mod layout;
pub mod metadata;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod thumbnail;
pub mod traits;

// Re-export commonly used types
pub use command::FfmpegCommand;
pub use error::{CompositionError, ProcessError, StageCause, StageError, ThumbnailError};
pub use ladder::{LadderOutcome, QualityLadderEncoder};
pub use layout::StorageLayout;
pub use metadata::MediaMetadata;
pub use orchestrator::FfmpegOrchestrator;
pub use pipeline::CompositionPipeline;
pub use progress::{EncodeProgress, ProgressParser};
pub use thumbnail::{Thumbnail, ThumbnailExtractor};
pub use traits::{MediaRunner, RunOutcome};
