//! Composition job queue: typed jobs, pollable status and a bounded worker pool.
//!
//! [`CompositionQueue::submit`] returns immediately with a [`JobId`]; callers poll
//! [`CompositionQueue::status`] or await [`CompositionQueue::wait`]. Jobs are executed by a
//! [`JobHandler`]; [`PipelineJobHandler`] runs the composition pipeline and optionally hands
//! the master to the hosting manager.

pub mod error;
pub mod handler;
pub mod job;
pub mod queue;

pub use error::{JobError, JobResultExt, QueueError};
pub use handler::{JobHandler, PipelineJobHandler};
pub use job::{CompositionJob, JobId, JobOutcome, JobStatus, UploadRequest};
pub use queue::{CompositionQueue, QueueConfig, MAX_RETRY_BACKOFF_SECS};
