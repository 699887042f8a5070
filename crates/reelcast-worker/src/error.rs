//! Job execution errors
//!
//! A handler marks each failure recoverable (retried under the queue's retry policy) or
//! unrecoverable (the job fails immediately).

use std::fmt;
use thiserror::Error;

use crate::job::JobId;

#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    /// Invalid requests, missing configuration: retrying cannot help.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Encoder crashes, timeouts, transient I/O.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    /// Plain errors are retried.
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

pub trait JobResultExt<T> {
    /// Mark this result as unrecoverable on error
    fn unrecoverable(self) -> Result<T, JobError>;
}

impl<T, E: Into<anyhow::Error>> JobResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::unrecoverable(e.into()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Unknown job: {0}")]
    UnknownJob(JobId),

    #[error("Job {0} has not finished")]
    NotFinished(JobId),

    #[error("Job queue is shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = JobError::unrecoverable(anyhow::anyhow!("Unknown quality label: 8k"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("8k"));
    }

    #[test]
    fn test_from_anyhow_is_recoverable() {
        let err: JobError = anyhow::anyhow!("encoder crashed").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("no hosting manager"));
        assert!(!result.unrecoverable().unwrap_err().is_recoverable());
    }
}
