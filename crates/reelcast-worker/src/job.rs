use chrono::{DateTime, Utc};
use reelcast_core::models::{CompositionRequest, CompositionResult, HostedVideo, UploadMetadata};
use reelcast_core::HostingProvider;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

/// Hosting hand-off after a successful composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub metadata: UploadMetadata,
    /// Overrides the configured primary provider.
    #[serde(default)]
    pub provider: Option<HostingProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionJob {
    pub request: CompositionRequest,
    #[serde(default)]
    pub upload: Option<UploadRequest>,
}

impl CompositionJob {
    pub fn new(request: CompositionRequest) -> Self {
        Self {
            request,
            upload: None,
        }
    }

    pub fn with_upload(mut self, metadata: UploadMetadata, provider: Option<HostingProvider>) -> Self {
        self.upload = Some(UploadRequest { metadata, provider });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub composition: CompositionResult,
    pub hosted: Option<HostedVideo>,
    /// Upload failure after a successful composition. The master stays on disk.
    pub upload_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued {
        submitted_at: DateTime<Utc>,
    },
    Running {
        attempt: u32,
        started_at: DateTime<Utc>,
    },
    Completed {
        attempts: u32,
        outcome: Box<JobOutcome>,
        finished_at: DateTime<Utc>,
    },
    Failed {
        attempts: u32,
        error: String,
        finished_at: DateTime<Utc>,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobStatus::Completed { finished_at, .. } | JobStatus::Failed { finished_at, .. } => {
                Some(*finished_at)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued { .. } => "queued",
            JobStatus::Running { .. } => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let now = Utc::now();
        assert!(!JobStatus::Queued { submitted_at: now }.is_terminal());
        assert!(!JobStatus::Running {
            attempt: 1,
            started_at: now
        }
        .is_terminal());
        let failed = JobStatus::Failed {
            attempts: 2,
            error: "boom".to_string(),
            finished_at: now,
        };
        assert!(failed.is_terminal());
        assert_eq!(failed.label(), "failed");
    }

    #[test]
    fn test_job_deserializes_without_upload() {
        let json = r#"{"request":{"owner_id":"acme","recording_path":"r.mp4","voiceover_path":"v.mp3"}}"#;
        let job: CompositionJob = serde_json::from_str(json).unwrap();
        assert!(job.upload.is_none());
        assert_eq!(job.request.owner_id, "acme");
    }
}
