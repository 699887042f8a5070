//! Job handlers
//!
//! The queue calls [`JobHandler::handle`] once per attempt. [`PipelineJobHandler`] is the
//! production handler; tests substitute their own.

use anyhow::anyhow;
use async_trait::async_trait;
use reelcast_processing::{CompositionError, CompositionPipeline};
use reelcast_storage::HostingManager;
use std::sync::Arc;

use crate::error::JobError;
use crate::job::{CompositionJob, JobOutcome};

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &CompositionJob) -> Result<JobOutcome, JobError>;
}

/// Runs the composition pipeline, then uploads the master when the job asks for it.
#[derive(Clone)]
pub struct PipelineJobHandler {
    pipeline: CompositionPipeline,
    hosting: Option<Arc<HostingManager>>,
}

impl PipelineJobHandler {
    pub fn new(pipeline: CompositionPipeline) -> Self {
        Self {
            pipeline,
            hosting: None,
        }
    }

    pub fn with_hosting(mut self, hosting: Arc<HostingManager>) -> Self {
        self.hosting = Some(hosting);
        self
    }
}

#[async_trait]
impl JobHandler for PipelineJobHandler {
    async fn handle(&self, job: &CompositionJob) -> Result<JobOutcome, JobError> {
        if job.upload.is_some() && self.hosting.is_none() {
            return Err(JobError::unrecoverable(anyhow!(
                "Upload requested but no hosting manager is configured"
            )));
        }

        let composition = self
            .pipeline
            .compose(&job.request)
            .await
            .map_err(|e| match e {
                CompositionError::Validation(_) => JobError::unrecoverable(e),
                other => JobError::recoverable(other),
            })?;

        let mut outcome = JobOutcome {
            composition,
            hosted: None,
            upload_error: None,
        };

        if let (Some(upload), Some(hosting)) = (&job.upload, &self.hosting) {
            let mut metadata = upload.metadata.clone();
            metadata
                .duration_secs
                .get_or_insert(outcome.composition.duration_secs);

            match hosting
                .upload(&outcome.composition.video_path, &metadata, upload.provider)
                .await
            {
                Ok(hosted) => {
                    tracing::info!(
                        video_id = %hosted.id,
                        provider = %hosted.provider,
                        "Composed video handed off to hosting"
                    );
                    outcome.hosted = Some(hosted);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        video = %outcome.composition.video_path.display(),
                        "Upload after composition failed"
                    );
                    outcome.upload_error = Some(e.to_string());
                }
            }
        }

        Ok(outcome)
    }
}
