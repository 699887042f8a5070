//! In-process composition queue with a bounded worker pool and retry.
//!
//! Every submitted job gets its own task that waits for a worker permit. Status lives in a
//! `watch` channel per job so [`CompositionQueue::wait`] needs no polling.
//!
//! Finished statuses are kept until [`CompositionQueue::forget`] drops them or more than
//! `max_finished_jobs` have piled up, at which point the oldest are evicted on submit.
//!
//! Shutdown: [`CompositionQueue::shutdown`] closes the worker pool. Jobs still waiting
//! for a permit fail; running jobs finish their current attempt.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::time::sleep;

use reelcast_core::Config;

use crate::error::QueueError;
use crate::handler::JobHandler;
use crate::job::{CompositionJob, JobId, JobStatus};

/// Maximum retry delay in backoff units. Caps exponential growth for high retry counts.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Exponential backoff with cap: 1, 2, 4, ... up to [`MAX_RETRY_BACKOFF_SECS`] units.
#[inline]
pub(crate) fn compute_retry_backoff(retry_count: u32, unit: Duration) -> Duration {
    let factor = 2_u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS);
    unit.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub max_workers: usize,
    /// Additional attempts after the first for recoverable failures.
    pub max_retries: u32,
    /// One backoff unit; the n-th retry waits `2^n` units.
    pub retry_backoff_unit: Duration,
    /// Finished statuses retained before the oldest are evicted.
    pub max_finished_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            max_retries: 0,
            retry_backoff_unit: Duration::from_secs(1),
            max_finished_jobs: 1000,
        }
    }
}

impl QueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.job_queue_max_workers,
            max_retries: config.job_queue_max_retries,
            ..Self::default()
        }
    }
}

type StatusMap = Arc<RwLock<HashMap<JobId, watch::Sender<JobStatus>>>>;

/// Drop the oldest finished statuses beyond `keep`.
fn evict_finished(jobs: &mut HashMap<JobId, watch::Sender<JobStatus>>, keep: usize) {
    let mut finished: Vec<_> = jobs
        .iter()
        .filter_map(|(id, tx)| tx.borrow().finished_at().map(|at| (at, *id)))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort_unstable();
    let excess = finished.len() - keep;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
    tracing::debug!(evicted = excess, "Evicted finished job statuses");
}

#[derive(Clone)]
pub struct CompositionQueue {
    handler: Arc<dyn JobHandler>,
    config: QueueConfig,
    workers: Arc<Semaphore>,
    jobs: StatusMap,
}

impl CompositionQueue {
    pub fn new(handler: Arc<dyn JobHandler>, config: QueueConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        tracing::info!(
            max_workers,
            max_retries = config.max_retries,
            "Composition queue started"
        );
        Self {
            handler,
            config,
            workers: Arc::new(Semaphore::new(max_workers)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Queue a job and return its id without waiting for it to run.
    #[tracing::instrument(skip(self, job), fields(owner_id = %job.request.owner_id))]
    pub async fn submit(&self, job: CompositionJob) -> Result<JobId, QueueError> {
        if self.workers.is_closed() {
            return Err(QueueError::ShutDown);
        }

        let id = JobId::new();
        let (status_tx, _) = watch::channel(JobStatus::Queued {
            submitted_at: Utc::now(),
        });
        {
            let mut jobs = self.jobs.write().await;
            evict_finished(&mut jobs, self.config.max_finished_jobs);
            jobs.insert(id, status_tx.clone());
        }

        let handler = self.handler.clone();
        let workers = self.workers.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            Self::run_job(id, job, handler, workers, config, status_tx).await;
        });

        tracing::info!(job_id = %id, "Composition job submitted");
        Ok(id)
    }

    pub async fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs
            .read()
            .await
            .get(&id)
            .map(|tx| tx.borrow().clone())
    }

    /// Resolve once the job reaches `Completed` or `Failed`.
    pub async fn wait(&self, id: JobId) -> Result<JobStatus, QueueError> {
        let mut rx = self
            .jobs
            .read()
            .await
            .get(&id)
            .map(|tx| tx.subscribe())
            .ok_or(QueueError::UnknownJob(id))?;

        let status = rx
            .wait_for(JobStatus::is_terminal)
            .await
            .map_err(|_| QueueError::ShutDown)?;
        Ok(status.clone())
    }

    /// Drop a finished job's status and return it. Queued or running jobs are kept.
    pub async fn forget(&self, id: JobId) -> Result<JobStatus, QueueError> {
        let mut jobs = self.jobs.write().await;
        let status = jobs
            .get(&id)
            .map(|tx| tx.borrow().clone())
            .ok_or(QueueError::UnknownJob(id))?;
        if !status.is_terminal() {
            return Err(QueueError::NotFinished(id));
        }
        jobs.remove(&id);
        Ok(status)
    }

    /// Stop accepting jobs and fail those still waiting for a worker.
    pub fn shutdown(&self) {
        tracing::info!("Initiating composition queue shutdown");
        self.workers.close();
    }

    #[tracing::instrument(skip(job, handler, workers, config, status_tx), fields(job_id = %id))]
    async fn run_job(
        id: JobId,
        job: CompositionJob,
        handler: Arc<dyn JobHandler>,
        workers: Arc<Semaphore>,
        config: QueueConfig,
        status_tx: watch::Sender<JobStatus>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let permit = match workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(job_id = %id, "Queue shut down before job ran");
                    status_tx.send_replace(JobStatus::Failed {
                        attempts: attempt - 1,
                        error: QueueError::ShutDown.to_string(),
                        finished_at: Utc::now(),
                    });
                    return;
                }
            };

            status_tx.send_replace(JobStatus::Running {
                attempt,
                started_at: Utc::now(),
            });
            let started = std::time::Instant::now();
            let result = handler.handle(&job).await;
            drop(permit);

            match result {
                Ok(outcome) => {
                    tracing::info!(
                        job_id = %id,
                        attempt,
                        duration_ms = started.elapsed().as_millis(),
                        "Composition job completed"
                    );
                    status_tx.send_replace(JobStatus::Completed {
                        attempts: attempt,
                        outcome: Box::new(outcome),
                        finished_at: Utc::now(),
                    });
                    return;
                }
                Err(e) => {
                    let retries_used = attempt - 1;
                    tracing::error!(
                        job_id = %id,
                        error = %e,
                        attempt,
                        max_retries = config.max_retries,
                        unrecoverable = !e.is_recoverable(),
                        "Composition job failed"
                    );

                    if e.is_recoverable() && retries_used < config.max_retries {
                        let backoff = compute_retry_backoff(retries_used, config.retry_backoff_unit);
                        tracing::info!(
                            job_id = %id,
                            retry_count = attempt,
                            backoff_ms = backoff.as_millis(),
                            "Scheduling job retry"
                        );
                        status_tx.send_replace(JobStatus::Queued {
                            submitted_at: Utc::now(),
                        });
                        sleep(backoff).await;
                        continue;
                    }

                    status_tx.send_replace(JobStatus::Failed {
                        attempts: attempt,
                        error: e.to_string(),
                        finished_at: Utc::now(),
                    });
                    return;
                }
            }
        }
    }
}
