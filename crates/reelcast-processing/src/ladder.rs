//! Quality ladder renditions.
//!
//! Each requested label is encoded in its own task, bounded by a semaphore. A failed
//! rendition is logged and left out of the result; it never fails its siblings.

use reelcast_core::models::CompositionConfig;
use reelcast_core::{quality_level, QualityLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ProcessError;
use crate::filters::rendition_command;
use crate::layout::rendition_path;
use crate::traits::MediaRunner;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LadderOutcome {
    pub versions: BTreeMap<String, PathBuf>,
    pub failed: Vec<String>,
}

/// Map labels onto ladder entries, dropping duplicates. Unknown labels are rejected.
pub fn resolve_levels(labels: &[String]) -> Result<Vec<&'static QualityLevel>, ProcessError> {
    let mut levels: Vec<&'static QualityLevel> = Vec::new();
    for label in labels {
        let level = quality_level(label).ok_or_else(|| {
            ProcessError::InvalidArguments(format!("Unknown quality label: {}", label))
        })?;
        if !levels.iter().any(|l| l.label == level.label) {
            levels.push(level);
        }
    }
    Ok(levels)
}

#[derive(Clone)]
pub struct QualityLadderEncoder {
    runner: Arc<dyn MediaRunner>,
    max_concurrency: usize,
    timeout: Duration,
}

impl QualityLadderEncoder {
    pub fn new(runner: Arc<dyn MediaRunner>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            runner,
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }

    #[tracing::instrument(skip(self, master, config), fields(master = %master.display()))]
    pub async fn encode(
        &self,
        master: &Path,
        labels: &[String],
        config: &CompositionConfig,
    ) -> Result<LadderOutcome, ProcessError> {
        let levels = resolve_levels(labels)?;
        if levels.is_empty() {
            return Ok(LadderOutcome::default());
        }

        let start = Instant::now();
        let limit = self.max_concurrency.min(levels.len());
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for level in levels.iter().copied() {
            let semaphore = semaphore.clone();
            let runner = self.runner.clone();
            let config = config.clone();
            let master = master.to_path_buf();
            let output = rendition_path(&master, level.label);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            level.label,
                            output,
                            Err(ProcessError::Io(io::Error::other("rendition semaphore closed"))),
                        )
                    }
                };

                let command = rendition_command(&master, level, &config, &output);
                let result = match runner.run(&command, timeout).await {
                    Ok(_) => match tokio::fs::metadata(&output).await {
                        Ok(meta) if meta.len() > 0 => Ok(()),
                        _ => Err(ProcessError::NonZeroExit {
                            operation: "rendition".to_string(),
                            code: Some(0),
                            stderr: format!("{} is missing or empty", output.display()),
                        }),
                    },
                    Err(e) => Err(e),
                };
                (level.label, output, result)
            });
        }

        let mut versions = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((label, output, Ok(()))) => {
                    tracing::info!(quality = label, output = %output.display(), "Rendition completed");
                    versions.insert(label.to_string(), output);
                }
                Ok((label, _, Err(e))) => {
                    tracing::warn!(quality = label, error = %e, "Rendition failed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Rendition task aborted");
                }
            }
        }

        let failed: Vec<String> = levels
            .iter()
            .filter(|level| !versions.contains_key(level.label))
            .map(|level| level.label.to_string())
            .collect();

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            completed = versions.len(),
            failed = failed.len(),
            concurrency = limit,
            "Quality ladder finished"
        );

        Ok(LadderOutcome { versions, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_levels_dedups_and_rejects_unknown() {
        let labels = vec!["720p".to_string(), "720P".to_string(), "360p".to_string()];
        let levels = resolve_levels(&labels).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].label, "720p");

        let unknown = vec!["1080p".to_string(), "4k".to_string()];
        assert!(matches!(
            resolve_levels(&unknown),
            Err(ProcessError::InvalidArguments(_))
        ));
    }
}
