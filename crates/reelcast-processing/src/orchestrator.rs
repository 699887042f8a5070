//! Encoder and probe process orchestration.

use async_trait::async_trait;
use reelcast_core::PipelineSettings;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;

use crate::command::FfmpegCommand;
use crate::error::ProcessError;
use crate::metadata::{parse_probe_output, MediaMetadata};
use crate::progress::{EncodeProgress, ProgressParser};
use crate::traits::{MediaRunner, RunOutcome};

const DANGEROUS_CHARS: [char; 13] = [
    ';', '|', '&', '$', '`', '(', ')', '<', '>', '"', '\'', '\n', '\r',
];
const STDERR_TAIL_LINES: usize = 20;
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
const INVALID_ARGUMENT_MARKERS: [&str; 5] = [
    "Unrecognized option",
    "Option not found",
    "No such filter",
    "Error parsing",
    "Invalid argument",
];

/// Reject binary paths that could be abused if ever passed through a shell.
fn validate_binary_path(kind: &str, path: &str) -> Result<(), ProcessError> {
    if path.trim().is_empty() {
        return Err(ProcessError::InvalidArguments(format!("{} path is empty", kind)));
    }

    if path
        .chars()
        .any(|c| DANGEROUS_CHARS.contains(&c) || c.is_control())
        || path.contains("..")
    {
        return Err(ProcessError::InvalidArguments(format!(
            "{} path contains dangerous characters: {}",
            kind, path
        )));
    }

    Ok(())
}

fn spawn_error(binary: &str, err: io::Error) -> ProcessError {
    if err.kind() == io::ErrorKind::NotFound {
        ProcessError::BinaryNotFound {
            binary: binary.to_string(),
        }
    } else {
        ProcessError::Io(err)
    }
}

fn classify_failure(operation: &str, code: Option<i32>, stderr: String) -> ProcessError {
    if INVALID_ARGUMENT_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
    {
        ProcessError::InvalidArguments(format!("{}: {}", operation, stderr))
    } else {
        ProcessError::NonZeroExit {
            operation: operation.to_string(),
            code,
            stderr,
        }
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            error = %e,
            path = %path.display(),
            "Failed to remove partial output"
        ),
    }
}

async fn read_progress(
    stdout: ChildStdout,
    mut parser: ProgressParser,
    progress_tx: Option<mpsc::Sender<EncodeProgress>>,
) -> Option<EncodeProgress> {
    let mut lines = BufReader::new(stdout).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(progress) = parser.feed(&line) {
            if let Some(tx) = &progress_tx {
                // A dropped receiver only stops reporting, never the encode.
                let _ = tx.try_send(progress.clone());
            }
            last = Some(progress);
        }
    }
    last
}

async fn read_stderr_tail(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Runs the encoder and probe binaries as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegOrchestrator {
    ffmpeg_path: String,
    ffprobe_path: String,
    progress_tx: Option<mpsc::Sender<EncodeProgress>>,
}

impl FfmpegOrchestrator {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
    ) -> Result<Self, ProcessError> {
        let ffmpeg_path = ffmpeg_path.into();
        let ffprobe_path = ffprobe_path.into();
        validate_binary_path("ffmpeg", &ffmpeg_path)?;
        validate_binary_path("ffprobe", &ffprobe_path)?;

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            progress_tx: None,
        })
    }

    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, ProcessError> {
        Self::new(settings.ffmpeg_path.clone(), settings.ffprobe_path.clone())
    }

    /// Report progress of every run on this channel. Reports are dropped when it is full.
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<EncodeProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }
}

#[async_trait]
impl MediaRunner for FfmpegOrchestrator {
    async fn validate_input(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            Ok(_) => {
                tracing::debug!(path = %path.display(), "Input is empty or not a file");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, path = %path.display(), "Input not readable");
                return false;
            }
        }

        match self.metadata(path).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, path = %path.display(), "Input failed to probe");
                false
            }
        }
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn metadata(&self, path: &Path) -> Result<MediaMetadata, ProcessError> {
        let start = Instant::now();
        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(|e| ProcessError::ProbeFailed(format!("{}: {}", path.display(), e)))?
            .len();

        let probe = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(PROBE_TIMEOUT, probe)
            .await
            .map_err(|_| ProcessError::Timeout {
                operation: "probe".to_string(),
                timeout: PROBE_TIMEOUT,
            })?
            .map_err(|e| spawn_error(&self.ffprobe_path, e))?;

        if !output.status.success() {
            return Err(ProcessError::ProbeFailed(format!(
                "{}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let metadata = parse_probe_output(&output.stdout, size_bytes)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            media_duration = metadata.duration_secs,
            width = ?metadata.width,
            height = ?metadata.height,
            video_codec = ?metadata.video_codec,
            "Media probe completed"
        );

        Ok(metadata)
    }

    #[tracing::instrument(skip(self, command), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = command.operation(),
        output = %command.output().display()
    ))]
    async fn run(
        &self,
        command: &FfmpegCommand,
        timeout: Duration,
    ) -> Result<RunOutcome, ProcessError> {
        let start = Instant::now();

        if let Some(parent) = command.output().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-nostdin", "-y", "-nostats", "-progress", "pipe:1"])
            .args(command.arguments())
            .arg(command.output())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ffmpeg_path, e))?;

        let parser = ProgressParser::new(command.expected_duration());
        let progress_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(read_progress(stdout, parser, self.progress_tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_stderr_tail(stderr)));

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out encoder");
                }
                if let Some(task) = progress_task {
                    task.abort();
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                remove_partial_output(command.output()).await;
                tracing::error!(
                    duration_ms = start.elapsed().as_millis(),
                    timeout_secs = timeout.as_secs(),
                    "Encoder timed out and was terminated"
                );
                return Err(ProcessError::Timeout {
                    operation: command.operation().to_string(),
                    timeout,
                });
            }
        };

        let last_progress = match progress_task {
            Some(task) => task.await.ok().flatten(),
            None => None,
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            remove_partial_output(command.output()).await;
            let err = classify_failure(command.operation(), status.code(), stderr);
            tracing::error!(
                error = %err,
                duration_ms = start.elapsed().as_millis(),
                "Encoder failed"
            );
            return Err(err);
        }

        let elapsed = start.elapsed();
        tracing::info!(duration_ms = elapsed.as_millis(), "Encoder run completed");

        Ok(RunOutcome {
            elapsed,
            last_progress,
        })
    }
}
