//! Test doubles shared by the processing integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use reelcast_core::PipelineSettings;
use reelcast_processing::{FfmpegCommand, MediaMetadata, MediaRunner, ProcessError, RunOutcome};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn video_meta(duration: f64, width: u32, height: u32) -> MediaMetadata {
    MediaMetadata {
        duration_secs: duration,
        width: Some(width),
        height: Some(height),
        fps: Some(30.0),
        bitrate: Some(4_000_000),
        video_codec: Some("h264".to_string()),
        audio_codec: None,
        format_name: Some("mp4".to_string()),
        size_bytes: 10,
    }
}

pub fn audio_meta(duration: f64) -> MediaMetadata {
    MediaMetadata {
        duration_secs: duration,
        width: None,
        height: None,
        fps: None,
        bitrate: Some(128_000),
        video_codec: None,
        audio_codec: Some("mp3".to_string()),
        format_name: Some("mp3".to_string()),
        size_bytes: 10,
    }
}

/// Parse `scale=W:H...` from a `-vf` value.
fn scaled_size(vf: &str) -> Option<(u32, u32)> {
    let dims = vf.strip_prefix("scale=")?;
    let mut parts = dims.split([':', ',']);
    let w = parts.next()?.parse().ok()?;
    let h = parts.next()?.parse().ok()?;
    Some((w, h))
}

/// Encoder stand-in: writes a small file for every output and tracks simulated durations.
///
/// Metadata is keyed by a token written into each file, so it follows files across renames.
#[derive(Default)]
pub struct FakeRunner {
    media: Mutex<HashMap<String, MediaMetadata>>,
    next_token: AtomicUsize,
    failing_operations: Mutex<Vec<String>>,
    failing_outputs: Mutex<Vec<String>>,
    commands: Mutex<Vec<FfmpegCommand>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Write a tokenized file at `path` and remember its metadata.
    fn register(&self, path: &Path, metadata: MediaMetadata) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let token = format!(
            "fake-media-{}",
            self.next_token.fetch_add(1, Ordering::SeqCst)
        );
        std::fs::write(path, &token)?;
        self.media.lock().unwrap().insert(token, metadata);
        Ok(())
    }

    /// Write a non-empty file and register its metadata.
    pub fn create_media(&self, path: &Path, metadata: MediaMetadata) {
        self.register(path, metadata).unwrap();
    }

    fn lookup(&self, path: &Path) -> Option<MediaMetadata> {
        let token = std::fs::read_to_string(path).ok()?;
        self.media.lock().unwrap().get(&token).cloned()
    }

    pub fn fail_operation(&self, operation: &str) {
        self.failing_operations
            .lock()
            .unwrap()
            .push(operation.to_string());
    }

    pub fn fail_output_containing(&self, fragment: &str) {
        self.failing_outputs
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    pub fn commands(&self) -> Vec<FfmpegCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.commands().iter().map(|c| c.operation()).collect()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn should_fail(&self, command: &FfmpegCommand) -> bool {
        let output = command.output().to_string_lossy().into_owned();
        self.failing_operations
            .lock()
            .unwrap()
            .iter()
            .any(|op| op == command.operation())
            || self
                .failing_outputs
                .lock()
                .unwrap()
                .iter()
                .any(|fragment| output.contains(fragment.as_str()))
    }

    fn output_metadata(&self, command: &FfmpegCommand) -> MediaMetadata {
        let inputs: Vec<MediaMetadata> = command
            .inputs()
            .iter()
            .filter_map(|p| self.lookup(p))
            .collect();
        let video = inputs.iter().find(|m| m.video_codec.is_some()).cloned();
        let mut out = video.clone().unwrap_or_else(|| video_meta(0.0, 1920, 1080));
        out.audio_codec = Some("aac".to_string());

        out.duration_secs = match command.operation() {
            "merge" if command.has_flag("-shortest") => inputs
                .iter()
                .map(|m| m.duration_secs)
                .fold(f64::INFINITY, f64::min),
            "concat" => inputs.iter().map(|m| m.duration_secs).sum(),
            "intro" | "outro" => command
                .value_of("-t")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0.0),
            _ => video
                .as_ref()
                .or(inputs.first())
                .map(|m| m.duration_secs)
                .unwrap_or(0.0),
        };

        if let Some((w, h)) = command.value_of("-vf").and_then(scaled_size) {
            out.width = Some(w);
            out.height = Some(h);
        }
        out
    }
}

#[async_trait]
impl MediaRunner for FakeRunner {
    async fn validate_input(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    async fn metadata(&self, path: &Path) -> Result<MediaMetadata, ProcessError> {
        self.lookup(path)
            .ok_or_else(|| ProcessError::ProbeFailed(format!("unknown media {}", path.display())))
    }

    async fn run(
        &self,
        command: &FfmpegCommand,
        _timeout: Duration,
    ) -> Result<RunOutcome, ProcessError> {
        self.commands.lock().unwrap().push(command.clone());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if self.should_fail(command) {
            Err(ProcessError::NonZeroExit {
                operation: command.operation().to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            })
        } else {
            let metadata = self.output_metadata(command);
            self.register(command.output(), metadata)
                .map(|_| RunOutcome::default())
                .map_err(ProcessError::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn settings(root: &Path) -> PipelineSettings {
    PipelineSettings {
        storage_root: root.to_path_buf(),
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
        process_timeout: Duration::from_secs(60),
        max_concurrent_renditions: 4,
        thumbnail_offset_secs: 5.0,
        thumbnail_width: 640,
    }
}
