//! Single-frame thumbnail extraction.
//!
//! Timestamps past the end of the video are clamped to the last frame
//! (`duration - 1/fps`, never below zero) and reported through [`Thumbnail::clamped`].

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ThumbnailError;
use crate::filters::thumbnail_command;
use crate::traits::MediaRunner;

const FALLBACK_FPS: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    pub path: PathBuf,
    pub requested_at: f64,
    pub captured_at: f64,
    pub clamped: bool,
    pub width: u32,
    /// Derived from the source aspect ratio when the source reports its size.
    pub height: Option<u32>,
}

/// Latest seekable timestamp for a video of `duration` seconds at `fps`.
pub fn last_frame_timestamp(duration: f64, fps: Option<f64>) -> f64 {
    let fps = fps.filter(|f| *f > 0.0).unwrap_or(FALLBACK_FPS);
    (duration - 1.0 / fps).max(0.0)
}

#[derive(Clone)]
pub struct ThumbnailExtractor {
    runner: Arc<dyn MediaRunner>,
    timeout: Duration,
}

impl ThumbnailExtractor {
    pub fn new(runner: Arc<dyn MediaRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    #[tracing::instrument(skip(self, video, output), fields(video = %video.display()))]
    pub async fn extract(
        &self,
        video: &Path,
        output: &Path,
        at_secs: f64,
        width: u32,
    ) -> Result<Thumbnail, ThumbnailError> {
        if at_secs < 0.0 || at_secs.is_nan() {
            return Err(ThumbnailError::NegativeTimestamp(at_secs));
        }
        if width == 0 {
            return Err(ThumbnailError::InvalidWidth);
        }

        let metadata = self.runner.metadata(video).await?;
        let last_frame = last_frame_timestamp(metadata.duration_secs, metadata.fps);
        let clamped = at_secs > last_frame;
        let captured_at = if clamped { last_frame } else { at_secs };
        if clamped {
            tracing::info!(
                requested_at = at_secs,
                captured_at,
                video_duration = metadata.duration_secs,
                "Thumbnail timestamp clamped to last frame"
            );
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = thumbnail_command(video, captured_at, width, output);
        self.runner.run(&command, self.timeout).await?;

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Err(ThumbnailError::EmptyOutput(output.to_path_buf())),
        }

        let height = match (metadata.width, metadata.height) {
            (Some(w), Some(h)) if w > 0 => {
                let scaled = (width as f64 * h as f64 / w as f64).round() as u32;
                // Matches the encoder's `-2` rounding to an even height.
                Some((scaled / 2 * 2).max(2))
            }
            _ => None,
        };

        Ok(Thumbnail {
            path: output.to_path_buf(),
            requested_at: at_secs,
            captured_at,
            clamped,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_frame_timestamp() {
        assert!((last_frame_timestamp(10.0, Some(25.0)) - 9.96).abs() < 1e-9);
        assert!((last_frame_timestamp(10.0, None) - 9.96).abs() < 1e-9);
        assert_eq!(last_frame_timestamp(0.01, Some(25.0)), 0.0);
    }
}
