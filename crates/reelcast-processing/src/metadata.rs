//! Probe output parsing.

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

/// Media metadata as reported by the probe binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub bitrate: Option<u64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub format_name: Option<String>,
    pub size_bytes: u64,
}

impl MediaMetadata {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den != 0.0 && num > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// Parse `-print_format json -show_format -show_streams` output.
pub fn parse_probe_output(json: &[u8], size_bytes: u64) -> Result<MediaMetadata, ProcessError> {
    let probe: serde_json::Value = serde_json::from_slice(json)
        .map_err(|e| ProcessError::ProbeFailed(format!("Failed to parse probe output: {}", e)))?;

    let empty = Vec::new();
    let streams = probe["streams"].as_array().unwrap_or(&empty);
    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"));
    let audio = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("audio"));

    if video.is_none() && audio.is_none() {
        return Err(ProcessError::ProbeFailed(
            "No audio or video stream found".to_string(),
        ));
    }

    let format = &probe["format"];
    let duration_secs = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            video
                .or(audio)
                .and_then(|s| s["duration"].as_str())
                .and_then(|d| d.parse::<f64>().ok())
        })
        .ok_or_else(|| ProcessError::ProbeFailed("Could not parse duration".to_string()))?;

    let fps = video.and_then(|s| {
        s["avg_frame_rate"]
            .as_str()
            .and_then(parse_frame_rate)
            .or_else(|| s["r_frame_rate"].as_str().and_then(parse_frame_rate))
    });

    Ok(MediaMetadata {
        duration_secs,
        width: video.and_then(|s| s["width"].as_u64()).map(|w| w as u32),
        height: video.and_then(|s| s["height"].as_u64()).map(|h| h as u32),
        fps,
        bitrate: format["bit_rate"]
            .as_str()
            .and_then(|b| b.parse::<u64>().ok()),
        video_codec: video
            .and_then(|s| s["codec_name"].as_str())
            .map(str::to_string),
        audio_codec: audio
            .and_then(|s| s["codec_name"].as_str())
            .map(str::to_string),
        format_name: format["format_name"].as_str().map(str::to_string),
        size_bytes,
    })
}
