//! Composition request and result models.
//!
//! Request-side types are validated when they are built or deserialised, so the pipeline
//! only ever sees configurations that satisfy their invariants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::constants::quality_level;
use crate::error::AppError;

const SUPPORTED_FORMATS: [&str; 4] = ["mp4", "mov", "mkv", "webm"];
const ENCODER_PRESETS: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];
const MAX_CRF: u8 = 51;
const MAX_FPS: f64 = 120.0;

/// Anchor for logos and text on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

/// Output frame size, written as `{width}x{height}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid resolution: {}", s)))?;
        let width: u32 = w
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid resolution width: {}", s)))?;
        let height: u32 = h
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid resolution height: {}", s)))?;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(AppError::InvalidInput(format!(
                "Resolution must have positive even dimensions: {}",
                s
            )));
        }
        Ok(Resolution { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Exactly one rate-control mode drives the final encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    Bitrate { kbps: u32 },
    Crf { value: u8 },
}

/// Raw, unvalidated composition settings as supplied by callers.
///
/// Convert with [`CompositionConfigInput::build`] (or deserialise a [`CompositionConfig`]
/// directly, which goes through the same checks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfigInput {
    pub format: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub video_bitrate_kbps: Option<u32>,
    pub crf: Option<u8>,
    pub preset: String,
    pub resolution: Option<Resolution>,
    pub fps: Option<f64>,
}

impl Default for CompositionConfigInput {
    fn default() -> Self {
        Self {
            format: "mp4".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            video_bitrate_kbps: None,
            crf: None,
            preset: "medium".to_string(),
            resolution: None,
            fps: None,
        }
    }
}

impl CompositionConfigInput {
    pub fn build(self) -> Result<CompositionConfig, AppError> {
        CompositionConfig::try_from(self)
    }
}

/// Validated encoder settings for the final master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompositionConfigInput", into = "CompositionConfigInput")]
pub struct CompositionConfig {
    format: String,
    video_codec: String,
    audio_codec: String,
    rate_control: RateControl,
    preset: String,
    resolution: Option<Resolution>,
    fps: Option<f64>,
}

impl CompositionConfig {
    pub const DEFAULT_CRF: u8 = 23;

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn video_codec(&self) -> &str {
        &self.video_codec
    }

    pub fn audio_codec(&self) -> &str {
        &self.audio_codec
    }

    pub fn rate_control(&self) -> RateControl {
        self.rate_control
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            format: "mp4".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            rate_control: RateControl::Crf {
                value: Self::DEFAULT_CRF,
            },
            preset: "medium".to_string(),
            resolution: None,
            fps: None,
        }
    }
}

impl TryFrom<CompositionConfigInput> for CompositionConfig {
    type Error = AppError;

    fn try_from(input: CompositionConfigInput) -> Result<Self, Self::Error> {
        let format = input.format.trim().to_lowercase();
        if !SUPPORTED_FORMATS.contains(&format.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "Unsupported container format: {}",
                input.format
            )));
        }

        if input.video_codec.trim().is_empty() || input.audio_codec.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Video and audio codecs must be set".to_string(),
            ));
        }

        let rate_control = match (input.video_bitrate_kbps, input.crf) {
            (Some(_), Some(_)) => {
                return Err(AppError::InvalidInput(
                    "Bitrate and CRF are mutually exclusive".to_string(),
                ))
            }
            (Some(0), None) => {
                return Err(AppError::InvalidInput(
                    "Bitrate must be greater than zero".to_string(),
                ))
            }
            (Some(kbps), None) => RateControl::Bitrate { kbps },
            (None, Some(value)) if value > MAX_CRF => {
                return Err(AppError::InvalidInput(format!(
                    "CRF must be between 0 and {}",
                    MAX_CRF
                )))
            }
            (None, Some(value)) => RateControl::Crf { value },
            (None, None) => RateControl::Crf {
                value: Self::DEFAULT_CRF,
            },
        };

        let preset = input.preset.trim().to_lowercase();
        if !ENCODER_PRESETS.contains(&preset.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "Unknown encoder preset: {}",
                input.preset
            )));
        }

        if let Some(fps) = input.fps {
            if !(fps > 0.0 && fps <= MAX_FPS) {
                return Err(AppError::InvalidInput(format!(
                    "Frame rate must be in (0, {}]",
                    MAX_FPS
                )));
            }
        }

        Ok(CompositionConfig {
            format,
            video_codec: input.video_codec.trim().to_string(),
            audio_codec: input.audio_codec.trim().to_string(),
            rate_control,
            preset,
            resolution: input.resolution,
            fps: input.fps,
        })
    }
}

impl From<CompositionConfig> for CompositionConfigInput {
    fn from(config: CompositionConfig) -> Self {
        let (video_bitrate_kbps, crf) = match config.rate_control {
            RateControl::Bitrate { kbps } => (Some(kbps), None),
            RateControl::Crf { value } => (None, Some(value)),
        };
        CompositionConfigInput {
            format: config.format,
            video_codec: config.video_codec,
            audio_codec: config.audio_codec,
            video_bitrate_kbps,
            crf,
            preset: config.preset,
            resolution: config.resolution,
            fps: config.fps,
        }
    }
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = !color.is_empty()
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.' | '_'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_color"))
    }
}

fn default_opacity() -> f32 {
    1.0
}

fn default_logo_scale() -> f32 {
    0.15
}

/// Logo and watermark branding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BrandingConfig {
    pub logo_path: Option<PathBuf>,
    #[serde(default)]
    pub logo_position: Position,
    #[serde(default = "default_opacity")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub logo_opacity: f32,
    /// Logo width as a fraction of the video width.
    #[serde(default = "default_logo_scale")]
    #[validate(range(min = 0.01, max = 1.0))]
    pub logo_scale: f32,
    #[validate(length(min = 1, max = 200))]
    pub watermark_text: Option<String>,
}

impl BrandingConfig {
    pub fn is_empty(&self) -> bool {
        self.logo_path.is_none() && self.watermark_text.is_none()
    }
}

fn default_font_size() -> u32 {
    36
}

fn default_font_color() -> String {
    "white".to_string()
}

fn validate_overlay_window(overlay: &TextOverlay) -> Result<(), ValidationError> {
    if overlay.start_time < overlay.end_time {
        Ok(())
    } else {
        Err(ValidationError::new("start_time_must_precede_end_time"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_overlay_window"))]
pub struct TextOverlay {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[validate(range(min = 0.0))]
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_font_size")]
    #[validate(range(min = 8, max = 200))]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    #[validate(custom(function = "validate_color"))]
    pub font_color: String,
    #[validate(custom(function = "validate_color"))]
    pub background_color: Option<String>,
}

fn default_template() -> String {
    "minimal".to_string()
}

fn default_background_color() -> String {
    "black".to_string()
}

/// Generated lead-in or lead-out clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClipConfig {
    #[validate(range(exclusive_min = 0.0, max = 60.0))]
    pub duration: f64,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_background_color")]
    #[validate(custom(function = "validate_color"))]
    pub background_color: String,
    #[validate(length(min = 1, max = 200))]
    pub text: Option<String>,
    pub logo_path: Option<PathBuf>,
}

pub type IntroConfig = ClipConfig;
pub type OutroConfig = ClipConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BackgroundMusicConfig {
    pub path: PathBuf,
    #[validate(range(min = 0.0, max = 1.0))]
    pub volume: f32,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub fade_in: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub fade_out: f64,
}

/// Owner ids name a directory and a key prefix: `[A-Za-z0-9_-]+`.
pub fn is_valid_owner_id(owner_id: &str) -> bool {
    !owner_id.is_empty()
        && owner_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_owner_id(owner_id: &str) -> Result<(), ValidationError> {
    if is_valid_owner_id(owner_id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_owner_id"))
    }
}

/// Everything the pipeline needs for one composition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CompositionRequest {
    #[validate(custom(function = "validate_owner_id"))]
    pub owner_id: String,
    pub recording_path: PathBuf,
    pub voiceover_path: PathBuf,
    #[serde(default)]
    pub config: CompositionConfig,
    #[validate(nested)]
    pub branding: Option<BrandingConfig>,
    #[serde(default)]
    #[validate(nested)]
    pub overlays: Vec<TextOverlay>,
    #[validate(nested)]
    pub intro: Option<IntroConfig>,
    #[validate(nested)]
    pub outro: Option<OutroConfig>,
    #[validate(nested)]
    pub music: Option<BackgroundMusicConfig>,
    #[serde(default)]
    pub generate_qualities: Vec<String>,
}

impl CompositionRequest {
    pub fn new(
        owner_id: impl Into<String>,
        recording_path: impl Into<PathBuf>,
        voiceover_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            recording_path: recording_path.into(),
            voiceover_path: voiceover_path.into(),
            config: CompositionConfig::default(),
            branding: None,
            overlays: Vec::new(),
            intro: None,
            outro: None,
            music: None,
            generate_qualities: Vec::new(),
        }
    }

    /// Field-level checks plus quality labels against the fixed ladder.
    pub fn validate_request(&self) -> Result<(), AppError> {
        self.validate()?;
        if let Some(unknown) = self
            .generate_qualities
            .iter()
            .find(|label| quality_level(label).is_none())
        {
            return Err(AppError::InvalidInput(format!(
                "Unknown quality label: {}",
                unknown
            )));
        }
        Ok(())
    }
}

/// Stages of the composition pipeline, transforms first, then post-encode outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Merge,
    Branding,
    TextOverlay,
    BackgroundMusic,
    IntroOutro,
    FinalEncode,
    QualityLadder,
    Thumbnail,
}

impl PipelineStage {
    /// Fatal stages abort the run; every other stage falls back to the previous video.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineStage::Merge | PipelineStage::FinalEncode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Merge => "merge",
            PipelineStage::Branding => "branding",
            PipelineStage::TextOverlay => "text_overlay",
            PipelineStage::BackgroundMusic => "background_music",
            PipelineStage::IntroOutro => "intro_outro",
            PipelineStage::FinalEncode => "final_encode",
            PipelineStage::QualityLadder => "quality_ladder",
            PipelineStage::Thumbnail => "thumbnail",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A soft failure the pipeline recovered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: PipelineStage,
    pub message: String,
}

/// Which optional stages actually changed the video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub branding_applied: bool,
    pub overlays_requested: usize,
    pub overlays_applied: usize,
    pub music_applied: bool,
    pub intro_applied: bool,
    pub outro_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderMetadata {
    pub fps: Option<f64>,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub bitrate: Option<u64>,
}

/// Outcome of one composition run. Built once, at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionResult {
    pub run_id: Uuid,
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub resolution: String,
    pub format: String,
    pub versions: BTreeMap<String, PathBuf>,
    pub failed_qualities: Vec<String>,
    pub thumbnail_path: Option<PathBuf>,
    pub processing_time_secs: f64,
    pub cost_estimate: Decimal,
    pub encoder: EncoderMetadata,
    pub stages: StageReport,
    pub warnings: Vec<StageWarning>,
    pub created_at: DateTime<Utc>,
}
