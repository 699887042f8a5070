//! Argument handling shared by the `reelcast` binary.

use anyhow::{bail, Context};
use clap::Args;
use reelcast_core::models::{
    BackgroundMusicConfig, BrandingConfig, CompositionRequest, Position, PrivacySetting,
};
use reelcast_core::{AppError, LogLevel};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A composition request, from a JSON file or from flags.
#[derive(Args, Debug, Default)]
pub struct ComposeArgs {
    /// JSON file holding a full composition request
    #[arg(long, conflicts_with_all = ["owner", "recording", "voiceover"])]
    pub request: Option<PathBuf>,
    /// Owner of the composed video (directory under composed_videos/)
    #[arg(long)]
    pub owner: Option<String>,
    /// Screen recording to compose
    #[arg(long)]
    pub recording: Option<PathBuf>,
    /// Voiceover track
    #[arg(long)]
    pub voiceover: Option<PathBuf>,
    /// Extra renditions to encode, e.g. --quality 720p --quality 480p
    #[arg(long = "quality")]
    pub qualities: Vec<String>,
    /// Logo image for the branding stage
    #[arg(long)]
    pub logo: Option<PathBuf>,
    /// Watermark text for the branding stage
    #[arg(long)]
    pub watermark: Option<String>,
    /// Background music track
    #[arg(long)]
    pub music: Option<PathBuf>,
    /// Background music volume, 0.0 to 1.0
    #[arg(long, default_value = "0.2")]
    pub music_volume: f32,
}

impl ComposeArgs {
    pub fn build_request(&self) -> anyhow::Result<CompositionRequest> {
        let mut request = match &self.request {
            Some(path) => read_request(path)?,
            None => {
                let (Some(owner), Some(recording), Some(voiceover)) =
                    (&self.owner, &self.recording, &self.voiceover)
                else {
                    bail!("Either --request or all of --owner, --recording and --voiceover are required");
                };
                CompositionRequest::new(owner.clone(), recording.clone(), voiceover.clone())
            }
        };

        if !self.qualities.is_empty() {
            request.generate_qualities = self.qualities.clone();
        }
        if self.logo.is_some() || self.watermark.is_some() {
            request.branding = Some(BrandingConfig {
                logo_path: self.logo.clone(),
                logo_position: Position::default(),
                logo_opacity: 1.0,
                logo_scale: 0.15,
                watermark_text: self.watermark.clone(),
            });
        }
        if let Some(path) = &self.music {
            request.music = Some(BackgroundMusicConfig {
                path: path.clone(),
                volume: self.music_volume,
                fade_in: 0.0,
                fade_out: 0.0,
            });
        }

        request
            .validate_request()
            .context("Invalid composition request")?;
        Ok(request)
    }
}

fn read_request(path: &Path) -> anyhow::Result<CompositionRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request file {}", path.display()))
}

pub fn parse_privacy(value: &str) -> anyhow::Result<PrivacySetting> {
    match value.trim().to_lowercase().as_str() {
        "public" => Ok(PrivacySetting::Public),
        "unlisted" => Ok(PrivacySetting::Unlisted),
        "private" => Ok(PrivacySetting::Private),
        other => bail!("Invalid privacy setting: {}", other),
    }
}

/// Title for an upload with no explicit `--title`: the file stem.
pub fn default_title(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Error code, retryability and log level of a failed command. Errors that never passed
/// through [`AppError`] are treated as internal.
pub fn failure_class(err: &anyhow::Error) -> (&'static str, bool, LogLevel) {
    match err.chain().find_map(|e| e.downcast_ref::<AppError>()) {
        Some(app) => (app.error_code(), app.is_recoverable(), app.log_level()),
        None => ("INTERNAL_ERROR", false, LogLevel::Error),
    }
}

/// Log a failed command at the level its error class calls for.
pub fn log_failure(err: &anyhow::Error) {
    let (error_code, recoverable, level) = failure_class(err);
    let error = format!("{:#}", err);
    match level {
        LogLevel::Debug => tracing::debug!(error_code, recoverable, %error, "Command failed"),
        LogLevel::Warn => tracing::warn!(error_code, recoverable, %error, "Command failed"),
        LogLevel::Error => tracing::error!(error_code, recoverable, %error, "Command failed"),
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}
