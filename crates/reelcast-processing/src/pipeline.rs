//! Composition pipeline.
//!
//! Stages run strictly in order, each reading the previous stage's output:
//! merge, branding, text overlays, background music, intro/outro, final encode. Merge and
//! final encode are fatal; every other stage falls back to the last good video and leaves a
//! warning on the result. Renditions and the thumbnail run concurrently once the master is
//! in place. The per-run temp directory is removed whatever the outcome.

use chrono::Utc;
use reelcast_core::models::{
    BackgroundMusicConfig, BrandingConfig, ClipConfig, CompositionConfig, CompositionRequest,
    CompositionResult, EncoderMetadata, PipelineStage, StageReport, StageWarning,
};
use reelcast_core::{CostRates, PipelineSettings};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use uuid::Uuid;

use crate::command::FfmpegCommand;
use crate::error::{CompositionError, StageCause, StageError};
use crate::filters::{
    branding_command, clip_command, concat_command, final_encode_command, merge_command,
    music_command, text_overlay_command,
};
use crate::ladder::{LadderOutcome, QualityLadderEncoder};
use crate::layout::StorageLayout;
use crate::metadata::MediaMetadata;
use crate::thumbnail::ThumbnailExtractor;
use crate::traits::MediaRunner;

const INTERMEDIATE_EXTENSION: &str = "mkv";
const FALLBACK_WIDTH: u32 = 1920;
const FALLBACK_HEIGHT: u32 = 1080;
const FALLBACK_FPS: f64 = 30.0;

/// Scratch directory for one run. Dropping it removes the directory as a fallback.
struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    fn create(temp_root: &Path, run_id: Uuid) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("run_{}_", run_id.simple()))
            .tempdir_in(temp_root)?;
        Ok(Self { dir })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}.{}", name, INTERMEDIATE_EXTENSION))
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => tracing::debug!(path = %path.display(), "Removed run workspace"),
            Ok(Err(e)) => tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to remove run workspace"
            ),
            Err(e) => tracing::warn!(error = %e, "Workspace cleanup task failed"),
        }
    }
}

async fn ensure_output(path: &Path) -> Result<(), StageCause> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(StageCause::EmptyOutput(path.to_path_buf())),
    }
}

/// Rename, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

fn record_soft_failure(err: StageError, warnings: &mut Vec<StageWarning>) {
    tracing::warn!(
        stage = %err.stage,
        error = %err.cause,
        "Optional stage failed, continuing with previous video"
    );
    warnings.push(StageWarning {
        stage: err.stage,
        message: err.cause.to_string(),
    });
}

/// Intermediate state threaded through the transform stages.
struct StageState {
    current: PathBuf,
    report: StageReport,
    warnings: Vec<StageWarning>,
}

#[derive(Clone)]
pub struct CompositionPipeline {
    runner: Arc<dyn MediaRunner>,
    layout: StorageLayout,
    ladder: QualityLadderEncoder,
    thumbnails: ThumbnailExtractor,
    rates: CostRates,
    timeout: Duration,
    thumbnail_offset_secs: f64,
    thumbnail_width: u32,
}

impl CompositionPipeline {
    pub fn new(runner: Arc<dyn MediaRunner>, settings: &PipelineSettings, rates: CostRates) -> Self {
        Self {
            ladder: QualityLadderEncoder::new(
                runner.clone(),
                settings.max_concurrent_renditions,
                settings.process_timeout,
            ),
            thumbnails: ThumbnailExtractor::new(runner.clone(), settings.process_timeout),
            layout: StorageLayout::new(settings.storage_root.clone()),
            runner,
            rates,
            timeout: settings.process_timeout,
            thumbnail_offset_secs: settings.thumbnail_offset_secs,
            thumbnail_width: settings.thumbnail_width,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn thumbnails(&self) -> &ThumbnailExtractor {
        &self.thumbnails
    }

    /// Run one composition end to end.
    #[tracing::instrument(skip(self, request), fields(owner_id = %request.owner_id))]
    pub async fn compose(
        &self,
        request: &CompositionRequest,
    ) -> Result<CompositionResult, CompositionError> {
        request.validate_request()?;
        for (kind, path) in [
            ("recording", &request.recording_path),
            ("voiceover", &request.voiceover_path),
        ] {
            if !self.runner.validate_input(path).await {
                return Err(CompositionError::Validation(format!(
                    "{} is missing, empty or unreadable: {}",
                    kind,
                    path.display()
                )));
            }
        }

        self.layout.ensure_directories().await?;

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let workspace = RunWorkspace::create(&self.layout.temp_dir(), run_id)?;

        let result = self.run(request, run_id, started, &workspace).await;
        workspace.cleanup().await;

        match &result {
            Ok(composed) => tracing::info!(
                run_id = %run_id,
                duration_ms = started.elapsed().as_millis(),
                video = %composed.video_path.display(),
                warnings = composed.warnings.len(),
                "Composition completed"
            ),
            Err(e) => tracing::error!(
                run_id = %run_id,
                error = %e,
                duration_ms = started.elapsed().as_millis(),
                "Composition failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        request: &CompositionRequest,
        run_id: Uuid,
        started: Instant,
        workspace: &RunWorkspace,
    ) -> Result<CompositionResult, CompositionError> {
        let config = &request.config;

        let merged = workspace.file("merge");
        self.execute(
            PipelineStage::Merge,
            merge_command(
                &request.recording_path,
                &request.voiceover_path,
                config,
                &merged,
            ),
        )
        .await?;

        let mut state = StageState {
            current: merged,
            report: StageReport {
                overlays_requested: request.overlays.len(),
                ..StageReport::default()
            },
            warnings: Vec::new(),
        };

        if let Some(branding) = request.branding.as_ref().filter(|b| !b.is_empty()) {
            match self.apply_branding(&state.current, branding, config, workspace).await {
                Ok(path) => {
                    state.current = path;
                    state.report.branding_applied = true;
                }
                Err(e) => record_soft_failure(e, &mut state.warnings),
            }
        }

        for (index, overlay) in request.overlays.iter().enumerate() {
            let output = workspace.file(&format!("overlay_{}", index));
            let command = text_overlay_command(&state.current, overlay, config, &output);
            match self.execute(PipelineStage::TextOverlay, command).await {
                Ok(()) => {
                    state.current = output;
                    state.report.overlays_applied += 1;
                }
                Err(e) => record_soft_failure(e, &mut state.warnings),
            }
        }

        if let Some(music) = &request.music {
            match self.apply_music(&state.current, music, config, workspace).await {
                Ok(path) => {
                    state.current = path;
                    state.report.music_applied = true;
                }
                Err(e) => record_soft_failure(e, &mut state.warnings),
            }
        }

        if request.intro.is_some() || request.outro.is_some() {
            self.apply_intro_outro(
                &mut state,
                request.intro.as_ref(),
                request.outro.as_ref(),
                config,
                workspace,
            )
            .await;
        }

        let master = self
            .final_encode(request, run_id, &state.current, workspace)
            .await?;
        let metadata = match self.runner.metadata(&master).await {
            Ok(metadata) => metadata,
            Err(e) => {
                let _ = tokio::fs::remove_file(&master).await;
                return Err(StageError::new(PipelineStage::FinalEncode, e).into());
            }
        };

        let thumbnail_path = self.layout.thumbnail_path(&request.owner_id, &master);
        let (ladder, thumbnail) = tokio::join!(
            self.ladder
                .encode(&master, &request.generate_qualities, config),
            self.thumbnails.extract(
                &master,
                &thumbnail_path,
                self.thumbnail_offset_secs,
                self.thumbnail_width
            )
        );

        let ladder = ladder.unwrap_or_else(|e| {
            record_soft_failure(
                StageError::new(PipelineStage::QualityLadder, e),
                &mut state.warnings,
            );
            LadderOutcome {
                versions: Default::default(),
                failed: request.generate_qualities.clone(),
            }
        });
        for label in &ladder.failed {
            state.warnings.push(StageWarning {
                stage: PipelineStage::QualityLadder,
                message: format!("{} rendition failed", label),
            });
        }

        let thumbnail_path = match thumbnail {
            Ok(thumbnail) => Some(thumbnail.path),
            Err(e) => {
                tracing::warn!(error = %e, "Thumbnail extraction failed");
                state.warnings.push(StageWarning {
                    stage: PipelineStage::Thumbnail,
                    message: e.to_string(),
                });
                None
            }
        };

        let processing_time = started.elapsed();
        Ok(self.build_result(
            run_id,
            master,
            metadata,
            config,
            ladder,
            thumbnail_path,
            processing_time,
            state,
        ))
    }

    /// Run a stage command and check it produced a non-empty file.
    async fn execute(&self, stage: PipelineStage, command: FfmpegCommand) -> Result<(), StageError> {
        for input in command.inputs() {
            if tokio::fs::metadata(input).await.is_err() {
                return Err(StageError::new(
                    stage,
                    StageCause::MissingAsset(input.clone()),
                ));
            }
        }
        self.runner
            .run(&command, self.timeout)
            .await
            .map_err(|e| StageError::new(stage, e))?;
        ensure_output(command.output())
            .await
            .map_err(|cause| StageError::new(stage, cause))
    }

    async fn apply_branding(
        &self,
        input: &Path,
        branding: &BrandingConfig,
        config: &CompositionConfig,
        workspace: &RunWorkspace,
    ) -> Result<PathBuf, StageError> {
        let width = match self.runner.metadata(input).await {
            Ok(meta) => meta.width,
            Err(e) => {
                tracing::debug!(error = %e, "Could not probe width for logo sizing");
                None
            }
        };
        let output = workspace.file("branding");
        self.execute(
            PipelineStage::Branding,
            branding_command(input, branding, width, config, &output),
        )
        .await?;
        Ok(output)
    }

    async fn apply_music(
        &self,
        input: &Path,
        music: &BackgroundMusicConfig,
        config: &CompositionConfig,
        workspace: &RunWorkspace,
    ) -> Result<PathBuf, StageError> {
        let duration = self
            .runner
            .metadata(input)
            .await
            .map_err(|e| StageError::new(PipelineStage::BackgroundMusic, e))?
            .duration_secs;
        let output = workspace.file("music");
        self.execute(
            PipelineStage::BackgroundMusic,
            music_command(input, music, duration, config, &output),
        )
        .await?;
        Ok(output)
    }

    async fn generate_clip(
        &self,
        operation: &'static str,
        clip: &ClipConfig,
        frame: (u32, u32, f64),
        config: &CompositionConfig,
        workspace: &RunWorkspace,
    ) -> Result<PathBuf, StageError> {
        let (width, height, fps) = frame;
        let output = workspace.file(operation);
        let command = clip_command(operation, clip, width, height, fps, config, &output)
            .map_err(|cause| StageError::new(PipelineStage::IntroOutro, cause))?;
        self.execute(PipelineStage::IntroOutro, command).await?;
        Ok(output)
    }

    /// Each clip fails independently; the concat only runs if at least one clip exists.
    async fn apply_intro_outro(
        &self,
        state: &mut StageState,
        intro: Option<&ClipConfig>,
        outro: Option<&ClipConfig>,
        config: &CompositionConfig,
        workspace: &RunWorkspace,
    ) {
        let frame = match self.runner.metadata(&state.current).await {
            Ok(meta) => (
                meta.width.unwrap_or(FALLBACK_WIDTH),
                meta.height.unwrap_or(FALLBACK_HEIGHT),
                meta.fps.unwrap_or(FALLBACK_FPS),
            ),
            Err(e) => {
                record_soft_failure(
                    StageError::new(PipelineStage::IntroOutro, e),
                    &mut state.warnings,
                );
                return;
            }
        };

        let mut clips: [Option<PathBuf>; 2] = [None, None];
        for (slot, (operation, clip)) in [("intro", intro), ("outro", outro)].into_iter().enumerate() {
            let Some(clip) = clip else { continue };
            match self
                .generate_clip(operation, clip, frame, config, workspace)
                .await
            {
                Ok(path) => clips[slot] = Some(path),
                Err(e) => record_soft_failure(e, &mut state.warnings),
            }
        }
        if clips.iter().all(Option::is_none) {
            return;
        }

        let mut segments: Vec<&Path> = Vec::with_capacity(3);
        if let Some(intro) = &clips[0] {
            segments.push(intro);
        }
        segments.push(&state.current);
        if let Some(outro) = &clips[1] {
            segments.push(outro);
        }

        let output = workspace.file("concat");
        let (width, height, fps) = frame;
        let command = concat_command(&segments, width, height, fps, config, &output);
        match self.execute(PipelineStage::IntroOutro, command).await {
            Ok(()) => {
                state.report.intro_applied = clips[0].is_some();
                state.report.outro_applied = clips[1].is_some();
                state.current = output;
            }
            Err(e) => record_soft_failure(e, &mut state.warnings),
        }
    }

    /// Encode into the workspace, then move into the owner's directory.
    async fn final_encode(
        &self,
        request: &CompositionRequest,
        run_id: Uuid,
        input: &Path,
        workspace: &RunWorkspace,
    ) -> Result<PathBuf, CompositionError> {
        let config = &request.config;
        let expected_duration = self.runner.metadata(input).await.ok().map(|m| m.duration_secs);
        let staged = workspace.path().join(format!("final.{}", config.format()));
        self.execute(
            PipelineStage::FinalEncode,
            final_encode_command(input, config, expected_duration, &staged),
        )
        .await?;

        let master = self
            .layout
            .master_path(&request.owner_id, run_id, config.format(), Utc::now());
        move_file(&staged, &master)
            .await
            .map_err(|e| StageError::new(PipelineStage::FinalEncode, e))?;
        Ok(master)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_result(
        &self,
        run_id: Uuid,
        master: PathBuf,
        metadata: MediaMetadata,
        config: &CompositionConfig,
        ladder: LadderOutcome,
        thumbnail_path: Option<PathBuf>,
        processing_time: Duration,
        state: StageState,
    ) -> CompositionResult {
        CompositionResult {
            run_id,
            video_path: master,
            duration_secs: metadata.duration_secs,
            size_bytes: metadata.size_bytes,
            resolution: metadata
                .resolution()
                .unwrap_or_else(|| "unknown".to_string()),
            format: config.format().to_string(),
            versions: ladder.versions,
            failed_qualities: ladder.failed,
            thumbnail_path,
            processing_time_secs: processing_time.as_secs_f64(),
            cost_estimate: self.rates.processing_cost(processing_time),
            encoder: EncoderMetadata {
                fps: metadata.fps,
                video_codec: metadata
                    .video_codec
                    .unwrap_or_else(|| config.video_codec().to_string()),
                audio_codec: metadata.audio_codec,
                bitrate: metadata.bitrate,
            },
            stages: state.report,
            warnings: state.warnings,
            created_at: Utc::now(),
        }
    }
}
