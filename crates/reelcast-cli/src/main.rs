//! Reelcast CLI: compose, host and account for product videos from the command line.
//!
//! Configuration comes from the environment (and `.env`); see `reelcast_core::Config`.
//! Hosted-video records persist in the JSON catalog under the storage root.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reelcast_cli::{default_title, log_failure, parse_privacy, print_json, ComposeArgs};
use reelcast_core::models::UploadMetadata;
use reelcast_core::{AppError, Config, HostingProvider};
use reelcast_infra::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use reelcast_processing::layout::base_name;
use reelcast_processing::{CompositionPipeline, EncodeProgress, FfmpegOrchestrator, MediaRunner, ThumbnailExtractor};
use reelcast_storage::{create_hosting_manager, HostingManager, UsageTracker};
use reelcast_worker::{CompositionJob, CompositionQueue, JobStatus, PipelineJobHandler, QueueConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "reelcast", about = "Video composition and hosting CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print probe metadata for a media file
    Probe {
        /// Media file to probe
        file: PathBuf,
    },
    /// Compose a video from a recording and a voiceover
    Compose {
        #[command(flatten)]
        args: ComposeArgs,
        /// Upload the composed master when done
        #[arg(long)]
        upload: bool,
        /// Title for the upload (defaults to "{owner} composition")
        #[arg(long)]
        title: Option<String>,
        /// Upload to this provider instead of the configured primary
        #[arg(long)]
        provider: Option<HostingProvider>,
    },
    /// Extract a thumbnail from a video
    Thumbnail {
        /// Source video
        video: PathBuf,
        /// Timestamp in seconds (clamped to the last frame)
        #[arg(long)]
        at: Option<f64>,
        /// Thumbnail width in pixels
        #[arg(long)]
        width: Option<u32>,
        /// Output JPEG (defaults to {video}_thumb.jpg next to the video)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload a video to the hosting layer
    Upload {
        /// Video file to upload
        file: PathBuf,
        /// Owner of the hosted video
        #[arg(long)]
        owner: String,
        /// Video title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Video description
        #[arg(long)]
        description: Option<String>,
        /// public, unlisted or private
        #[arg(long, default_value = "unlisted")]
        privacy: String,
        /// Upload to this provider instead of the configured primary
        #[arg(long)]
        provider: Option<HostingProvider>,
    },
    /// List hosted videos
    List {
        /// Include deleted videos
        #[arg(long)]
        all: bool,
    },
    /// Delete a hosted video (soft delete unless --from-provider)
    Delete {
        /// Hosted video UUID
        id: Uuid,
        /// Also remove the video from the provider
        #[arg(long)]
        from_provider: bool,
    },
    /// Regenerate the share link if it has expired
    RefreshLink {
        /// Hosted video UUID
        id: Uuid,
    },
    /// Record a view of a hosted video
    RecordView {
        /// Hosted video UUID
        id: Uuid,
        /// Viewer identifier
        #[arg(long)]
        viewer: String,
        /// Percentage of the video watched
        #[arg(long, default_value = "100")]
        percent: f64,
    },
    /// Analytics and cost for one hosted video
    Analytics {
        /// Hosted video UUID
        id: Uuid,
    },
    /// Fleet-wide usage and cost summary
    Usage,
}

fn load_config() -> anyhow::Result<Config> {
    Config::from_env().context("Failed to load configuration from the environment")
}

fn orchestrator(config: &Config) -> anyhow::Result<FfmpegOrchestrator> {
    FfmpegOrchestrator::from_settings(&config.pipeline).context("Invalid encoder configuration")
}

async fn hosting(config: &Config) -> anyhow::Result<HostingManager> {
    create_hosting_manager(config)
        .await
        .context("Failed to initialise hosting")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config()?;
    init_telemetry(&TelemetryConfig::from_env("reelcast", &config.environment))?;

    let result = run(cli.command, config).await;
    if let Err(err) = &result {
        log_failure(err);
    }
    shutdown_telemetry().await;
    result
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Probe { file } => {
            let metadata = orchestrator(&config)?
                .metadata(&file)
                .await
                .with_context(|| format!("Failed to probe {}", file.display()))?;
            print_json(&metadata)?;
        }
        Commands::Compose {
            args,
            upload,
            title,
            provider,
        } => compose(&config, args, upload, title, provider).await?,
        Commands::Thumbnail {
            video,
            at,
            width,
            output,
        } => {
            let output = output.unwrap_or_else(|| {
                video.with_file_name(format!("{}_thumb.jpg", base_name(&video)))
            });
            let extractor = ThumbnailExtractor::new(
                Arc::new(orchestrator(&config)?),
                config.pipeline.process_timeout,
            );
            let thumbnail = extractor
                .extract(
                    &video,
                    &output,
                    at.unwrap_or(config.pipeline.thumbnail_offset_secs),
                    width.unwrap_or(config.pipeline.thumbnail_width),
                )
                .await
                .map_err(AppError::from)
                .context("Thumbnail extraction failed")?;
            print_json(&thumbnail)?;
        }
        Commands::Upload {
            file,
            owner,
            title,
            description,
            privacy,
            provider,
        } => {
            let mut metadata =
                UploadMetadata::new(owner, title.unwrap_or_else(|| default_title(&file)));
            metadata.description = description;
            metadata.privacy = parse_privacy(&privacy)?;

            let hosted = hosting(&config)
                .await?
                .upload(&file, &metadata, provider)
                .await
                .map_err(AppError::from)
                .context("Upload failed")?;
            print_json(&hosted)?;
        }
        Commands::List { all } => {
            let videos = hosting(&config)
                .await?
                .list(all)
                .await
                .map_err(AppError::from)?;
            print_json(&videos)?;
        }
        Commands::Delete { id, from_provider } => {
            let deleted = hosting(&config)
                .await?
                .delete(id, from_provider)
                .await
                .map_err(AppError::from)
                .with_context(|| format!("Failed to delete {}", id))?;
            print_json(&deleted)?;
        }
        Commands::RefreshLink { id } => {
            let video = hosting(&config)
                .await?
                .regenerate_link_if_expired(id)
                .await
                .map_err(AppError::from)
                .with_context(|| format!("Failed to refresh link for {}", id))?;
            print_json(&serde_json::json!({
                "id": video.id,
                "share_url": video.share_url,
                "embed_url": video.embed_url,
                "url_expires_at": video.url_expires_at,
            }))?;
        }
        Commands::RecordView {
            id,
            viewer,
            percent,
        } => {
            let video = hosting(&config)
                .await?
                .record_view(id, &viewer, percent)
                .await
                .map_err(AppError::from)
                .with_context(|| format!("Failed to record view for {}", id))?;
            print_json(&video.analytics)?;
        }
        Commands::Analytics { id } => {
            let report = hosting(&config)
                .await?
                .analytics(id)
                .await
                .map_err(AppError::from)
                .with_context(|| format!("Failed to load analytics for {}", id))?;
            print_json(&report)?;
        }
        Commands::Usage => {
            let manager = hosting(&config).await?;
            let summary = UsageTracker::new(manager.repository().clone(), *manager.rates())
                .summary()
                .await
                .map_err(AppError::from)?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

async fn compose(
    config: &Config,
    args: ComposeArgs,
    upload: bool,
    title: Option<String>,
    provider: Option<HostingProvider>,
) -> anyhow::Result<()> {
    let request = args.build_request()?;

    let (progress_tx, mut progress_rx) = mpsc::channel::<EncodeProgress>(64);
    tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            if let Some(percent) = progress.percent {
                tracing::info!(percent, speed = ?progress.speed, "Encoding");
            }
        }
    });
    let runner = orchestrator(config)?.with_progress(progress_tx);
    let pipeline = CompositionPipeline::new(Arc::new(runner), &config.pipeline, config.cost.rates);

    let mut handler = PipelineJobHandler::new(pipeline);
    let owner_id = request.owner_id.clone();
    let mut job = CompositionJob::new(request);
    if upload {
        handler = handler.with_hosting(Arc::new(hosting(config).await?));
        let title = title.unwrap_or_else(|| format!("{} composition", owner_id));
        job = job.with_upload(UploadMetadata::new(owner_id, title), provider);
    }

    let queue = CompositionQueue::new(Arc::new(handler), QueueConfig::from_config(config));
    let id = queue.submit(job).await?;
    let status = queue.wait(id).await?;
    print_json(&status)?;

    if let JobStatus::Failed { error, .. } = status {
        anyhow::bail!("Composition failed: {}", error);
    }
    Ok(())
}
