//! Configuration module
//!
//! Environment-driven settings for the composition pipeline, the hosting layer and cost
//! estimation. `.env` files are honoured through `dotenvy`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_RENDITIONS, DEFAULT_MULTIPART_MAX_PARALLEL_PARTS,
    DEFAULT_PRESIGNED_URL_EXPIRY_HOURS, DEFAULT_PROCESS_TIMEOUT_SECS,
    DEFAULT_THUMBNAIL_OFFSET_SECS, DEFAULT_THUMBNAIL_WIDTH, MIB, MIN_MULTIPART_CHUNK_SIZE_BYTES,
};
use crate::cost::CostRates;
use crate::storage_types::HostingProvider;

const STORAGE_ROOT: &str = "storage";
const MULTIPART_THRESHOLD_MB: u64 = 100;
const MULTIPART_CHUNK_SIZE_MB: u64 = 10;
const WISTIA_UPLOAD_URL: &str = "https://upload.wistia.com";
const WISTIA_API_URL: &str = "https://api.wistia.com/v1";
const LOCAL_HOSTING_BASE_URL: &str = "http://localhost:8080/media";
const JOB_QUEUE_MAX_WORKERS: usize = 2;
const JOB_QUEUE_MAX_RETRIES: u32 = 0;

/// Encoder and pipeline settings
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub storage_root: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub process_timeout: Duration,
    pub max_concurrent_renditions: usize,
    pub thumbnail_offset_secs: f64,
    pub thumbnail_width: u32,
}

/// Hosting backend settings
#[derive(Clone, Debug)]
pub struct HostingSettings {
    pub primary: HostingProvider,
    pub fallback: Option<HostingProvider>,
    pub failover_enabled: bool,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub multipart_threshold_bytes: u64,
    pub multipart_chunk_size_bytes: u64,
    pub multipart_max_parallel_parts: usize,
    pub presigned_url_expiry_hours: i64,
    pub local_hosting_path: PathBuf,
    pub local_hosting_base_url: String,
    pub wistia_api_token: Option<String>,
    pub wistia_upload_url: String,
    pub wistia_api_url: String,
    pub wistia_account_slug: Option<String>,
    /// JSON file holding hosted-video records between runs.
    pub catalog_path: PathBuf,
}

impl HostingSettings {
    /// Providers to build backends for, primary first.
    pub fn configured_providers(&self) -> Vec<HostingProvider> {
        let mut providers = vec![self.primary];
        if let Some(fallback) = self.fallback {
            providers.push(fallback);
        }
        providers
    }

    fn validate_provider(&self, provider: HostingProvider) -> Result<(), anyhow::Error> {
        match provider {
            HostingProvider::S3 => {
                if self.s3_bucket.is_none() || self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3 hosting requires S3_BUCKET and S3_REGION (or AWS_REGION)"
                    ));
                }
            }
            HostingProvider::Local => {
                if self.local_hosting_base_url.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "Local hosting requires LOCAL_HOSTING_BASE_URL"
                    ));
                }
            }
            HostingProvider::Wistia => {
                if self.wistia_api_token.is_none() {
                    return Err(anyhow::anyhow!("Wistia hosting requires WISTIA_API_TOKEN"));
                }
            }
        }
        Ok(())
    }
}

/// Unit prices used for cost estimates
#[derive(Clone, Debug)]
pub struct CostSettings {
    pub rates: CostRates,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub pipeline: PipelineSettings,
    pub hosting: HostingSettings,
    pub cost: CostSettings,
    pub job_queue_max_workers: usize,
    pub job_queue_max_retries: u32,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_decimal_or(value: Option<String>, default: Decimal) -> Decimal {
    value
        .and_then(|v| v.trim().parse::<Decimal>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build from any key lookup. `from_env` wraps this around the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let storage_root = PathBuf::from(
            lookup("STORAGE_ROOT").unwrap_or_else(|| STORAGE_ROOT.to_string()),
        );

        let pipeline = PipelineSettings {
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: lookup("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            process_timeout: Duration::from_secs(parse_or(
                lookup("PROCESS_TIMEOUT_SECS"),
                DEFAULT_PROCESS_TIMEOUT_SECS,
            )),
            max_concurrent_renditions: parse_or(
                lookup("MAX_CONCURRENT_RENDITIONS"),
                DEFAULT_MAX_CONCURRENT_RENDITIONS,
            ),
            thumbnail_offset_secs: parse_or(
                lookup("THUMBNAIL_OFFSET_SECS"),
                DEFAULT_THUMBNAIL_OFFSET_SECS,
            ),
            thumbnail_width: parse_or(lookup("THUMBNAIL_WIDTH"), DEFAULT_THUMBNAIL_WIDTH),
            storage_root: storage_root.clone(),
        };

        let primary: HostingProvider = lookup("HOSTING_PRIMARY_PROVIDER")
            .unwrap_or_else(|| "local".to_string())
            .parse()?;
        let fallback = match lookup("HOSTING_FALLBACK_PROVIDER") {
            Some(value) if !value.trim().is_empty() => Some(value.parse::<HostingProvider>()?),
            _ => None,
        };

        let hosting = HostingSettings {
            primary,
            fallback,
            failover_enabled: parse_or(lookup("HOSTING_FAILOVER_ENABLED"), true),
            s3_bucket: lookup("S3_BUCKET"),
            s3_region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            s3_endpoint: lookup("S3_ENDPOINT"),
            multipart_threshold_bytes: parse_or(
                lookup("MULTIPART_THRESHOLD_MB"),
                MULTIPART_THRESHOLD_MB,
            ) * MIB,
            multipart_chunk_size_bytes: parse_or(
                lookup("MULTIPART_CHUNK_SIZE_MB"),
                MULTIPART_CHUNK_SIZE_MB,
            ) * MIB,
            multipart_max_parallel_parts: parse_or(
                lookup("MULTIPART_MAX_PARALLEL_PARTS"),
                DEFAULT_MULTIPART_MAX_PARALLEL_PARTS,
            ),
            presigned_url_expiry_hours: parse_or(
                lookup("PRESIGNED_URL_EXPIRY_HOURS"),
                DEFAULT_PRESIGNED_URL_EXPIRY_HOURS,
            ),
            local_hosting_path: lookup("LOCAL_HOSTING_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| storage_root.join("hosted")),
            local_hosting_base_url: lookup("LOCAL_HOSTING_BASE_URL")
                .unwrap_or_else(|| LOCAL_HOSTING_BASE_URL.to_string()),
            wistia_api_token: lookup("WISTIA_API_TOKEN"),
            wistia_upload_url: lookup("WISTIA_UPLOAD_URL")
                .unwrap_or_else(|| WISTIA_UPLOAD_URL.to_string()),
            wistia_api_url: lookup("WISTIA_API_URL").unwrap_or_else(|| WISTIA_API_URL.to_string()),
            wistia_account_slug: lookup("WISTIA_ACCOUNT_SLUG"),
            catalog_path: lookup("HOSTING_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| storage_root.join("hosted_videos.json")),
        };

        let defaults = CostRates::default();
        let cost = CostSettings {
            rates: CostRates {
                storage_per_gb_month: parse_decimal_or(
                    lookup("COST_STORAGE_PER_GB_MONTH"),
                    defaults.storage_per_gb_month,
                ),
                bandwidth_per_gb: parse_decimal_or(
                    lookup("COST_BANDWIDTH_PER_GB"),
                    defaults.bandwidth_per_gb,
                ),
                saas_monthly_flat: parse_decimal_or(
                    lookup("COST_SAAS_MONTHLY"),
                    defaults.saas_monthly_flat,
                ),
                processing_per_minute: parse_decimal_or(
                    lookup("COST_PROCESSING_PER_MINUTE"),
                    defaults.processing_per_minute,
                ),
            },
        };

        Ok(Config {
            environment,
            pipeline,
            hosting,
            cost,
            job_queue_max_workers: parse_or(lookup("JOB_QUEUE_MAX_WORKERS"), JOB_QUEUE_MAX_WORKERS),
            job_queue_max_retries: parse_or(lookup("JOB_QUEUE_MAX_RETRIES"), JOB_QUEUE_MAX_RETRIES),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.pipeline.process_timeout.is_zero() {
            return Err(anyhow::anyhow!("PROCESS_TIMEOUT_SECS must be greater than 0"));
        }

        if self.pipeline.max_concurrent_renditions == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_RENDITIONS must be greater than 0"
            ));
        }

        if self.pipeline.thumbnail_offset_secs < 0.0 || self.pipeline.thumbnail_width == 0 {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_OFFSET_SECS must be >= 0 and THUMBNAIL_WIDTH > 0"
            ));
        }

        if self.job_queue_max_workers == 0 {
            return Err(anyhow::anyhow!("JOB_QUEUE_MAX_WORKERS must be greater than 0"));
        }

        let hosting = &self.hosting;
        hosting.validate_provider(hosting.primary)?;
        if let Some(fallback) = hosting.fallback {
            if fallback == hosting.primary {
                return Err(anyhow::anyhow!(
                    "HOSTING_FALLBACK_PROVIDER must differ from HOSTING_PRIMARY_PROVIDER"
                ));
            }
            hosting.validate_provider(fallback)?;
        }

        if hosting.multipart_chunk_size_bytes < MIN_MULTIPART_CHUNK_SIZE_BYTES {
            return Err(anyhow::anyhow!("MULTIPART_CHUNK_SIZE_MB must be at least 5"));
        }

        if hosting.multipart_max_parallel_parts == 0 {
            return Err(anyhow::anyhow!(
                "MULTIPART_MAX_PARALLEL_PARTS must be greater than 0"
            ));
        }

        if hosting.presigned_url_expiry_hours <= 0 {
            return Err(anyhow::anyhow!(
                "PRESIGNED_URL_EXPIRY_HOURS must be greater than 0"
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
