use crate::error::{HostingError, HostingResult};
use crate::keys::generate_video_key;
use crate::traits::{AccessLink, HostingBackend, ProviderUpload};
use async_trait::async_trait;
use reelcast_core::models::{HostedVideoStatus, UploadMetadata};
use reelcast_core::HostingProvider;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use uuid::Uuid;

/// Local filesystem hosting, for development and single-node deployments.
///
/// URLs are `{base_url}/{key}` and never expire.
#[derive(Clone)]
pub struct LocalBackend {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBackend {
    /// Create a new LocalBackend instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for hosted files (e.g., "storage/hosted")
    /// * `base_url` - Base URL the files are served from (e.g., "http://localhost:8080/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> HostingResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            HostingError::Config(format!(
                "Failed to create hosting directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBackend {
            base_path,
            base_url,
        })
    }

    /// Convert a storage key to a filesystem path, refusing anything that escapes the base
    /// directory.
    fn key_to_path(&self, storage_key: &str) -> HostingResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.is_empty() {
            return Err(HostingError::InvalidKey(storage_key.to_string()));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            HostingError::Config(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(HostingError::InvalidKey(storage_key.to_string()));
            }
        } else if path.strip_prefix(&self.base_path).is_err() {
            return Err(HostingError::InvalidKey(storage_key.to_string()));
        }

        Ok(path)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl HostingBackend for LocalBackend {
    fn provider(&self) -> HostingProvider {
        HostingProvider::Local
    }

    async fn upload(
        &self,
        video: &Path,
        metadata: &UploadMetadata,
    ) -> HostingResult<ProviderUpload> {
        if !fs::try_exists(video).await.unwrap_or(false) {
            return Err(HostingError::NotFound(video.display().to_string()));
        }

        let key = generate_video_key(&metadata.owner_id, Uuid::new_v4(), video);
        let path = self.key_to_path(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        let size = fs::copy(video, &path)
            .await
            .map_err(|e| HostingError::UploadFailed {
                provider: HostingProvider::Local,
                message: format!("Failed to copy to {}: {}", path.display(), e),
            })?;

        let url = self.generate_url(&key);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local hosting upload successful"
        );

        Ok(ProviderUpload {
            provider_video_id: key,
            share_url: url.clone(),
            embed_url: url,
            thumbnail_url: None,
            status: HostedVideoStatus::Ready,
            size_bytes: size,
            url_expires_at: None,
            duration_secs: metadata.duration_secs,
        })
    }

    async fn delete(&self, provider_video_id: &str) -> HostingResult<()> {
        let path = self.key_to_path(provider_video_id)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::info!(
            path = %path.display(),
            key = %provider_video_id,
            "Local hosting delete successful"
        );
        Ok(())
    }

    async fn refresh_link(&self, provider_video_id: &str) -> HostingResult<AccessLink> {
        let path = self.key_to_path(provider_video_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(HostingError::NotFound(provider_video_id.to_string()));
        }
        Ok(AccessLink {
            url: self.generate_url(provider_video_id),
            expires_at: None,
        })
    }
}
