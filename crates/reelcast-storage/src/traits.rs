//! Hosting backend abstraction
//!
//! Every provider (object storage, local filesystem, SaaS video hosting) implements
//! [`HostingBackend`]. The manager turns a [`ProviderUpload`] into a `HostedVideo`
//! record, so callers never see provider-specific shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelcast_core::models::{HostedVideoStatus, ProviderAnalytics, UploadMetadata};
use reelcast_core::HostingProvider;
use std::path::Path;

use crate::error::HostingResult;

/// What a provider reports back after accepting an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderUpload {
    /// Object key for object storage, media id for SaaS providers.
    pub provider_video_id: String,
    pub share_url: String,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    pub status: HostedVideoStatus,
    pub size_bytes: u64,
    /// Set when the share URL is a signed link.
    pub url_expires_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}

/// A provider's current view of an upload it is still processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    pub status: HostedVideoStatus,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<f64>,
}

/// A freshly issued access link.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLink {
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait HostingBackend: Send + Sync {
    fn provider(&self) -> HostingProvider;

    /// Upload the file at `video` and return the provider's view of it.
    async fn upload(&self, video: &Path, metadata: &UploadMetadata)
        -> HostingResult<ProviderUpload>;

    /// Remove the video from the provider. Deleting something already gone is not an error.
    async fn delete(&self, provider_video_id: &str) -> HostingResult<()>;

    /// Issue a new access link for an existing upload.
    async fn refresh_link(&self, provider_video_id: &str) -> HostingResult<AccessLink>;

    /// Current processing state of an accepted upload. Providers that are ready as soon as
    /// the upload returns have nothing to report.
    async fn status(&self, _provider_video_id: &str) -> HostingResult<Option<ProviderStatus>> {
        Ok(None)
    }

    /// Provider-native analytics, if the provider has any.
    async fn analytics(&self, _provider_video_id: &str) -> HostingResult<Option<ProviderAnalytics>> {
        Ok(None)
    }
}
