//! Scripted hosting backend shared by the hosting integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reelcast_core::models::{HostedVideoStatus, ProviderAnalytics, UploadMetadata};
use reelcast_core::HostingProvider;
use reelcast_storage::{
    AccessLink, HostingBackend, HostingError, HostingResult, ProviderStatus, ProviderUpload,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Quota,
    Auth,
    Transport,
    Config,
}

impl Failure {
    fn error(self, provider: HostingProvider) -> HostingError {
        let message = "scripted failure".to_string();
        match self {
            Failure::Quota => HostingError::QuotaExceeded { provider, message },
            Failure::Auth => HostingError::AuthenticationFailed { provider, message },
            Failure::Transport => HostingError::Transport { provider, message },
            Failure::Config => HostingError::Config(message),
        }
    }
}

pub struct ScriptedBackend {
    provider: HostingProvider,
    upload_failure: Option<Failure>,
    delete_failure: Option<Failure>,
    refresh_failure: Option<Failure>,
    upload_status: HostedVideoStatus,
    settled_status: Option<HostedVideoStatus>,
    reported_size: Option<u64>,
    link_ttl: Option<Duration>,
    analytics: Option<ProviderAnalytics>,
    uploads: AtomicUsize,
    refreshes: AtomicUsize,
    status_checks: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(provider: HostingProvider) -> Self {
        Self {
            provider,
            upload_failure: None,
            delete_failure: None,
            refresh_failure: None,
            upload_status: HostedVideoStatus::Ready,
            settled_status: None,
            reported_size: None,
            link_ttl: None,
            analytics: None,
            uploads: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(provider: HostingProvider, failure: Failure) -> Self {
        Self {
            upload_failure: Some(failure),
            ..Self::new(provider)
        }
    }

    pub fn failing_deletes(mut self, failure: Failure) -> Self {
        self.delete_failure = Some(failure);
        self
    }

    pub fn failing_refreshes(mut self, failure: Failure) -> Self {
        self.refresh_failure = Some(failure);
        self
    }

    /// Accept uploads as `Processing`; status queries then report `settled`.
    pub fn processing_until(mut self, settled: HostedVideoStatus) -> Self {
        self.upload_status = HostedVideoStatus::Processing;
        self.settled_status = Some(settled);
        self
    }

    /// Report this size instead of the real file size.
    pub fn reporting_size(mut self, size: u64) -> Self {
        self.reported_size = Some(size);
        self
    }

    /// Issue links that expire `ttl` after issue (negative for already expired).
    pub fn with_link_ttl(mut self, ttl: Duration) -> Self {
        self.link_ttl = Some(ttl);
        self
    }

    pub fn with_analytics(mut self, analytics: ProviderAnalytics) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.link_ttl.map(|ttl| Utc::now() + ttl)
    }
}

#[async_trait]
impl HostingBackend for ScriptedBackend {
    fn provider(&self) -> HostingProvider {
        self.provider
    }

    async fn upload(
        &self,
        video: &Path,
        metadata: &UploadMetadata,
    ) -> HostingResult<ProviderUpload> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.upload_failure {
            return Err(failure.error(self.provider));
        }
        let size = match self.reported_size {
            Some(size) => size,
            None => tokio::fs::metadata(video).await?.len(),
        };
        let id = format!("{}-{}-{}", self.provider, metadata.owner_id, attempt);
        Ok(ProviderUpload {
            share_url: format!("https://{}.example.com/{}?v=0", self.provider, id),
            embed_url: format!("https://{}.example.com/embed/{}", self.provider, id),
            thumbnail_url: None,
            status: self.upload_status,
            size_bytes: size,
            url_expires_at: self.expiry(),
            duration_secs: Some(42.0),
            provider_video_id: id,
        })
    }

    async fn delete(&self, provider_video_id: &str) -> HostingResult<()> {
        if let Some(failure) = self.delete_failure {
            return Err(failure.error(self.provider));
        }
        self.deleted
            .lock()
            .unwrap()
            .push(provider_video_id.to_string());
        Ok(())
    }

    async fn refresh_link(&self, provider_video_id: &str) -> HostingResult<AccessLink> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(failure) = self.refresh_failure {
            return Err(failure.error(self.provider));
        }
        Ok(AccessLink {
            url: format!(
                "https://{}.example.com/{}?v={}",
                self.provider, provider_video_id, n
            ),
            expires_at: Some(Utc::now() + Duration::hours(24)),
        })
    }

    async fn status(&self, _provider_video_id: &str) -> HostingResult<Option<ProviderStatus>> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.settled_status.map(|status| ProviderStatus {
            status,
            thumbnail_url: Some(format!("https://{}.example.com/thumb.jpg", self.provider)),
            duration_secs: Some(42.0),
        }))
    }

    async fn analytics(&self, _provider_video_id: &str) -> HostingResult<Option<ProviderAnalytics>> {
        Ok(self.analytics.clone())
    }
}

pub async fn video_file(dir: &Path) -> PathBuf {
    let path = dir.join("composed.mp4");
    tokio::fs::write(&path, b"composed video").await.unwrap();
    path
}
