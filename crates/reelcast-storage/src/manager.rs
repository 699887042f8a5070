//! Provider-agnostic hosting with failover.
//!
//! An upload goes to the preferred provider (or the configured primary). A failover-eligible
//! failure retries the whole upload once on the alternate provider; if that fails too, both
//! causes are returned together. Records are persisted through a [`HostedVideoRepository`].
//!
//! Reads settle provider-side processing and replace expired access links before returning
//! a record. Provider failures on that path are logged, never returned.

use chrono::Utc;
use reelcast_core::models::{
    is_valid_owner_id, AnalyticsReport, HostedVideo, HostedVideoStatus, UploadMetadata,
};
use reelcast_core::{CostRates, HostingProvider};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{HostingError, HostingResult};
use crate::repository::HostedVideoRepository;
use crate::traits::{HostingBackend, ProviderStatus, ProviderUpload};

fn apply_upload(record: &mut HostedVideo, upload: ProviderUpload, rates: &CostRates) {
    record.provider_video_id = upload.provider_video_id;
    record.share_url = upload.share_url;
    record.embed_url = upload.embed_url;
    record.thumbnail_url = upload.thumbnail_url;
    record.status = upload.status;
    record.size_bytes = upload.size_bytes;
    record.url_expires_at = upload.url_expires_at;
    if upload.duration_secs.is_some() {
        record.duration_secs = upload.duration_secs;
    }
    record.error_message = None;
    record.updated_at = Utc::now();
    record.refresh_cost(rates);
}

/// Returns whether anything changed.
fn apply_status(record: &mut HostedVideo, update: ProviderStatus) -> bool {
    if update.status == record.status {
        return false;
    }
    if update.status == HostedVideoStatus::Failed {
        let message = format!("{} reported processing failure", record.provider);
        record.mark_failed(message);
    } else {
        record.status = update.status;
    }
    if update.thumbnail_url.is_some() {
        record.thumbnail_url = update.thumbnail_url;
    }
    if update.duration_secs.is_some() {
        record.duration_secs = update.duration_secs;
    }
    true
}

#[derive(Clone)]
pub struct HostingManager {
    backends: HashMap<HostingProvider, Arc<dyn HostingBackend>>,
    primary: HostingProvider,
    fallback: Option<HostingProvider>,
    failover_enabled: bool,
    repository: Arc<dyn HostedVideoRepository>,
    rates: CostRates,
}

impl HostingManager {
    pub fn new(
        primary: HostingProvider,
        repository: Arc<dyn HostedVideoRepository>,
        rates: CostRates,
    ) -> Self {
        Self {
            backends: HashMap::new(),
            primary,
            fallback: None,
            failover_enabled: false,
            repository,
            rates,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn HostingBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    pub fn with_fallback(mut self, fallback: Option<HostingProvider>, enabled: bool) -> Self {
        self.fallback = fallback.filter(|f| *f != self.primary);
        self.failover_enabled = enabled;
        self
    }

    pub fn primary(&self) -> HostingProvider {
        self.primary
    }

    pub fn repository(&self) -> &Arc<dyn HostedVideoRepository> {
        &self.repository
    }

    pub fn rates(&self) -> &CostRates {
        &self.rates
    }

    fn backend(&self, provider: HostingProvider) -> HostingResult<&Arc<dyn HostingBackend>> {
        self.backends.get(&provider).ok_or_else(|| {
            HostingError::Config(format!("No hosting backend configured for {}", provider))
        })
    }

    /// Where a failed upload on `chosen` is retried, if anywhere.
    fn alternate_for(&self, chosen: HostingProvider) -> Option<HostingProvider> {
        if !self.failover_enabled {
            return None;
        }
        match self.fallback {
            Some(fallback) if fallback != chosen => Some(fallback),
            Some(_) if self.primary != chosen => Some(self.primary),
            _ => None,
        }
    }

    async fn load(&self, id: Uuid) -> HostingResult<HostedVideo> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| HostingError::NotFound(format!("hosted video {}", id)))
    }

    async fn attempt(
        &self,
        provider: HostingProvider,
        video: &Path,
        metadata: &UploadMetadata,
    ) -> HostingResult<ProviderUpload> {
        let backend = self.backend(provider)?;
        backend.upload(video, metadata).await
    }

    /// Upload `video` and return the stored record.
    #[tracing::instrument(skip(self, video, metadata), fields(owner_id = %metadata.owner_id, video = %video.display()))]
    pub async fn upload(
        &self,
        video: &Path,
        metadata: &UploadMetadata,
        preferred: Option<HostingProvider>,
    ) -> HostingResult<HostedVideo> {
        if !is_valid_owner_id(&metadata.owner_id) {
            return Err(HostingError::InvalidInput(format!(
                "owner id must match [A-Za-z0-9_-]+, got {:?}",
                metadata.owner_id
            )));
        }
        let size = tokio::fs::metadata(video)
            .await
            .map_err(|_| HostingError::NotFound(video.display().to_string()))?
            .len();

        let chosen = preferred.unwrap_or(self.primary);
        let mut record = HostedVideo::uploading(metadata, chosen, size);
        self.repository.save(&record).await?;
        let start = Instant::now();

        let outcome = match self.attempt(chosen, video, metadata).await {
            Ok(upload) => Ok((chosen, upload)),
            Err(primary_err) => match self.alternate_for(chosen) {
                Some(alternate) if primary_err.is_failover_eligible() => {
                    tracing::warn!(
                        error = %primary_err,
                        from = %chosen,
                        to = %alternate,
                        "Upload failed, failing over"
                    );
                    record.provider = alternate;
                    match self.attempt(alternate, video, metadata).await {
                        Ok(upload) => Ok((alternate, upload)),
                        Err(fallback_err) => Err(HostingError::FailoverExhausted {
                            primary: Box::new(primary_err),
                            fallback: Box::new(fallback_err),
                        }),
                    }
                }
                _ => Err(primary_err),
            },
        };

        match outcome {
            Ok((provider, upload)) => {
                apply_upload(&mut record, upload, &self.rates);
                self.repository.save(&record).await?;
                tracing::info!(
                    video_id = %record.id,
                    provider = %provider,
                    failed_over = provider != chosen,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_millis(),
                    "Hosted video uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                record.mark_failed(e.to_string());
                if let Err(save_err) = self.repository.save(&record).await {
                    tracing::warn!(error = %save_err, "Failed to persist failed upload record");
                }
                tracing::error!(
                    video_id = %record.id,
                    error = %e,
                    error_code = e.error_code(),
                    duration_ms = start.elapsed().as_millis(),
                    "Hosted video upload failed"
                );
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> HostingResult<HostedVideo> {
        let record = self.load(id).await?;
        self.refresh_record(record).await
    }

    /// Stored records, refreshed like [`HostingManager::get`]. Deleted records are included
    /// only with `include_deleted`.
    pub async fn list(&self, include_deleted: bool) -> HostingResult<Vec<HostedVideo>> {
        let records = if include_deleted {
            self.repository.list().await?
        } else {
            self.repository.list_active().await?
        };
        let mut refreshed = Vec::with_capacity(records.len());
        for record in records {
            refreshed.push(self.refresh_record(record).await?);
        }
        Ok(refreshed)
    }

    /// Settle a `Processing` upload and replace an expired access link, persisting any
    /// change. Only a repository failure is returned.
    async fn refresh_record(&self, mut record: HostedVideo) -> HostingResult<HostedVideo> {
        if !record.is_active || record.provider_video_id.is_empty() {
            return Ok(record);
        }
        let Some(backend) = self.backends.get(&record.provider) else {
            return Ok(record);
        };
        let mut changed = false;

        if record.status == HostedVideoStatus::Processing {
            match backend.status(&record.provider_video_id).await {
                Ok(Some(update)) => {
                    if apply_status(&mut record, update) {
                        changed = true;
                        tracing::info!(
                            video_id = %record.id,
                            provider = %record.provider,
                            status = ?record.status,
                            "Hosted video finished processing"
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    video_id = %record.id,
                    error = %e,
                    "Provider status unavailable"
                ),
            }
        }

        if record.status == HostedVideoStatus::Ready && record.is_url_expired(Utc::now()) {
            let previous_expiry = record.url_expires_at;
            match backend.refresh_link(&record.provider_video_id).await {
                Ok(link) => {
                    if !record.provider.is_saas() {
                        record.embed_url = link.url.clone();
                    }
                    record.share_url = link.url;
                    record.url_expires_at = link.expires_at;
                    changed = true;
                    tracing::info!(
                        video_id = %record.id,
                        previous_expiry = ?previous_expiry,
                        expires_at = ?record.url_expires_at,
                        "Regenerated expired access link"
                    );
                }
                Err(e) => tracing::warn!(
                    video_id = %record.id,
                    error = %e,
                    error_code = e.error_code(),
                    "Access link expired and could not be regenerated"
                ),
            }
        }

        if changed {
            record.updated_at = Utc::now();
            self.repository.save(&record).await?;
        }
        Ok(record)
    }

    /// Soft-delete the record. With `from_provider`, the provider copy is removed first and
    /// a provider failure leaves the record untouched.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, from_provider: bool) -> HostingResult<HostedVideo> {
        let mut record = self.load(id).await?;
        if !record.is_active {
            return Ok(record);
        }

        if from_provider && !record.provider_video_id.is_empty() {
            self.backend(record.provider)?
                .delete(&record.provider_video_id)
                .await?;
        }

        record.soft_delete();
        self.repository.save(&record).await?;
        tracing::info!(
            video_id = %record.id,
            provider = %record.provider,
            from_provider,
            "Hosted video deleted"
        );
        Ok(record)
    }

    /// Issue a fresh access link when the stored one has expired. Unexpired or non-expiring
    /// links are returned as they are; a provider that cannot issue one is logged and the
    /// stored link is returned.
    #[tracing::instrument(skip(self))]
    pub async fn regenerate_link_if_expired(&self, id: Uuid) -> HostingResult<HostedVideo> {
        let record = self.load(id).await?;
        self.refresh_record(record).await
    }

    pub async fn record_view(
        &self,
        id: Uuid,
        viewer_id: &str,
        watch_percentage: f64,
    ) -> HostingResult<HostedVideo> {
        if !watch_percentage.is_finite() {
            return Err(HostingError::InvalidInput(format!(
                "watch percentage must be a finite number, got {}",
                watch_percentage
            )));
        }
        let mut record = self.load(id).await?;
        if !record.is_active {
            return Err(HostingError::NotFound(format!("hosted video {}", id)));
        }
        record.record_view(viewer_id, watch_percentage);
        record.refresh_cost(&self.rates);
        self.repository.save(&record).await?;
        tracing::debug!(
            video_id = %id,
            views = record.analytics.view_count,
            "View recorded"
        );
        Ok(record)
    }

    /// Counters and cost for one video, plus provider analytics when available.
    pub async fn analytics(&self, id: Uuid) -> HostingResult<AnalyticsReport> {
        let record = self.load(id).await?;
        let mut record = self.refresh_record(record).await?;
        record.refresh_cost(&self.rates);

        let provider_analytics = match self.backends.get(&record.provider) {
            Some(backend) if !record.provider_video_id.is_empty() => {
                match backend.analytics(&record.provider_video_id).await {
                    Ok(analytics) => analytics,
                    Err(e) => {
                        tracing::warn!(
                            video_id = %id,
                            error = %e,
                            "Provider analytics unavailable"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(AnalyticsReport::from_record(&record, provider_analytics))
    }
}
