//! Hosted video records and analytics shapes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::constants::COMPLETION_WATCH_PERCENTAGE;
use crate::cost::{CostBreakdown, CostRates};
use crate::storage_types::HostingProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostedVideoStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacySetting {
    Public,
    #[default]
    Unlisted,
    Private,
}

/// Caller-supplied description of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: PrivacySetting,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl UploadMetadata {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            privacy: PrivacySetting::default(),
            tags: Vec::new(),
            duration_secs: None,
        }
    }
}

/// Viewing counters kept per hosted video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewCounters {
    pub view_count: u64,
    pub completed_views: u64,
    pub total_watch_percentage: f64,
    pub viewer_ids: BTreeSet<String>,
}

impl ViewCounters {
    pub fn unique_viewers(&self) -> u64 {
        self.viewer_ids.len() as u64
    }

    pub fn average_watch_percentage(&self) -> f64 {
        if self.view_count == 0 {
            0.0
        } else {
            self.total_watch_percentage / self.view_count as f64
        }
    }

    /// Completed views as a percentage of all views.
    pub fn completion_rate(&self) -> f64 {
        if self.view_count == 0 {
            0.0
        } else {
            self.completed_views as f64 * 100.0 / self.view_count as f64
        }
    }
}

/// One video on one hosting provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedVideo {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub provider: HostingProvider,
    /// Object key for object storage, media id for SaaS providers.
    pub provider_video_id: String,
    pub share_url: String,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    pub status: HostedVideoStatus,
    pub privacy: PrivacySetting,
    pub size_bytes: u64,
    pub duration_secs: Option<f64>,
    pub analytics: ViewCounters,
    /// Estimated bytes served, derived from views and watch percentage.
    pub bandwidth_bytes: u64,
    pub cost: CostBreakdown,
    pub url_expires_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl HostedVideo {
    /// A fresh record in `Uploading` state.
    pub fn uploading(metadata: &UploadMetadata, provider: HostingProvider, size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: metadata.owner_id.clone(),
            title: metadata.title.clone(),
            provider,
            provider_video_id: String::new(),
            share_url: String::new(),
            embed_url: String::new(),
            thumbnail_url: None,
            status: HostedVideoStatus::Uploading,
            privacy: metadata.privacy,
            size_bytes,
            duration_secs: metadata.duration_secs,
            analytics: ViewCounters::default(),
            bandwidth_bytes: 0,
            cost: CostBreakdown::default(),
            url_expires_at: None,
            error_message: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_url_expired(&self, now: DateTime<Utc>) -> bool {
        self.url_expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = HostedVideoStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.is_active = false;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Count one view. Bandwidth grows by the watched share of the file.
    pub fn record_view(&mut self, viewer_id: &str, watch_percentage: f64) {
        let pct = watch_percentage.clamp(0.0, 100.0);
        self.analytics.view_count += 1;
        self.analytics.total_watch_percentage += pct;
        if pct >= COMPLETION_WATCH_PERCENTAGE {
            self.analytics.completed_views += 1;
        }
        self.analytics.viewer_ids.insert(viewer_id.to_string());
        self.bandwidth_bytes += (self.size_bytes as f64 * pct / 100.0).round() as u64;
        self.updated_at = Utc::now();
    }

    /// Recompute the monthly estimate from the current size and bandwidth.
    pub fn refresh_cost(&mut self, rates: &CostRates) {
        self.cost = if self.provider.is_saas() {
            rates.saas_breakdown()
        } else {
            rates.object_storage_breakdown(self.size_bytes, self.bandwidth_bytes)
        };
    }
}

/// Analytics supplied by the hosting provider itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnalytics {
    pub play_count: Option<u64>,
    pub referrers: BTreeMap<String, u64>,
    pub geography: BTreeMap<String, u64>,
    pub daily_views: BTreeMap<NaiveDate, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub video_id: Uuid,
    pub provider: HostingProvider,
    pub status: HostedVideoStatus,
    pub view_count: u64,
    pub unique_viewers: u64,
    pub average_watch_percentage: f64,
    pub completion_rate: f64,
    pub cost: CostBreakdown,
    pub monthly_cost: Decimal,
    pub provider_analytics: Option<ProviderAnalytics>,
}

impl AnalyticsReport {
    pub fn from_record(video: &HostedVideo, provider_analytics: Option<ProviderAnalytics>) -> Self {
        Self {
            video_id: video.id,
            provider: video.provider,
            status: video.status,
            view_count: video.analytics.view_count,
            unique_viewers: video.analytics.unique_viewers(),
            average_watch_percentage: video.analytics.average_watch_percentage(),
            completion_rate: video.analytics.completion_rate(),
            cost: video.cost,
            monthly_cost: video.cost.total(),
            provider_analytics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ready_video(provider: HostingProvider) -> HostedVideo {
        let mut video = HostedVideo::uploading(&UploadMetadata::new("acme", "Demo"), provider, 1000);
        video.status = HostedVideoStatus::Ready;
        video
    }

    #[test]
    fn test_record_view_updates_counters() {
        let mut video = ready_video(HostingProvider::S3);
        video.record_view("alice", 100.0);
        video.record_view("alice", 50.0);
        video.record_view("bob", 95.0);

        assert_eq!(video.analytics.view_count, 3);
        assert_eq!(video.analytics.unique_viewers(), 2);
        assert_eq!(video.analytics.completed_views, 2);
        assert!((video.analytics.average_watch_percentage() - 81.666).abs() < 0.01);
        assert!((video.analytics.completion_rate() - 66.666).abs() < 0.01);
        assert_eq!(video.bandwidth_bytes, 1000 + 500 + 950);
    }

    #[test]
    fn test_watch_percentage_is_clamped() {
        let mut video = ready_video(HostingProvider::S3);
        video.record_view("carol", 180.0);
        assert_eq!(video.analytics.total_watch_percentage, 100.0);
    }

    #[test]
    fn test_url_expiry() {
        let mut video = ready_video(HostingProvider::S3);
        let now = Utc::now();
        assert!(!video.is_url_expired(now));
        video.url_expires_at = Some(now - Duration::hours(1));
        assert!(video.is_url_expired(now));
        video.url_expires_at = Some(now + Duration::hours(1));
        assert!(!video.is_url_expired(now));
    }

    #[test]
    fn test_refresh_cost_by_provider_kind() {
        let rates = CostRates::default();
        let mut saas = ready_video(HostingProvider::Wistia);
        saas.refresh_cost(&rates);
        assert_eq!(saas.cost.hosting, rates.saas_monthly_flat);

        let mut object = ready_video(HostingProvider::S3);
        object.refresh_cost(&rates);
        assert_eq!(object.cost.hosting, Decimal::ZERO);
    }

    #[test]
    fn test_soft_delete_keeps_record() {
        let mut video = ready_video(HostingProvider::Local);
        video.soft_delete();
        assert!(!video.is_active);
        assert!(video.deleted_at.is_some());
        assert_eq!(video.status, HostedVideoStatus::Ready);
    }
}
