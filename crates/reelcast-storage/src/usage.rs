//! Fleet usage and cost aggregation over active hosted videos.
//!
//! Object-storage cost is summed per video from its size and served bytes. SaaS providers
//! bill per account, so their flat fee is added once for each such provider that has at
//! least one active video. Failed uploads hold nothing and are skipped.

use reelcast_core::models::{HostedVideoStatus, ProviderUsage, UsageSummary};
use reelcast_core::CostRates;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::HostingResult;
use crate::repository::HostedVideoRepository;

#[derive(Clone)]
pub struct UsageTracker {
    repository: Arc<dyn HostedVideoRepository>,
    rates: CostRates,
}

impl UsageTracker {
    pub fn new(repository: Arc<dyn HostedVideoRepository>, rates: CostRates) -> Self {
        Self { repository, rates }
    }

    pub async fn summary(&self) -> HostingResult<UsageSummary> {
        let videos = self.repository.list_active().await?;
        let mut per_provider: BTreeMap<_, ProviderUsage> = BTreeMap::new();

        for video in videos
            .iter()
            .filter(|v| v.status != HostedVideoStatus::Failed)
        {
            let usage = per_provider.entry(video.provider).or_default();
            usage.videos += 1;
            usage.storage_bytes += video.size_bytes;
            usage.views += video.analytics.view_count;
            if !video.provider.is_saas() {
                usage.cost += self
                    .rates
                    .object_storage_breakdown(video.size_bytes, video.bandwidth_bytes);
            }
        }

        let mut summary = UsageSummary::default();
        for (provider, usage) in per_provider.iter_mut() {
            if provider.is_saas() {
                usage.cost += self.rates.saas_breakdown();
            }
            summary.total_videos += usage.videos;
            summary.total_storage_bytes += usage.storage_bytes;
            summary.total_views += usage.views;
            summary.cost += usage.cost;
        }

        summary.total_monthly_cost = summary.cost.total();
        summary.cost_per_view = (summary.total_views > 0)
            .then(|| summary.total_monthly_cost / Decimal::from(summary.total_views));
        summary.per_provider = per_provider;

        tracing::debug!(
            videos = summary.total_videos,
            storage_bytes = summary.total_storage_bytes,
            monthly_cost = %summary.total_monthly_cost,
            "Usage summary computed"
        );
        Ok(summary)
    }
}
