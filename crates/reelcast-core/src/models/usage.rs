use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cost::CostBreakdown;
use crate::storage_types::HostingProvider;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub videos: u64,
    pub storage_bytes: u64,
    pub views: u64,
    pub cost: CostBreakdown,
}

/// Fleet-wide totals over all active hosted videos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_videos: u64,
    pub total_storage_bytes: u64,
    pub total_views: u64,
    pub cost: CostBreakdown,
    pub total_monthly_cost: Decimal,
    /// `None` until the fleet has at least one view.
    pub cost_per_view: Option<Decimal>,
    pub per_provider: BTreeMap<HostingProvider, ProviderUsage>,
}
