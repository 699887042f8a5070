//! Cost formulas for composition processing and hosting.
//!
//! All amounts are USD as `Decimal`. Storage is billed per GiB-month, bandwidth per GiB
//! transferred, composition per minute of wall-clock encoding time. SaaS hosting is a flat
//! per-account monthly fee that does not scale with the number of videos.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;
const MILLIS_PER_MINUTE: u64 = 60_000;
const COST_DECIMAL_PLACES: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub storage_per_gb_month: Decimal,
    pub bandwidth_per_gb: Decimal,
    pub saas_monthly_flat: Decimal,
    pub processing_per_minute: Decimal,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            storage_per_gb_month: Decimal::new(23, 3),
            bandwidth_per_gb: Decimal::new(85, 3),
            saas_monthly_flat: Decimal::new(12, 0),
            processing_per_minute: Decimal::new(1, 2),
        }
    }
}

/// Monthly cost estimate split by concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub hosting: Decimal,
    pub storage: Decimal,
    pub bandwidth: Decimal,
}

impl CostBreakdown {
    pub fn total(&self) -> Decimal {
        self.hosting + self.storage + self.bandwidth
    }
}

impl std::ops::Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(self, rhs: CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            hosting: self.hosting + rhs.hosting,
            storage: self.storage + rhs.storage,
            bandwidth: self.bandwidth + rhs.bandwidth,
        }
    }
}

impl std::ops::AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: CostBreakdown) {
        *self = *self + rhs;
    }
}

fn gib(bytes: u64) -> Decimal {
    Decimal::from(bytes) / Decimal::from(BYTES_PER_GIB)
}

impl CostRates {
    /// Linear in wall-clock encoding time.
    pub fn processing_cost(&self, processing_time: Duration) -> Decimal {
        let millis = u64::try_from(processing_time.as_millis()).unwrap_or(u64::MAX);
        (self.processing_per_minute * Decimal::from(millis) / Decimal::from(MILLIS_PER_MINUTE))
            .round_dp(COST_DECIMAL_PLACES)
    }

    pub fn storage_cost(&self, stored_bytes: u64) -> Decimal {
        (self.storage_per_gb_month * gib(stored_bytes)).round_dp(COST_DECIMAL_PLACES)
    }

    pub fn bandwidth_cost(&self, transferred_bytes: u64) -> Decimal {
        (self.bandwidth_per_gb * gib(transferred_bytes)).round_dp(COST_DECIMAL_PLACES)
    }

    /// Object-storage estimate: stored bytes plus transferred bytes, no hosting fee.
    pub fn object_storage_breakdown(
        &self,
        stored_bytes: u64,
        transferred_bytes: u64,
    ) -> CostBreakdown {
        CostBreakdown {
            hosting: Decimal::ZERO,
            storage: self.storage_cost(stored_bytes),
            bandwidth: self.bandwidth_cost(transferred_bytes),
        }
    }

    /// SaaS estimate: the account's flat monthly fee, independent of the video.
    pub fn saas_breakdown(&self) -> CostBreakdown {
        CostBreakdown {
            hosting: self.saas_monthly_flat,
            storage: Decimal::ZERO,
            bandwidth: Decimal::ZERO,
        }
    }
}
