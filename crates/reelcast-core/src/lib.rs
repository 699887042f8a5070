//! Reelcast Core Library
//!
//! This crate provides the domain models, validated request configuration, error types,
//! environment configuration, the quality ladder table and cost formulas shared by all
//! Reelcast components.

pub mod config;
pub mod constants;
pub mod cost;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, CostSettings, HostingSettings, PipelineSettings};
pub use constants::{quality_level, QualityLevel, QUALITY_LADDER};
pub use cost::CostRates;
pub use error::{AppError, LogLevel};
pub use storage_types::HostingProvider;
