//! Reelcast Hosting Library
//!
//! This crate provides the hosting abstraction and its backends: object storage (S3 and
//! compatible services through `object_store`), the local filesystem and Wistia. The
//! [`HostingManager`] adds provider selection, failover, link regeneration, view
//! recording and analytics on top; [`UsageTracker`] aggregates cost across the fleet.
//!
//! # Storage key format
//!
//! File-based backends store uploads under `videos/{owner_id}/{upload_id}_{filename}`.
//! Keys must not contain `..` or a leading `/`.

pub mod error;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "hosting-local")]
pub mod local;
pub mod manager;
#[cfg(feature = "hosting-s3")]
pub mod object;
pub mod repository;
pub mod traits;
pub mod usage;
#[cfg(feature = "hosting-wistia")]
pub mod wistia;

// Re-export commonly used types
pub use error::{HostingError, HostingResult};
pub use factory::{create_backend, create_hosting_manager};
#[cfg(feature = "hosting-local")]
pub use local::LocalBackend;
pub use manager::HostingManager;
#[cfg(feature = "hosting-s3")]
pub use object::{ObjectStorageBackend, ObjectUploadSettings, UploadMode};
pub use reelcast_core::HostingProvider;
pub use repository::{
    HostedVideoRepository, InMemoryHostedVideoRepository, JsonFileHostedVideoRepository,
};
pub use traits::{AccessLink, HostingBackend, ProviderStatus, ProviderUpload};
pub use usage::UsageTracker;
#[cfg(feature = "hosting-wistia")]
pub use wistia::{WistiaBackend, WistiaSettings};
