#[cfg(feature = "hosting-local")]
use crate::LocalBackend;
#[cfg(feature = "hosting-s3")]
use crate::{ObjectStorageBackend, ObjectUploadSettings};
#[cfg(feature = "hosting-wistia")]
use crate::{WistiaBackend, WistiaSettings};
use crate::{
    HostedVideoRepository, HostingBackend, HostingError, HostingManager, HostingProvider,
    HostingResult, JsonFileHostedVideoRepository,
};
use reelcast_core::{Config, HostingSettings};
use std::sync::Arc;

/// Create the backend for one provider from configuration
pub async fn create_backend(
    provider: HostingProvider,
    settings: &HostingSettings,
) -> HostingResult<Arc<dyn HostingBackend>> {
    match provider {
        #[cfg(feature = "hosting-s3")]
        HostingProvider::S3 => {
            let bucket = settings
                .s3_bucket
                .clone()
                .ok_or_else(|| HostingError::Config("S3_BUCKET not configured".to_string()))?;
            let region = settings.s3_region.clone().ok_or_else(|| {
                HostingError::Config("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let backend = ObjectStorageBackend::s3(
                bucket,
                region,
                settings.s3_endpoint.clone(),
                ObjectUploadSettings::from_hosting(settings),
            )?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "hosting-s3"))]
        HostingProvider::S3 => Err(HostingError::Config(
            "S3 hosting backend not available (hosting-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "hosting-local")]
        HostingProvider::Local => {
            let backend = LocalBackend::new(
                settings.local_hosting_path.clone(),
                settings.local_hosting_base_url.clone(),
            )
            .await?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "hosting-local"))]
        HostingProvider::Local => Err(HostingError::Config(
            "Local hosting backend not available (hosting-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "hosting-wistia")]
        HostingProvider::Wistia => {
            let backend = WistiaBackend::new(WistiaSettings::from_hosting(settings)?)?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "hosting-wistia"))]
        HostingProvider::Wistia => Err(HostingError::Config(
            "Wistia hosting backend not available (hosting-wistia feature not enabled)".to_string(),
        )),
    }
}

/// Create a hosting manager with the configured primary and fallback backends and the
/// JSON-file record catalog.
pub async fn create_hosting_manager(config: &Config) -> HostingResult<HostingManager> {
    let settings = &config.hosting;
    let repository: Arc<dyn HostedVideoRepository> =
        Arc::new(JsonFileHostedVideoRepository::open(settings.catalog_path.clone()).await?);

    let mut manager = HostingManager::new(settings.primary, repository, config.cost.rates)
        .with_fallback(settings.fallback, settings.failover_enabled);
    for provider in settings.configured_providers() {
        manager = manager.with_backend(create_backend(provider, settings).await?);
    }

    tracing::info!(
        primary = %settings.primary,
        fallback = ?settings.fallback,
        failover_enabled = settings.failover_enabled,
        "Hosting manager ready"
    );
    Ok(manager)
}

#[cfg(all(test, feature = "hosting-local"))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_create_local_manager_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let vars: HashMap<&str, String> = [
            ("STORAGE_ROOT", root),
            ("HOSTING_PRIMARY_PROVIDER", "local".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        let manager = create_hosting_manager(&config).await.unwrap();

        assert_eq!(manager.primary(), HostingProvider::Local);
        assert!(dir.path().join("hosted").exists());
    }

    #[tokio::test]
    async fn test_wistia_without_token_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = [
            ("STORAGE_ROOT", dir.path().to_string_lossy().into_owned()),
            ("HOSTING_PRIMARY_PROVIDER", "local".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        let result = create_backend(HostingProvider::Wistia, &config.hosting).await;
        assert!(matches!(result, Err(HostingError::Config(_))));
    }
}
