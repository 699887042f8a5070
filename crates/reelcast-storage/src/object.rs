//! Object storage hosting backend.
//!
//! Files at or above the multipart threshold go through `WriteMultipart` with a bounded
//! number of parts in flight; smaller files are a single `put`. Access links are signed
//! when a signer is configured (S3), otherwise the public object URL is used.

use crate::error::{HostingError, HostingResult};
use crate::keys::generate_video_key;
use crate::traits::{AccessLink, HostingBackend, ProviderUpload};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, WriteMultipart};
use reelcast_core::constants::{
    DEFAULT_MULTIPART_CHUNK_SIZE_BYTES, DEFAULT_MULTIPART_MAX_PARALLEL_PARTS,
    DEFAULT_MULTIPART_THRESHOLD_BYTES, DEFAULT_PRESIGNED_URL_EXPIRY_HOURS,
};
use reelcast_core::models::{HostedVideoStatus, UploadMetadata};
use reelcast_core::{HostingProvider, HostingSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

const READ_BUFFER_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Standard,
    Multipart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUploadSettings {
    pub multipart_threshold_bytes: u64,
    pub multipart_chunk_size_bytes: u64,
    pub multipart_max_parallel_parts: usize,
    pub presigned_url_expiry: chrono::Duration,
}

impl Default for ObjectUploadSettings {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: DEFAULT_MULTIPART_THRESHOLD_BYTES,
            multipart_chunk_size_bytes: DEFAULT_MULTIPART_CHUNK_SIZE_BYTES,
            multipart_max_parallel_parts: DEFAULT_MULTIPART_MAX_PARALLEL_PARTS,
            presigned_url_expiry: chrono::Duration::hours(DEFAULT_PRESIGNED_URL_EXPIRY_HOURS),
        }
    }
}

impl ObjectUploadSettings {
    pub fn from_hosting(settings: &HostingSettings) -> Self {
        Self {
            multipart_threshold_bytes: settings.multipart_threshold_bytes,
            multipart_chunk_size_bytes: settings.multipart_chunk_size_bytes,
            multipart_max_parallel_parts: settings.multipart_max_parallel_parts.max(1),
            presigned_url_expiry: chrono::Duration::hours(settings.presigned_url_expiry_hours),
        }
    }

    pub fn upload_mode(&self, size_bytes: u64) -> UploadMode {
        if size_bytes >= self.multipart_threshold_bytes {
            UploadMode::Multipart
        } else {
            UploadMode::Standard
        }
    }
}

fn map_store_error(err: ObjectStoreError, key: &str) -> HostingError {
    match err {
        ObjectStoreError::NotFound { .. } => HostingError::NotFound(key.to_string()),
        ObjectStoreError::Unauthenticated { .. } | ObjectStoreError::PermissionDenied { .. } => {
            HostingError::AuthenticationFailed {
                provider: HostingProvider::S3,
                message: err.to_string(),
            }
        }
        other => HostingError::UploadFailed {
            provider: HostingProvider::S3,
            message: other.to_string(),
        },
    }
}

/// Object storage backend over any `ObjectStore`.
#[derive(Clone)]
pub struct ObjectStorageBackend {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    bucket: String,
    public_base_url: String,
    settings: ObjectUploadSettings,
}

impl ObjectStorageBackend {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        settings: ObjectUploadSettings,
    ) -> Self {
        Self {
            store,
            signer,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            settings,
        }
    }

    /// Build an S3 (or S3-compatible) backend. Credentials come from the environment.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        settings: ObjectUploadSettings,
    ) -> HostingResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = Arc::new(
            builder
                .build()
                .map_err(|e| HostingError::Config(e.to_string()))?,
        );

        // Path-style for custom endpoints, virtual-hosted style for AWS.
        let public_base_url = match endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        };

        let signer: Arc<dyn Signer> = store.clone();
        Ok(Self {
            store,
            signer: Some(signer),
            bucket,
            public_base_url,
            settings,
        })
    }

    pub fn settings(&self) -> &ObjectUploadSettings {
        &self.settings
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    async fn put_standard(&self, video: &Path, location: &ObjectPath, key: &str) -> HostingResult<()> {
        let data = tokio::fs::read(video).await?;
        self.store
            .put(location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| map_store_error(e, key))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        video: &Path,
        location: &ObjectPath,
        key: &str,
    ) -> HostingResult<()> {
        let upload = self
            .store
            .put_multipart(location)
            .await
            .map_err(|e| map_store_error(e, key))?;
        let mut writer =
            WriteMultipart::new_with_chunk_size(upload, self.settings.multipart_chunk_size_bytes as usize);

        let mut file = tokio::fs::File::open(video).await?;
        let mut buffer = vec![0u8; READ_BUFFER_BYTES];
        loop {
            let read = match file.read(&mut buffer).await {
                Ok(read) => read,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(e.into());
                }
            };
            if read == 0 {
                break;
            }
            if let Err(e) = writer
                .wait_for_capacity(self.settings.multipart_max_parallel_parts)
                .await
            {
                let _ = writer.abort().await;
                return Err(map_store_error(e, key));
            }
            writer.write(&buffer[..read]);
        }

        writer.finish().await.map_err(|e| map_store_error(e, key))?;
        Ok(())
    }

    async fn access_link(&self, key: &str) -> HostingResult<AccessLink> {
        let Some(signer) = &self.signer else {
            return Ok(AccessLink {
                url: self.public_url(key),
                expires_at: None,
            });
        };

        let expiry = self.settings.presigned_url_expiry;
        let std_expiry = expiry
            .to_std()
            .map_err(|e| HostingError::Config(format!("Invalid presigned URL expiry: {}", e)))?;
        let url = signer
            .signed_url(Method::GET, &ObjectPath::from(key), std_expiry)
            .await
            .map_err(|e| map_store_error(e, key))?;

        Ok(AccessLink {
            url: url.to_string(),
            expires_at: Some(Utc::now() + expiry),
        })
    }
}

#[async_trait]
impl HostingBackend for ObjectStorageBackend {
    fn provider(&self) -> HostingProvider {
        HostingProvider::S3
    }

    #[tracing::instrument(skip(self, video, metadata), fields(bucket = %self.bucket, owner_id = %metadata.owner_id))]
    async fn upload(
        &self,
        video: &Path,
        metadata: &UploadMetadata,
    ) -> HostingResult<ProviderUpload> {
        let size = tokio::fs::metadata(video)
            .await
            .map_err(|_| HostingError::NotFound(video.display().to_string()))?
            .len();
        let key = generate_video_key(&metadata.owner_id, Uuid::new_v4(), video);
        let location = ObjectPath::from(key.as_str());
        let mode = self.settings.upload_mode(size);
        let start = Instant::now();

        let result = match mode {
            UploadMode::Standard => self.put_standard(video, &location, &key).await,
            UploadMode::Multipart => self.put_multipart(video, &location, &key).await,
        };
        if let Err(e) = result {
            tracing::error!(
                error = %e,
                key = %key,
                size_bytes = size,
                mode = ?mode,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage upload failed"
            );
            return Err(e);
        }

        let link = self.access_link(&key).await?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            mode = ?mode,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage upload successful"
        );

        Ok(ProviderUpload {
            provider_video_id: key,
            embed_url: link.url.clone(),
            share_url: link.url,
            thumbnail_url: None,
            status: HostedVideoStatus::Ready,
            size_bytes: size,
            url_expires_at: link.expires_at,
            duration_secs: metadata.duration_secs,
        })
    }

    async fn delete(&self, provider_video_id: &str) -> HostingResult<()> {
        let start = Instant::now();
        match self
            .store
            .delete(&ObjectPath::from(provider_video_id))
            .await
        {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => return Err(map_store_error(e, provider_video_id)),
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %provider_video_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage delete successful"
        );
        Ok(())
    }

    async fn refresh_link(&self, provider_video_id: &str) -> HostingResult<AccessLink> {
        self.store
            .head(&ObjectPath::from(provider_video_id))
            .await
            .map_err(|e| map_store_error(e, provider_video_id))?;
        self.access_link(provider_video_id).await
    }
}
