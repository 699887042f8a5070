//! Wistia SaaS hosting backend.
//!
//! The provider returns its own media id, share and embed URLs and a thumbnail, so no
//! local thumbnail is needed on this path. Account quota errors are classified as
//! `QuotaExceeded`, separately from transport failures.

use crate::error::{HostingError, HostingResult};
use crate::keys::content_type_for;
use crate::traits::{AccessLink, HostingBackend, ProviderStatus, ProviderUpload};
use async_trait::async_trait;
use chrono::NaiveDate;
use reelcast_core::models::{HostedVideoStatus, ProviderAnalytics, UploadMetadata};
use reelcast_core::{HostingProvider, HostingSettings};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(1800);
const EMBED_BASE_URL: &str = "https://fast.wistia.net/embed/iframe";

#[derive(Debug, Clone)]
pub struct WistiaSettings {
    pub api_token: String,
    pub upload_url: String,
    pub api_url: String,
    pub account_slug: Option<String>,
}

impl WistiaSettings {
    pub fn from_hosting(settings: &HostingSettings) -> HostingResult<Self> {
        let api_token = settings
            .wistia_api_token
            .clone()
            .ok_or_else(|| HostingError::Config("WISTIA_API_TOKEN not configured".to_string()))?;
        Ok(Self {
            api_token,
            upload_url: settings.wistia_upload_url.clone(),
            api_url: settings.wistia_api_url.clone(),
            account_slug: settings.wistia_account_slug.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    hashed_id: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    thumbnail: Option<ThumbnailInfo>,
}

/// `GET medias/{id}.json`; status is `queued`, `processing`, `ready` or `failed`.
#[derive(Debug, Deserialize)]
struct MediaDetails {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    thumbnail: Option<ThumbnailInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MediaStats {
    #[serde(default)]
    play_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DailyStats {
    date: NaiveDate,
    #[serde(default)]
    play_count: u64,
}

#[derive(Debug, Deserialize)]
struct ViewEvent {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    referrer_url: Option<String>,
}

fn upload_status(status: Option<&str>) -> HostedVideoStatus {
    match status {
        Some("ready") => HostedVideoStatus::Ready,
        Some("failed") => HostedVideoStatus::Failed,
        _ => HostedVideoStatus::Processing,
    }
}

/// Classify a non-success response.
fn classify_failure(status: StatusCode, body: &str) -> HostingError {
    let provider = HostingProvider::Wistia;
    let message = format!("{} - {}", status, body);
    let lowered = body.to_ascii_lowercase();
    let mentions_quota = lowered.contains("limit") || lowered.contains("quota");
    match status.as_u16() {
        402 | 429 => HostingError::QuotaExceeded { provider, message },
        400..=499 if mentions_quota => HostingError::QuotaExceeded { provider, message },
        401 | 403 => HostingError::AuthenticationFailed { provider, message },
        404 => HostingError::NotFound(message),
        _ => HostingError::UploadFailed { provider, message },
    }
}

fn transport(err: reqwest::Error) -> HostingError {
    HostingError::Transport {
        provider: HostingProvider::Wistia,
        message: err.to_string(),
    }
}

async fn check(response: Response) -> HostingResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(classify_failure(status, &body))
}

pub struct WistiaBackend {
    http_client: Client,
    settings: WistiaSettings,
}

impl WistiaBackend {
    pub fn new(settings: WistiaSettings) -> HostingResult<Self> {
        let http_client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| HostingError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            settings,
        })
    }

    fn share_url(&self, hashed_id: &str) -> String {
        match &self.settings.account_slug {
            Some(slug) => format!("https://{}.wistia.com/medias/{}", slug, hashed_id),
            None => format!("https://wistia.com/medias/{}", hashed_id),
        }
    }

    fn embed_url(hashed_id: &str) -> String {
        format!("{}/{}", EMBED_BASE_URL, hashed_id)
    }

    fn media_url(&self, hashed_id: &str) -> String {
        self.api(&format!("medias/{}.json", urlencoding::encode(hashed_id)))
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> HostingResult<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    /// Per-country and per-referrer counts from the event log. Best effort.
    async fn event_breakdown(
        &self,
        hashed_id: &str,
    ) -> (BTreeMap<String, u64>, BTreeMap<String, u64>) {
        let url = self.api(&format!(
            "stats/events.json?media_id={}",
            urlencoding::encode(hashed_id)
        ));
        let mut referrers = BTreeMap::new();
        let mut geography = BTreeMap::new();
        match self.get_json::<Vec<ViewEvent>>(&url).await {
            Ok(events) => {
                for event in events {
                    if let Some(country) = event.country.filter(|c| !c.is_empty()) {
                        *geography.entry(country).or_insert(0) += 1;
                    }
                    if let Some(referrer) = event.referrer_url.filter(|r| !r.is_empty()) {
                        *referrers.entry(referrer).or_insert(0) += 1;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, media_id = %hashed_id, "Wistia event stats unavailable"),
        }
        (referrers, geography)
    }
}

#[async_trait]
impl HostingBackend for WistiaBackend {
    fn provider(&self) -> HostingProvider {
        HostingProvider::Wistia
    }

    #[tracing::instrument(skip(self, video, metadata), fields(owner_id = %metadata.owner_id))]
    async fn upload(
        &self,
        video: &Path,
        metadata: &UploadMetadata,
    ) -> HostingResult<ProviderUpload> {
        let file = tokio::fs::File::open(video)
            .await
            .map_err(|_| HostingError::NotFound(video.display().to_string()))?;
        let size = file.metadata().await?.len();
        let file_name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        let part = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            size,
        )
        .file_name(file_name)
        .mime_str(content_type_for(video))
        .map_err(|e| HostingError::Config(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("name", metadata.title.clone());
        if let Some(description) = &metadata.description {
            form = form.text("description", description.clone());
        }

        let start = Instant::now();
        let response = self
            .http_client
            .post(&self.settings.upload_url)
            .bearer_auth(&self.settings.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let uploaded: UploadResponse = check(response).await?.json().await.map_err(transport)?;

        tracing::info!(
            media_id = %uploaded.hashed_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Wistia upload successful"
        );

        Ok(ProviderUpload {
            share_url: self.share_url(&uploaded.hashed_id),
            embed_url: Self::embed_url(&uploaded.hashed_id),
            thumbnail_url: uploaded.thumbnail.map(|t| t.url),
            status: upload_status(uploaded.status.as_deref()),
            size_bytes: size,
            url_expires_at: None,
            duration_secs: uploaded.duration.or(metadata.duration_secs),
            provider_video_id: uploaded.hashed_id,
        })
    }

    async fn delete(&self, provider_video_id: &str) -> HostingResult<()> {
        let url = self.media_url(provider_video_id);
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .map_err(transport)?;
        match check(response).await {
            Ok(_) | Err(HostingError::NotFound(_)) => {
                tracing::info!(media_id = %provider_video_id, "Wistia delete successful");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Wistia links do not expire; this confirms the media still exists.
    async fn refresh_link(&self, provider_video_id: &str) -> HostingResult<AccessLink> {
        let _: MediaDetails = self.get_json(&self.media_url(provider_video_id)).await?;
        Ok(AccessLink {
            url: self.share_url(provider_video_id),
            expires_at: None,
        })
    }

    async fn status(&self, provider_video_id: &str) -> HostingResult<Option<ProviderStatus>> {
        let media: MediaDetails = self.get_json(&self.media_url(provider_video_id)).await?;
        Ok(Some(ProviderStatus {
            status: upload_status(media.status.as_deref()),
            thumbnail_url: media.thumbnail.map(|t| t.url),
            duration_secs: media.duration,
        }))
    }

    async fn analytics(&self, provider_video_id: &str) -> HostingResult<Option<ProviderAnalytics>> {
        let encoded = urlencoding::encode(provider_video_id);
        let stats: MediaStats = self
            .get_json(&self.api(&format!("stats/medias/{}.json", encoded)))
            .await?;

        let daily_views = match self
            .get_json::<Vec<DailyStats>>(&self.api(&format!("stats/medias/{}/by_date.json", encoded)))
            .await
        {
            Ok(days) => days.into_iter().map(|d| (d.date, d.play_count)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, media_id = %provider_video_id, "Wistia daily stats unavailable");
                BTreeMap::new()
            }
        };
        let (referrers, geography) = self.event_breakdown(provider_video_id).await;

        Ok(Some(ProviderAnalytics {
            play_count: stats.play_count,
            referrers,
            geography,
            daily_views,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(server_url: &str) -> WistiaBackend {
        WistiaBackend::new(WistiaSettings {
            api_token: "test-token".to_string(),
            upload_url: server_url.to_string(),
            api_url: format!("{}/v1", server_url),
            account_slug: Some("acme".to_string()),
        })
        .unwrap()
    }

    async fn video_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("demo.mp4");
        tokio::fs::write(&path, b"video bytes").await.unwrap();
        path
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad token"),
            HostingError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "Account video limit reached"),
            HostingError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            HostingError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "upstream"),
            HostingError::UploadFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_upload_returns_provider_urls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id": 1, "hashed_id": "abc123", "name": "Demo", "duration": 42.5,
                    "status": "ready", "thumbnail": {"url": "https://embed.wistia.com/thumb.jpg"}}"#,
            )
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(dir.path()).await;

        let upload = backend(&server.url())
            .upload(&video, &UploadMetadata::new("acme", "Demo"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(upload.provider_video_id, "abc123");
        assert_eq!(upload.share_url, "https://acme.wistia.com/medias/abc123");
        assert_eq!(upload.embed_url, "https://fast.wistia.net/embed/iframe/abc123");
        assert_eq!(
            upload.thumbnail_url.as_deref(),
            Some("https://embed.wistia.com/thumb.jpg")
        );
        assert_eq!(upload.status, HostedVideoStatus::Ready);
        assert_eq!(upload.duration_secs, Some(42.5));
        assert_eq!(upload.size_bytes, 11);
    }

    #[tokio::test]
    async fn test_upload_quota_exceeded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"error": "This account has exceeded its video limit"}"#)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(dir.path()).await;

        let err = backend(&server.url())
            .upload(&video, &UploadMetadata::new("acme", "Demo"))
            .await
            .unwrap_err();

        assert!(matches!(err, HostingError::QuotaExceeded { .. }));
        assert!(err.is_failover_eligible());
    }

    #[tokio::test]
    async fn test_delete_missing_media_is_ok() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1/medias/abc123.json")
            .with_status(404)
            .create_async()
            .await;

        assert!(backend(&server.url()).delete("abc123").await.is_ok());
    }

    #[tokio::test]
    async fn test_status_reports_processing_and_ready() {
        let mut server = mockito::Server::new_async().await;
        let processing = server
            .mock("GET", "/v1/medias/abc123.json")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"{"hashed_id": "abc123", "status": "queued"}"#)
            .expect(1)
            .create_async()
            .await;
        let backend = backend(&server.url());

        let queued = backend.status("abc123").await.unwrap().unwrap();
        assert_eq!(queued.status, HostedVideoStatus::Processing);
        assert!(queued.thumbnail_url.is_none());
        processing.assert_async().await;
        processing.remove_async().await;

        server
            .mock("GET", "/v1/medias/abc123.json")
            .with_status(200)
            .with_body(
                r#"{"hashed_id": "abc123", "status": "ready", "duration": 61.2,
                    "thumbnail": {"url": "https://embed.wistia.com/thumb.jpg"}}"#,
            )
            .create_async()
            .await;

        let ready = backend.status("abc123").await.unwrap().unwrap();
        assert_eq!(ready.status, HostedVideoStatus::Ready);
        assert_eq!(ready.duration_secs, Some(61.2));
        assert_eq!(
            ready.thumbnail_url.as_deref(),
            Some("https://embed.wistia.com/thumb.jpg")
        );
    }

    #[tokio::test]
    async fn test_status_of_missing_media_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/medias/gone.json")
            .with_status(404)
            .create_async()
            .await;

        let err = backend(&server.url()).status("gone").await.unwrap_err();
        assert!(matches!(err, HostingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_analytics_combines_stats() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/stats/medias/abc123.json")
            .with_status(200)
            .with_body(r#"{"load_count": 20, "play_count": 12, "play_rate": 0.6}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/stats/medias/abc123/by_date.json")
            .with_status(200)
            .with_body(
                r#"[{"date": "2026-10-01", "load_count": 8, "play_count": 5},
                    {"date": "2026-10-02", "load_count": 12, "play_count": 7}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/v1/stats/events.json")
            .match_query(mockito::Matcher::UrlEncoded(
                "media_id".into(),
                "abc123".into(),
            ))
            .with_status(200)
            .with_body(
                r#"[{"country": "US", "referrer_url": "https://example.com"},
                    {"country": "US", "referrer_url": ""},
                    {"country": "FR"}]"#,
            )
            .create_async()
            .await;

        let analytics = backend(&server.url())
            .analytics("abc123")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(analytics.play_count, Some(12));
        assert_eq!(analytics.daily_views.len(), 2);
        assert_eq!(
            analytics.daily_views[&NaiveDate::from_ymd_opt(2026, 10, 2).unwrap()],
            7
        );
        assert_eq!(analytics.geography["US"], 2);
        assert_eq!(analytics.geography["FR"], 1);
        assert_eq!(analytics.referrers.len(), 1);
    }
}
