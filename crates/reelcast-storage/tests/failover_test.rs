mod common;

use chrono::Duration;
use common::{video_file, Failure, ScriptedBackend};
use reelcast_core::models::{HostedVideoStatus, UploadMetadata};
use reelcast_core::{CostRates, HostingProvider};
use reelcast_storage::{
    HostedVideoRepository, HostingBackend, HostingError, HostingManager,
    InMemoryHostedVideoRepository,
};
use std::sync::Arc;

struct Setup {
    manager: HostingManager,
    repository: Arc<InMemoryHostedVideoRepository>,
    primary: Arc<ScriptedBackend>,
    fallback: Arc<ScriptedBackend>,
}

fn setup(primary: ScriptedBackend, fallback: ScriptedBackend, failover_enabled: bool) -> Setup {
    let repository = Arc::new(InMemoryHostedVideoRepository::new());
    let primary = Arc::new(primary);
    let fallback = Arc::new(fallback);
    let manager = HostingManager::new(
        primary.provider(),
        repository.clone(),
        CostRates::default(),
    )
    .with_backend(primary.clone())
    .with_backend(fallback.clone())
    .with_fallback(Some(fallback.provider()), failover_enabled);
    Setup {
        manager,
        repository,
        primary,
        fallback,
    }
}

fn metadata() -> UploadMetadata {
    UploadMetadata::new("acme", "Quarterly demo")
}

#[tokio::test]
async fn test_quota_on_primary_fails_over_to_fallback() {
    let s = setup(
        ScriptedBackend::failing(HostingProvider::Wistia, Failure::Quota),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    assert_eq!(hosted.provider, HostingProvider::S3);
    assert_eq!(hosted.status, HostedVideoStatus::Ready);
    assert!(hosted.provider_video_id.starts_with("s3-acme-"));
    assert_eq!(s.primary.uploads(), 1);
    assert_eq!(s.fallback.uploads(), 1);

    let stored = s.repository.get(hosted.id).await.unwrap().unwrap();
    assert_eq!(stored, hosted);
    assert_eq!(s.repository.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_both_providers_failing_reports_both_causes() {
    let s = setup(
        ScriptedBackend::failing(HostingProvider::Wistia, Failure::Auth),
        ScriptedBackend::failing(HostingProvider::S3, Failure::Transport),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let err = s.manager.upload(&video, &metadata(), None).await.unwrap_err();

    match &err {
        HostingError::FailoverExhausted { primary, fallback } => {
            assert!(matches!(**primary, HostingError::AuthenticationFailed { .. }));
            assert!(matches!(**fallback, HostingError::Transport { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    let records = s.repository.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HostedVideoStatus::Failed);
    assert!(records[0].error_message.is_some());
}

#[tokio::test]
async fn test_failover_disabled_surfaces_primary_error() {
    let s = setup(
        ScriptedBackend::failing(HostingProvider::Wistia, Failure::Quota),
        ScriptedBackend::new(HostingProvider::S3),
        false,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let err = s.manager.upload(&video, &metadata(), None).await.unwrap_err();

    assert!(matches!(err, HostingError::QuotaExceeded { .. }));
    assert_eq!(s.fallback.uploads(), 0);
}

#[tokio::test]
async fn test_non_provider_error_does_not_fail_over() {
    let s = setup(
        ScriptedBackend::failing(HostingProvider::Wistia, Failure::Config),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let err = s.manager.upload(&video, &metadata(), None).await.unwrap_err();

    assert!(matches!(err, HostingError::Config(_)));
    assert_eq!(s.fallback.uploads(), 0);
}

#[tokio::test]
async fn test_missing_video_rejected_before_any_provider_call() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );

    let err = s
        .manager
        .upload(std::path::Path::new("/nonexistent/video.mp4"), &metadata(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, HostingError::NotFound(_)));
    assert_eq!(s.primary.uploads() + s.fallback.uploads(), 0);
    assert!(s.repository.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preferred_provider_overrides_primary() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let hosted = s
        .manager
        .upload(&video, &metadata(), Some(HostingProvider::S3))
        .await
        .unwrap();

    assert_eq!(hosted.provider, HostingProvider::S3);
    assert_eq!(s.primary.uploads(), 0);
}

#[tokio::test]
async fn test_preferred_fallback_fails_over_to_primary() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia),
        ScriptedBackend::failing(HostingProvider::S3, Failure::Transport),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let hosted = s
        .manager
        .upload(&video, &metadata(), Some(HostingProvider::S3))
        .await
        .unwrap();

    assert_eq!(hosted.provider, HostingProvider::Wistia);
}

#[tokio::test]
async fn test_soft_delete_keeps_provider_copy() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let deleted = s.manager.delete(hosted.id, false).await.unwrap();

    assert!(!deleted.is_active);
    assert!(deleted.deleted_at.is_some());
    assert!(s.primary.deleted().is_empty());
    assert!(s.repository.list_active().await.unwrap().is_empty());
    assert_eq!(s.repository.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_from_provider() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    s.manager.delete(hosted.id, true).await.unwrap();
    s.manager.delete(hosted.id, true).await.unwrap();

    assert_eq!(s.primary.deleted(), vec![hosted.provider_video_id.clone()]);
}

#[tokio::test]
async fn test_provider_delete_failure_keeps_record_active() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3).failing_deletes(Failure::Transport),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    assert!(s.manager.delete(hosted.id, true).await.is_err());
    assert!(s.repository.get(hosted.id).await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn test_expired_link_is_regenerated_and_persisted() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3).with_link_ttl(Duration::hours(-1)),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let refreshed = s.manager.regenerate_link_if_expired(hosted.id).await.unwrap();

    assert_ne!(refreshed.share_url, hosted.share_url);
    assert_eq!(refreshed.embed_url, refreshed.share_url);
    assert!(refreshed.url_expires_at.unwrap() > chrono::Utc::now());
    assert_eq!(s.primary.refreshes(), 1);

    let stored = s.repository.get(hosted.id).await.unwrap().unwrap();
    assert_eq!(stored.share_url, refreshed.share_url);

    // Now valid: no further refresh.
    let again = s.manager.regenerate_link_if_expired(hosted.id).await.unwrap();
    assert_eq!(again.share_url, refreshed.share_url);
    assert_eq!(s.primary.refreshes(), 1);
}

#[tokio::test]
async fn test_non_expiring_link_is_left_alone() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let same = s.manager.regenerate_link_if_expired(hosted.id).await.unwrap();

    assert_eq!(same, hosted);
    assert_eq!(s.primary.refreshes(), 0);
}

#[tokio::test]
async fn test_expired_link_is_regenerated_on_read() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3).with_link_ttl(Duration::hours(-1)),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let fetched = s.manager.get(hosted.id).await.unwrap();
    assert_ne!(fetched.share_url, hosted.share_url);
    assert!(!fetched.is_url_expired(chrono::Utc::now()));

    let listed = s.manager.list(false).await.unwrap();
    assert_eq!(listed[0].share_url, fetched.share_url);
    s.manager.analytics(hosted.id).await.unwrap();
    assert_eq!(s.primary.refreshes(), 1);
}

#[tokio::test]
async fn test_failed_link_regeneration_returns_stored_record() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3)
            .with_link_ttl(Duration::hours(-1))
            .failing_refreshes(Failure::Transport),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let regenerated = s.manager.regenerate_link_if_expired(hosted.id).await.unwrap();
    assert_eq!(regenerated, hosted);
    assert_eq!(s.manager.get(hosted.id).await.unwrap(), hosted);
    let report = s.manager.analytics(hosted.id).await.unwrap();
    assert_eq!(report.video_id, hosted.id);

    assert_eq!(s.primary.refreshes(), 3);
    assert_eq!(s.repository.get(hosted.id).await.unwrap().unwrap(), hosted);
}

#[tokio::test]
async fn test_processing_upload_settles_on_read() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia).processing_until(HostedVideoStatus::Ready),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();
    assert_eq!(hosted.status, HostedVideoStatus::Processing);

    let settled = s.manager.get(hosted.id).await.unwrap();

    assert_eq!(settled.status, HostedVideoStatus::Ready);
    assert_eq!(
        settled.thumbnail_url.as_deref(),
        Some("https://wistia.example.com/thumb.jpg")
    );
    let stored = s.repository.get(hosted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HostedVideoStatus::Ready);

    s.manager.get(hosted.id).await.unwrap();
    assert_eq!(s.primary.status_checks(), 1);
}

#[tokio::test]
async fn test_provider_processing_failure_marks_record_failed() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::Wistia).processing_until(HostedVideoStatus::Failed),
        ScriptedBackend::new(HostingProvider::S3),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;
    let hosted = s.manager.upload(&video, &metadata(), None).await.unwrap();

    let report = s.manager.analytics(hosted.id).await.unwrap();
    assert_eq!(report.status, HostedVideoStatus::Failed);

    let stored = s.repository.get(hosted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HostedVideoStatus::Failed);
    assert!(stored.error_message.is_some());
}

#[tokio::test]
async fn test_owner_id_outside_key_charset_is_rejected() {
    let s = setup(
        ScriptedBackend::new(HostingProvider::S3),
        ScriptedBackend::new(HostingProvider::Local),
        true,
    );
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(dir.path()).await;

    let err = s
        .manager
        .upload(&video, &UploadMetadata::new("acme/other", "Demo"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, HostingError::InvalidInput(_)));
    assert_eq!(err.error_code(), "INVALID_INPUT");
    assert_eq!(s.primary.uploads() + s.fallback.uploads(), 0);
    assert!(s.repository.list().await.unwrap().is_empty());
}
