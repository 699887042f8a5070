//! Shared key generation for file-based backends.
//!
//! Key format: `videos/{owner_id}/{upload_id}_{filename}`. Owner ids are checked by
//! `HostingManager::upload` against `[A-Za-z0-9_-]`; file names are reduced to the same
//! set plus `.`.

use std::path::Path;
use uuid::Uuid;

fn sanitize_file_name(video: &Path) -> String {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// Generate a storage key for an owner's upload of `video`.
pub fn generate_video_key(owner_id: &str, upload_id: Uuid, video: &Path) -> String {
    format!(
        "videos/{}/{}_{}",
        owner_id,
        upload_id.simple(),
        sanitize_file_name(video)
    )
}

/// Content type from the file extension, for providers that record one.
pub fn content_type_for(video: &Path) -> &'static str {
    match video
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
