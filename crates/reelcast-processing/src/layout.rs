//! On-disk artifact layout.
//!
//! ```text
//! {root}/composed_videos/{owner_id}/video_{timestamp}_{run8}.{ext}
//! {root}/composed_videos/{owner_id}/video_{timestamp}_{run8}_{quality}.{ext}
//! {root}/thumbnails/{owner_id}/{video_base_name}_thumb.jpg
//! {root}/temp/...
//! ```

use chrono::{DateTime, Utc};
use reelcast_core::constants::{
    COMPOSED_VIDEOS_DIR, RECORDINGS_DIR, TEMP_DIR, THUMBNAILS_DIR, VOICEOVERS_DIR,
};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every shared directory. Safe to call repeatedly and concurrently.
    pub async fn ensure_directories(&self) -> io::Result<()> {
        for dir in [
            RECORDINGS_DIR,
            VOICEOVERS_DIR,
            COMPOSED_VIDEOS_DIR,
            THUMBNAILS_DIR,
            TEMP_DIR,
        ] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        tracing::debug!(root = %self.root.display(), "Storage directories ready");
        Ok(())
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.root.join(RECORDINGS_DIR)
    }

    pub fn voiceovers_dir(&self) -> PathBuf {
        self.root.join(VOICEOVERS_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    pub fn composed_dir(&self, owner_id: &str) -> PathBuf {
        self.root.join(COMPOSED_VIDEOS_DIR).join(owner_id)
    }

    pub fn thumbnails_dir(&self, owner_id: &str) -> PathBuf {
        self.root.join(THUMBNAILS_DIR).join(owner_id)
    }

    /// Master path, unique per run even when two runs start in the same millisecond.
    pub fn master_path(
        &self,
        owner_id: &str,
        run_id: Uuid,
        extension: &str,
        now: DateTime<Utc>,
    ) -> PathBuf {
        let run = run_id.simple().to_string();
        let name = format!(
            "video_{}_{}.{}",
            now.format("%Y%m%d%H%M%S%3f"),
            &run[..8],
            extension
        );
        self.composed_dir(owner_id).join(name)
    }

    pub fn thumbnail_path(&self, owner_id: &str, video_path: &Path) -> PathBuf {
        self.thumbnails_dir(owner_id)
            .join(format!("{}_thumb.jpg", base_name(video_path)))
    }
}

pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// `{dir}/{base}_{label}.{ext}` next to the master.
pub fn rendition_path(master: &Path, label: &str) -> PathBuf {
    let extension = master
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    let file_name = format!("{}_{}.{}", base_name(master), label, extension);
    match master.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
