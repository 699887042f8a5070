//! Hosted-video record persistence.
//!
//! The in-memory repository backs tests and long-running services; the JSON-file
//! repository lets the CLI keep records between invocations.

use async_trait::async_trait;
use reelcast_core::models::HostedVideo;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::HostingResult;

#[async_trait]
pub trait HostedVideoRepository: Send + Sync {
    /// Insert or replace the record with the same id.
    async fn save(&self, video: &HostedVideo) -> HostingResult<()>;

    async fn get(&self, id: Uuid) -> HostingResult<Option<HostedVideo>>;

    /// All records, soft-deleted ones included, oldest first.
    async fn list(&self) -> HostingResult<Vec<HostedVideo>>;

    async fn list_active(&self) -> HostingResult<Vec<HostedVideo>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|v| v.is_active)
            .collect())
    }
}

fn sorted(records: impl Iterator<Item = HostedVideo>) -> Vec<HostedVideo> {
    let mut records: Vec<HostedVideo> = records.collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    records
}

#[derive(Default)]
pub struct InMemoryHostedVideoRepository {
    records: RwLock<HashMap<Uuid, HostedVideo>>,
}

impl InMemoryHostedVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HostedVideoRepository for InMemoryHostedVideoRepository {
    async fn save(&self, video: &HostedVideo) -> HostingResult<()> {
        self.records.write().await.insert(video.id, video.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HostingResult<Option<HostedVideo>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self) -> HostingResult<Vec<HostedVideo>> {
        Ok(sorted(self.records.read().await.values().cloned()))
    }
}

/// Records stored as one JSON array, rewritten through a temp file on every save.
pub struct JsonFileHostedVideoRepository {
    path: PathBuf,
    records: Mutex<HashMap<Uuid, HostedVideo>>,
}

impl JsonFileHostedVideoRepository {
    /// Open the catalog at `path`, starting empty if the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> HostingResult<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(data) if data.is_empty() => HashMap::new(),
            Ok(data) => {
                let list: Vec<HostedVideo> = serde_json::from_slice(&data).map_err(io::Error::from)?;
                list.into_iter().map(|v| (v.id, v)).collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), records = records.len(), "Hosting catalog loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &HashMap<Uuid, HostedVideo>) -> HostingResult<()> {
        let list = sorted(records.values().cloned());
        let data = serde_json::to_vec_pretty(&list).map_err(io::Error::from)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HostedVideoRepository for JsonFileHostedVideoRepository {
    async fn save(&self, video: &HostedVideo) -> HostingResult<()> {
        let mut records = self.records.lock().await;
        records.insert(video.id, video.clone());
        self.persist(&records).await
    }

    async fn get(&self, id: Uuid) -> HostingResult<Option<HostedVideo>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> HostingResult<Vec<HostedVideo>> {
        Ok(sorted(self.records.lock().await.values().cloned()))
    }
}
