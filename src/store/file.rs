//! JSON-file backend.
//!
//! The collection is a JSON array of records in one file. A missing file is
//! an empty collection. Every write goes to a sibling temp file which is then
//! renamed over the target, so readers never see a half-written array.

use super::{ClearReport, MetadataStore, Snapshot, StoreError, Subscription, delete_hosted_images};
use crate::image_host::ImageHost;
use crate::types::{GalleryRecord, RawEntry, normalize_entries};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// [`MetadataStore`] over a local JSON file.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    poll_interval: Duration,
    deleter: Option<Arc<dyn ImageHost>>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            deleter: None,
        }
    }

    pub fn with_deleter(mut self, deleter: Arc<dyn ImageHost>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Snapshot, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<RawEntry> = serde_json::from_str(&text).map_err(|e| {
            StoreError::Unavailable(format!("{}: {e}", self.path.display()))
        })?;
        Ok(normalize_entries(entries))
    }

    async fn write(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        let write_err = |e: &dyn std::fmt::Display| {
            StoreError::Write(format!("{}: {e}", self.path.display()))
        };
        let json = serde_json::to_string_pretty(records).map_err(|e| write_err(&e))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_err(&e))?;
        }
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| write_err(&e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| write_err(&e))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl MetadataStore for FileStore {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn list_once(&self) -> Result<Snapshot, StoreError> {
        let mut records = self.read().await?;
        // Newest first, matching the Firestore listing.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn subscribe(&self, seen: Option<Snapshot>) -> Subscription {
        let store = self.clone();
        Subscription::poll_every(self.poll_interval, seen, move || {
            let store = store.clone();
            async move { store.list_once().await }
        })
    }

    async fn clear_all(&self) -> Result<ClearReport, StoreError> {
        let records = self.read().await?;
        if records.is_empty() {
            return Ok(ClearReport::default());
        }
        let (deletions_attempted, deletions_failed) =
            delete_hosted_images(self.deleter.as_ref(), &records).await;
        self.write(&[]).await?;
        tracing::info!(removed = records.len(), path = %self.path.display(), "cleared collection");
        Ok(ClearReport {
            removed: records.len(),
            deletions_attempted,
            deletions_failed,
        })
    }

    async fn commit_batch(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        let mut all = self.read().await?;
        all.extend_from_slice(records);
        self.write(&all).await
    }
}
