//! Publish a staged set: clear, upload, commit.
//!
//! ```text
//! staged images ──► clear_all (best effort)
//!               ──► upload #0, #1, … #N-1   (first failure aborts)
//!               ──► commit_batch(N records)  (one atomic write)
//! ```
//!
//! Records are committed only after every upload succeeded, so viewers see
//! either the previous set or the complete new one. Images uploaded before a
//! failure stay on the host unreferenced; nothing is rolled back or retried.
//!
//! With no image host available ([`UploadTarget::LocalExport`]) publishing
//! degrades to returning the export entries for the staged set.

use crate::config::{ConfigError, ImageHostConfig, non_empty};
use crate::image_host::{HostEndpoint, ImageHost, ImgbbClient, UploadError};
use crate::staging::{ExportEntry, StagedImage, export_entries};
use crate::store::{ClearReport, MetadataStore, StoreError};
use crate::types::{GalleryRecord, UploadMode};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Nothing staged to publish")]
    NothingStaged,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Upload of image {index} ({file_name}) failed: {source}")]
    Upload {
        index: usize,
        file_name: String,
        #[source]
        source: UploadError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where images go, resolved from an [`UploadMode`] and the host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    Host(HostEndpoint),
    LocalExport,
}

impl UploadTarget {
    /// `auto` prefers the server proxy, then a direct key, then local export.
    /// `server` and `direct` fail when their setting is missing.
    pub fn resolve(mode: UploadMode, host: &ImageHostConfig) -> Result<Self, ConfigError> {
        let proxy = non_empty(&host.server_url).map(|url| HostEndpoint::ServerProxy {
            server_url: url.to_string(),
        });
        let direct = non_empty(&host.api_key).map(|key| HostEndpoint::Direct {
            api_base: host.api_base.clone(),
            api_key: key.to_string(),
        });
        match mode {
            UploadMode::Auto => Ok(proxy
                .or(direct)
                .map(UploadTarget::Host)
                .unwrap_or(UploadTarget::LocalExport)),
            UploadMode::Server => proxy
                .map(UploadTarget::Host)
                .ok_or(ConfigError::NoUploadMethod(mode)),
            UploadMode::Direct => direct
                .map(UploadTarget::Host)
                .ok_or(ConfigError::NoUploadMethod(mode)),
            UploadMode::Local => Ok(UploadTarget::LocalExport),
        }
    }
}

/// The image host client for a target; `None` for local export.
///
/// Shared by the publisher (uploads) and the store (deletes during clear).
pub fn host_for(target: &UploadTarget, http: &reqwest::Client) -> Option<Arc<dyn ImageHost>> {
    match target {
        UploadTarget::Host(endpoint) => Some(Arc::new(ImgbbClient::new(
            http.clone(),
            endpoint.clone(),
        ))),
        UploadTarget::LocalExport => None,
    }
}

/// What a publish produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Records committed to the store, in staged order.
    Published { records: Vec<GalleryRecord> },
    /// No image host: the staged set, serialized instead.
    Exported(Vec<ExportEntry>),
}

/// Progress notifications for a running publish.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    Cleared(ClearReport),
    ClearFailed(String),
    Uploading {
        index: usize,
        total: usize,
        file_name: String,
    },
    Uploaded {
        index: usize,
        total: usize,
        url: String,
    },
    Committed {
        records: usize,
    },
}

pub struct Publisher {
    host: Option<Arc<dyn ImageHost>>,
    store: Option<Arc<dyn MetadataStore>>,
    events: Option<UnboundedSender<PublishEvent>>,
}

impl Publisher {
    /// `host: None` means local export only.
    pub fn new(host: Option<Arc<dyn ImageHost>>, store: Option<Arc<dyn MetadataStore>>) -> Self {
        Self {
            host,
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<PublishEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PublishEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    pub async fn publish(&self, staged: &[StagedImage]) -> Result<PublishOutcome, PublishError> {
        if staged.is_empty() {
            return Err(PublishError::NothingStaged);
        }
        let Some(host) = &self.host else {
            tracing::info!(items = staged.len(), "no image host configured, exporting staged set");
            return Ok(PublishOutcome::Exported(export_entries(staged)));
        };
        let Some(store) = &self.store else {
            return Err(StoreError::Unavailable("no metadata store configured".into()).into());
        };

        match store.clear_all().await {
            Ok(report) => self.emit(PublishEvent::Cleared(report)),
            Err(e) => {
                tracing::warn!(error = %e, "clearing previous gallery failed, publishing anyway");
                self.emit(PublishEvent::ClearFailed(e.to_string()));
            }
        }

        let total = staged.len();
        let mut uploaded = Vec::with_capacity(total);
        for (index, image) in staged.iter().enumerate() {
            self.emit(PublishEvent::Uploading {
                index,
                total,
                file_name: image.file_name.clone(),
            });
            let result = host
                .upload(image)
                .await
                .map_err(|source| PublishError::Upload {
                    index,
                    file_name: image.file_name.clone(),
                    source,
                })?;
            self.emit(PublishEvent::Uploaded {
                index,
                total,
                url: result.url.clone(),
            });
            uploaded.push(result);
        }

        let created_at = chrono::Utc::now();
        let records: Vec<GalleryRecord> = staged
            .iter()
            .zip(uploaded)
            .enumerate()
            .map(|(index, (image, hosted))| GalleryRecord {
                url: hosted.url,
                delete_handle: hosted.delete_handle,
                category: image.category.clone(),
                created_at: Some(created_at),
                layout: image.layout,
                rotation: 0,
                title: image.title.clone(),
                order: Some(index as i64),
                bare: false,
            })
            .collect();

        store.commit_batch(&records).await?;
        tracing::info!(records = records.len(), store = %store.describe(), "published gallery");
        self.emit(PublishEvent::Committed {
            records: records.len(),
        });
        Ok(PublishOutcome::Published { records })
    }
}
