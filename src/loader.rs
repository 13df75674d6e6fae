//! Choose a gallery source and render it.
//!
//! Sources are tried in a fixed order:
//!
//! 1. **Forced local** ([`LoadMode::Local`]): only the snapshot file. A
//!    failure here is final; the store is never contacted.
//! 2. **Store**: one `list_once`. When the store answers, a live
//!    [`Subscription`] is opened even if the answer is empty, so a gallery
//!    published later still shows up. A non-empty answer is rendered and
//!    loading stops.
//! 3. **Fallback**: the snapshot file. If that fails too, and the store was
//!    not reachable either, loading fails.
//!
//! An empty store with a readable snapshot renders the snapshot and still
//! returns the store subscription; the caller replaces the view on every
//! snapshot it yields. The subscription starts from the listing already
//! used here, so it only yields once the store actually changes.

use crate::render::{GalleryView, RenderOptions, render};
use crate::snapshot::{SnapshotError, SnapshotSource};
use crate::store::{MetadataStore, Subscription};
use crate::types::{GalleryRecord, LoadMode};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot load local gallery {snapshot}: {error}")]
    LocalSnapshot {
        snapshot: String,
        #[source]
        error: SnapshotError,
    },
    #[error("No gallery source available: {0}")]
    AllSourcesFailed(SnapshotError),
}

/// Which source produced the initial view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GallerySource {
    ForcedLocal,
    Store,
    Fallback,
}

/// Result of [`GalleryLoader::load`].
#[derive(Debug)]
pub struct LoadedGallery {
    pub source: GallerySource,
    pub view: GalleryView,
    /// Live updates from the store, when it was reachable.
    pub subscription: Option<Subscription>,
}

pub struct GalleryLoader {
    store: Option<Arc<dyn MetadataStore>>,
    snapshot: SnapshotSource,
    http: reqwest::Client,
    options: RenderOptions,
}

impl GalleryLoader {
    pub fn new(snapshot: SnapshotSource, http: reqwest::Client) -> Self {
        Self {
            store: None,
            snapshot,
            http,
            options: RenderOptions::default(),
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn MetadataStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Render records with this loader's options.
    pub fn render(&self, records: &[GalleryRecord]) -> GalleryView {
        render(records, &self.options)
    }

    pub async fn load(&self, mode: LoadMode) -> Result<LoadedGallery, LoadError> {
        if mode == LoadMode::Local {
            return match self.snapshot.read(&self.http).await {
                Ok(records) => {
                    tracing::info!(snapshot = %self.snapshot, items = records.len(), "loaded gallery in forced local mode");
                    Ok(LoadedGallery {
                        source: GallerySource::ForcedLocal,
                        view: self.render(&records),
                        subscription: None,
                    })
                }
                Err(error) => {
                    tracing::warn!(snapshot = %self.snapshot, %error, "forced local gallery failed");
                    Err(LoadError::LocalSnapshot {
                        snapshot: self.snapshot.to_string(),
                        error,
                    })
                }
            };
        }

        let mut subscription = None;
        if let Some(store) = &self.store {
            match store.list_once().await {
                Ok(records) => {
                    subscription = Some(store.subscribe(Some(records.clone())));
                    if !records.is_empty() {
                        tracing::info!(store = %store.describe(), items = records.len(), "loaded gallery from store");
                        return Ok(LoadedGallery {
                            source: GallerySource::Store,
                            view: self.render(&records),
                            subscription,
                        });
                    }
                    tracing::info!(store = %store.describe(), "store is empty, trying snapshot");
                }
                Err(error) => {
                    tracing::warn!(store = %store.describe(), %error, "store unavailable, trying snapshot");
                }
            }
        }

        match self.snapshot.read(&self.http).await {
            Ok(records) => {
                tracing::info!(snapshot = %self.snapshot, items = records.len(), "loaded gallery from fallback snapshot");
                Ok(LoadedGallery {
                    source: GallerySource::Fallback,
                    view: self.render(&records),
                    subscription,
                })
            }
            Err(error) if subscription.is_some() => {
                tracing::warn!(snapshot = %self.snapshot, %error, "fallback snapshot unreadable, showing empty gallery");
                Ok(LoadedGallery {
                    source: GallerySource::Store,
                    view: self.render(&[]),
                    subscription,
                })
            }
            Err(error) => {
                tracing::error!(snapshot = %self.snapshot, %error, "no gallery source available");
                Err(LoadError::AllSourcesFailed(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockStore;
    use crate::types::DEFAULT_CATEGORY;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_snapshot(dir: &Path, json: &str) -> SnapshotSource {
        let path = dir.join("galeria.json");
        std::fs::write(&path, json).unwrap();
        SnapshotSource::Path(path)
    }

    fn loader(snapshot: SnapshotSource, store: Option<Arc<MockStore>>) -> GalleryLoader {
        GalleryLoader::new(snapshot, reqwest::Client::new())
            .with_store(store.map(|s| s as Arc<dyn MetadataStore>))
    }

    #[tokio::test]
    async fn forced_local_never_touches_store() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"["a.jpg"]"#);
        let store = Arc::new(MockStore::with_records(vec![GalleryRecord::new("s.jpg", "x")]));

        let loaded = loader(snapshot, Some(store.clone()))
            .load(LoadMode::Local)
            .await
            .unwrap();
        assert_eq!(loaded.source, GallerySource::ForcedLocal);
        assert_eq!(loaded.view.items[0].url, "a.jpg");
        assert!(loaded.subscription.is_none());
        assert_eq!(store.calls(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn forced_local_failure_does_not_fall_through() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotSource::Path(dir.path().join("missing.json"));
        let store = Arc::new(MockStore::with_records(vec![GalleryRecord::new("s.jpg", "x")]));

        let err = loader(snapshot, Some(store.clone()))
            .load(LoadMode::Local)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::LocalSnapshot { .. }));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn store_records_win_and_subscribe() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"["fallback.jpg"]"#);
        let mut a = GalleryRecord::new("a.jpg", "wedding");
        a.order = Some(1);
        let mut b = GalleryRecord::new("b.jpg", "portrait");
        b.order = Some(0);
        let store = Arc::new(MockStore::with_records(vec![a, b]));

        let mut loaded = loader(snapshot, Some(store.clone()))
            .load(LoadMode::Auto)
            .await
            .unwrap();
        assert_eq!(loaded.source, GallerySource::Store);
        let urls: Vec<&str> = loaded.view.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["b.jpg", "a.jpg"]);

        store
            .commit_batch(&[GalleryRecord::new("c.jpg", "landscape")])
            .await
            .unwrap();
        let live = loaded.subscription.as_mut().unwrap().next_snapshot().await.unwrap();
        assert_eq!(live.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_store_falls_back_to_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"["a.jpg", "b.jpg"]"#);
        let store = Arc::new(MockStore::unavailable());

        let loaded = loader(snapshot, Some(store)).load(LoadMode::Auto).await.unwrap();
        assert_eq!(loaded.source, GallerySource::Fallback);
        assert!(loaded.subscription.is_none());
        assert_eq!(loaded.view.items.len(), 2);
        let urls: Vec<&str> = loaded.view.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["a.jpg", "b.jpg"]);
        assert!(loaded.view.items.iter().all(|i| i.category == DEFAULT_CATEGORY));
        assert_eq!(loaded.view.filters, vec!["all"]);
    }

    #[tokio::test]
    async fn empty_store_uses_snapshot_but_keeps_subscription() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"["a.jpg"]"#);
        let store = Arc::new(MockStore::with_records(Vec::new()));

        let loaded = loader(snapshot, Some(store)).load(LoadMode::Auto).await.unwrap();
        assert_eq!(loaded.source, GallerySource::Fallback);
        assert_eq!(loaded.view.items.len(), 1);
        assert!(loaded.subscription.is_some());
    }

    #[tokio::test]
    async fn fallback_view_survives_until_store_changes() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"["a.jpg", "b.jpg"]"#);
        let store = Arc::new(MockStore::with_records(Vec::new()));

        let mut loaded = loader(snapshot, Some(store.clone()))
            .load(LoadMode::Auto)
            .await
            .unwrap();
        assert_eq!(loaded.source, GallerySource::Fallback);
        let subscription = loaded.subscription.as_mut().unwrap();

        let quiet = tokio::time::timeout(Duration::from_millis(50), subscription.next_snapshot()).await;
        assert!(quiet.is_err(), "nothing changed, nothing should be yielded");

        store
            .commit_batch(&[GalleryRecord::new("new.jpg", "portrait")])
            .await
            .unwrap();
        let live = tokio::time::timeout(Duration::from_secs(5), subscription.next_snapshot())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live[0].url, "new.jpg");
    }

    #[tokio::test]
    async fn empty_store_and_missing_snapshot_is_empty_gallery() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotSource::Path(dir.path().join("missing.json"));
        let store = Arc::new(MockStore::with_records(Vec::new()));

        let loaded = loader(snapshot, Some(store)).load(LoadMode::Auto).await.unwrap();
        assert_eq!(loaded.source, GallerySource::Store);
        assert!(loaded.view.is_empty());
        assert!(loaded.subscription.is_some());
    }

    #[tokio::test]
    async fn everything_failing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotSource::Path(dir.path().join("missing.json"));
        let store = Arc::new(MockStore::unavailable());

        let err = loader(snapshot, Some(store)).load(LoadMode::Auto).await.unwrap_err();
        assert!(matches!(err, LoadError::AllSourcesFailed(_)));
    }

    #[tokio::test]
    async fn no_store_configured_reads_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), r#"[{"url": "a.jpg", "category": "landscape"}]"#);
        let loaded = loader(snapshot, None).load(LoadMode::Auto).await.unwrap();
        assert_eq!(loaded.source, GallerySource::Fallback);
        assert_eq!(loaded.view.filters, vec!["all", "landscape"]);
    }
}
