//! Metadata store adapters.
//!
//! The [`MetadataStore`] trait is the contract the publisher and the gallery
//! loader share: one-shot reads, live subscriptions, atomic batch writes and
//! a clear-everything operation. Two backends implement it:
//!
//! - [`FirestoreStore`]: Firestore REST API, one `documents:commit` per batch.
//! - [`FileStore`]: a JSON document on disk, replaced by rename per batch.
//!
//! ## Consistency
//!
//! `commit_batch` is all-or-nothing in both backends, so viewers see either
//! the previous set or the new one. `clear_all` and `commit_batch` are
//! separate operations, though: a subscriber polling between them sees an
//! empty collection. Concurrent publishers are not coordinated; the last
//! commit wins.
//!
//! ## Subscriptions
//!
//! Neither backend offers push notifications over plain HTTP, so
//! [`Subscription`] polls `list_once` on an interval and yields a snapshot
//! whenever it differs from the previous one. A caller that already holds a
//! snapshot passes it to `subscribe` and only hears about later changes;
//! otherwise the first successful read is yielded. Poll failures are logged
//! and polling continues.

pub mod file;
pub mod firestore;

pub use file::FileStore;
pub use firestore::{FirestoreSettings, FirestoreStore};

use crate::config::{ConfigError, StoreBackend, StoreConfig};
use crate::image_host::ImageHost;
use crate::types::GalleryRecord;
use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
    #[error("Metadata store write failed: {0}")]
    Write(String),
}

/// A full copy of the collection at one point in time.
pub type Snapshot = Vec<GalleryRecord>;

/// Outcome of [`MetadataStore::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Records removed from the store.
    pub removed: usize,
    /// Image host deletions attempted (records with a delete handle).
    pub deletions_attempted: usize,
    /// Image host deletions that failed. Never fatal.
    pub deletions_failed: usize,
}

/// A document collection of [`GalleryRecord`]s.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Human-readable location, for logs and CLI output.
    fn describe(&self) -> String;

    /// Read the whole collection once.
    async fn list_once(&self) -> Result<Snapshot, StoreError>;

    /// Live snapshots until the subscription is closed. Needs a tokio runtime.
    ///
    /// `seen` is the snapshot the caller already has; it is not yielded again.
    fn subscribe(&self, seen: Option<Snapshot>) -> Subscription;

    /// Delete every record, best-effort deleting hosted images too.
    async fn clear_all(&self) -> Result<ClearReport, StoreError>;

    /// Add all `records` in one atomic write.
    async fn commit_batch(&self, records: &[GalleryRecord]) -> Result<(), StoreError>;

    /// Cheap reachability probe.
    async fn check_access(&self) -> Result<(), StoreError> {
        self.list_once().await.map(|_| ())
    }
}

/// Build the configured store, if any.
///
/// `deleter` is what `clear_all` uses to remove hosted images.
pub fn from_config(
    config: &StoreConfig,
    http: &reqwest::Client,
    deleter: Option<Arc<dyn ImageHost>>,
) -> Result<Option<Arc<dyn MetadataStore>>, ConfigError> {
    let store: Arc<dyn MetadataStore> = match config.backend {
        StoreBackend::None => return Ok(None),
        StoreBackend::Firestore => {
            let settings = FirestoreSettings::from_config(config)?;
            let mut store = FirestoreStore::new(http.clone(), settings);
            if let Some(host) = deleter {
                store = store.with_deleter(host);
            }
            Arc::new(store)
        }
        StoreBackend::File => {
            let mut store = FileStore::new(&config.path, config.poll_interval());
            if let Some(host) = deleter {
                store = store.with_deleter(host);
            }
            Arc::new(store)
        }
    };
    Ok(Some(store))
}

/// Best-effort deletion of hosted images for `records`.
///
/// Returns `(attempted, failed)`. Failures are logged and otherwise ignored.
pub(crate) async fn delete_hosted_images(
    deleter: Option<&Arc<dyn ImageHost>>,
    records: &[GalleryRecord],
) -> (usize, usize) {
    let Some(host) = deleter else {
        return (0, 0);
    };
    let mut attempted = 0;
    let mut failed = 0;
    for handle in records.iter().filter_map(|r| r.delete_handle.as_deref()) {
        attempted += 1;
        if let Err(e) = host.delete(handle).await {
            failed += 1;
            tracing::warn!(handle, error = %e, "image host delete call failed");
        }
    }
    (attempted, failed)
}

/// Buffered snapshots between the poller and the consumer.
const SUBSCRIPTION_BUFFER: usize = 4;

/// Cancellable stream of full collection snapshots.
///
/// Yields `Option<Snapshot>` via [`Subscription::next_snapshot`] or the
/// [`Stream`] impl. [`Subscription::close`] (or dropping it) stops polling.
pub struct Subscription {
    rx: mpsc::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Poll `fetch` every `interval`, yielding snapshots that differ from
    /// the last one yielded (or from `seen`).
    pub fn poll_every<F, Fut>(interval: Duration, seen: Option<Snapshot>, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Snapshot, StoreError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            let mut last = seen;
            loop {
                match fetch().await {
                    Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                        tracing::debug!(records = snapshot.len(), "store snapshot changed");
                        if tx.send(snapshot.clone()).await.is_err() {
                            break;
                        }
                        last = Some(snapshot);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "subscription poll failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { rx, task }
    }

    /// Next changed snapshot; `None` once the poller has stopped.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Stop polling. Equivalent to dropping the subscription.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.rx.poll_recv(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockHost;
    use futures::StreamExt;
    use std::sync::Mutex;

    #[tokio::test]
    async fn subscription_yields_only_changes() {
        let script = Arc::new(Mutex::new(vec![
            Ok(vec![GalleryRecord::new("a", "x")]),
            Ok(vec![GalleryRecord::new("a", "x")]),
            Err(StoreError::Unavailable("blip".into())),
            Ok(vec![GalleryRecord::new("b", "y")]),
        ]));
        let source = script.clone();
        let mut sub = Subscription::poll_every(Duration::from_millis(1), None, move || {
            let source = source.clone();
            async move {
                let mut script = source.lock().unwrap();
                if script.is_empty() {
                    Ok(vec![GalleryRecord::new("b", "y")])
                } else {
                    script.remove(0)
                }
            }
        });

        let first = sub.next_snapshot().await.unwrap();
        assert_eq!(first[0].url, "a");
        let second = sub.next().await.unwrap();
        assert_eq!(second[0].url, "b");
        sub.close();
    }

    #[tokio::test]
    async fn empty_first_snapshot_is_still_delivered() {
        let mut sub =
            Subscription::poll_every(Duration::from_millis(1), None, || async { Ok(Vec::new()) });
        assert_eq!(sub.next_snapshot().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn seen_snapshot_is_not_repeated() {
        let polls = Arc::new(Mutex::new(0usize));
        let counter = polls.clone();
        let mut sub = Subscription::poll_every(Duration::from_millis(1), Some(Vec::new()), move || {
            let counter = counter.clone();
            async move {
                let mut n = counter.lock().unwrap();
                *n += 1;
                if *n < 5 {
                    Ok(Vec::new())
                } else {
                    Ok(vec![GalleryRecord::new("late", "x")])
                }
            }
        });

        let next = sub.next_snapshot().await.unwrap();
        assert_eq!(next[0].url, "late");
        assert!(*polls.lock().unwrap() >= 5);
    }

    #[tokio::test]
    async fn delete_hosted_images_counts_failures() {
        let host = MockHost::new();
        host.fail_delete("bad");
        let host: Arc<dyn ImageHost> = Arc::new(host);
        let mut with_handle = GalleryRecord::new("a", "x");
        with_handle.delete_handle = Some("good".into());
        let mut failing = GalleryRecord::new("b", "x");
        failing.delete_handle = Some("bad".into());
        let records = vec![with_handle, failing, GalleryRecord::new("c", "x")];

        assert_eq!(delete_hosted_images(Some(&host), &records).await, (2, 1));
        assert_eq!(delete_hosted_images(None, &records).await, (0, 0));
    }

    #[test]
    fn from_config_none_backend() {
        let http = reqwest::Client::new();
        let store = from_config(&StoreConfig::default(), &http, None).unwrap();
        assert!(store.is_none());
    }

    #[test]
    fn from_config_firestore_requires_project() {
        let http = reqwest::Client::new();
        let config = StoreConfig {
            backend: StoreBackend::Firestore,
            ..StoreConfig::default()
        };
        assert!(from_config(&config, &http, None).is_err());
    }
}
