//! Shared test utilities: image fixtures and in-memory stand-ins for the
//! image host and the metadata store.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let host = Arc::new(MockHost::new());
//! host.fail_upload_at(1);
//! let store = Arc::new(MockStore::with_records(vec![]));
//!
//! // ... run a publish ...
//!
//! assert_eq!(host.uploaded(), vec!["001-a.png"]);
//! assert_eq!(store.calls(), vec!["clear_all"]);
//! ```

use crate::image_host::{ImageHost, UploadError, UploadedImage};
use crate::staging::StagedImage;
use crate::store::{ClearReport, MetadataStore, Snapshot, StoreError, Subscription};
use crate::types::GalleryRecord;
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =========================================================================
// Image fixtures
// =========================================================================

/// A solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

// =========================================================================
// Mock image host
// =========================================================================

/// Records uploads and deletions; can be told to fail.
#[derive(Default)]
pub struct MockHost {
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_upload_at: Mutex<Option<usize>>,
    failing_deletes: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the upload at zero-based `index` (counting calls) fail.
    pub fn fail_upload_at(&self, index: usize) {
        *self.fail_upload_at.lock().unwrap() = Some(index);
    }

    pub fn fail_delete(&self, handle: &str) {
        self.failing_deletes.lock().unwrap().push(handle.to_string());
    }

    /// File names successfully uploaded, in call order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Delete handles successfully invoked.
    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for MockHost {
    async fn upload(&self, image: &StagedImage) -> Result<UploadedImage, UploadError> {
        let mut uploads = self.uploads.lock().unwrap();
        if *self.fail_upload_at.lock().unwrap() == Some(uploads.len()) {
            return Err(UploadError::Status {
                status: 500,
                body: "mock failure".into(),
            });
        }
        uploads.push(image.file_name.clone());
        Ok(UploadedImage {
            url: format!("https://img.test/{}", image.file_name),
            delete_handle: Some(format!("https://img.test/delete/{}", image.file_name)),
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), UploadError> {
        if self.failing_deletes.lock().unwrap().iter().any(|h| h == handle) {
            return Err(UploadError::Status {
                status: 404,
                body: String::new(),
            });
        }
        self.deletes.lock().unwrap().push(handle.to_string());
        Ok(())
    }
}

// =========================================================================
// Mock metadata store
// =========================================================================

#[derive(Default)]
struct StoreState {
    records: Vec<GalleryRecord>,
    unavailable: bool,
    fail_commit: bool,
    fail_clear: bool,
    calls: Vec<String>,
}

/// In-memory [`MetadataStore`] with scriptable failures.
///
/// `calls()` lists trait calls made by the code under test; polling done by
/// a subscription is not recorded.
#[derive(Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn with_records(records: Vec<GalleryRecord>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().records = records;
        store
    }

    /// Every operation fails with `Unavailable`.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().unavailable = true;
        store
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn fail_clear(&self) {
        self.state.lock().unwrap().fail_clear = true;
    }

    pub fn records(&self) -> Vec<GalleryRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn enter(&self, call: &str) -> Result<std::sync::MutexGuard<'_, StoreState>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if state.unavailable {
            return Err(StoreError::Unavailable("mock store offline".into()));
        }
        Ok(state)
    }
}

fn snapshot_of(state: &Mutex<StoreState>) -> Result<Snapshot, StoreError> {
    let state = state.lock().unwrap();
    if state.unavailable {
        return Err(StoreError::Unavailable("mock store offline".into()));
    }
    Ok(state.records.clone())
}

#[async_trait]
impl MetadataStore for MockStore {
    fn describe(&self) -> String {
        "mock store".to_string()
    }

    async fn list_once(&self) -> Result<Snapshot, StoreError> {
        Ok(self.enter("list_once")?.records.clone())
    }

    fn subscribe(&self, seen: Option<Snapshot>) -> Subscription {
        self.state.lock().unwrap().calls.push("subscribe".to_string());
        let state = self.state.clone();
        Subscription::poll_every(Duration::from_millis(5), seen, move || {
            let result = snapshot_of(&state);
            async move { result }
        })
    }

    async fn clear_all(&self) -> Result<ClearReport, StoreError> {
        let mut state = self.enter("clear_all")?;
        if state.fail_clear {
            return Err(StoreError::Write("mock clear failure".into()));
        }
        let removed = state.records.len();
        state.records.clear();
        Ok(ClearReport {
            removed,
            ..ClearReport::default()
        })
    }

    async fn commit_batch(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        let mut state = self.enter("commit_batch")?;
        if state.fail_commit {
            return Err(StoreError::Write("mock commit failure".into()));
        }
        state.records.extend_from_slice(records);
        Ok(())
    }
}
