//! Staging area for images awaiting publication.
//!
//! A [`StagingSession`] is the operator's working set: files picked for the
//! next publish, in the order they will appear, each with a category. Nothing
//! here touches the network. The session either feeds the
//! [`Publisher`](crate::publish::Publisher) or is exported as a portable JSON
//! file (see [`StagingSession::write_export`]) that the gallery loader can use
//! as its snapshot.
//!
//! Order is positional: an item's index in the session *is* its publish
//! order. Drag-and-drop maps onto [`StagingSession::move_before`]; a UI that
//! tracks order itself hands the final sequence of ids to
//! [`StagingSession::apply_order`] right before publishing.

use crate::naming;
use crate::types::{DEFAULT_CATEGORY, Layout, category_or_default};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not an image file: {0}")]
    NotAnImage(PathBuf),
    #[error("No staged image with id '{0}'")]
    UnknownId(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories offered by the dashboard picker. Categories are free text; this
/// is only the suggested set.
pub const SUGGESTED_CATEGORIES: &[&str] = &[
    DEFAULT_CATEGORY,
    "portrait",
    "wedding",
    "landscape",
    "abstract",
    "other",
];

/// Extensions accepted when staging from disk.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "tif", "tiff", "avif"];

/// Aspect ratio at or above which an image is laid out wide.
const WIDE_ASPECT: f64 = 1.5;
/// Aspect ratio at or below which an image is laid out tall.
const TALL_ASPECT: f64 = 0.7;

/// An operator-selected image, not yet published.
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Session-unique id (`{session}_{seq}`).
    pub id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, hex.
    pub content_hash: String,
    pub mime: String,
    /// `data:` URL of the image, used for previews and exports.
    pub preview: String,
    pub category: String,
    pub title: Option<String>,
    pub layout: Layout,
    /// `(width, height)` when the bytes decode as a known format.
    pub dimensions: Option<(u32, u32)>,
}

/// One exported staging entry. Carries a preview reference, not the raw file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub order: usize,
    pub category: String,
    pub preview: String,
}

/// In-memory, ordered set of staged images.
#[derive(Debug)]
pub struct StagingSession {
    session: String,
    next_seq: u64,
    items: Vec<StagedImage>,
}

impl Default for StagingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingSession {
    /// New session; ids are prefixed with the current time in milliseconds.
    pub fn new() -> Self {
        Self::with_session_id(chrono::Utc::now().timestamp_millis().to_string())
    }

    pub fn with_session_id(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            next_seq: 0,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[StagedImage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StagedImage> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Stage raw bytes under a file name.
    ///
    /// Returns `None` when identical content is already staged.
    pub fn stage_bytes(&mut self, file_name: &str, bytes: Vec<u8>) -> Option<&StagedImage> {
        let content_hash = hex_digest(&bytes);
        if self.items.iter().any(|i| i.content_hash == content_hash) {
            tracing::warn!(file = file_name, "skipping duplicate staged image");
            return None;
        }

        let format = image::guess_format(&bytes).ok();
        let mime = format
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| mime_from_extension(file_name).to_string());
        let dimensions = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        let preview = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));

        let id = format!("{}_{}", self.session, self.next_seq);
        self.next_seq += 1;

        self.items.push(StagedImage {
            id,
            file_name: file_name.to_string(),
            bytes,
            content_hash,
            mime,
            preview,
            category: DEFAULT_CATEGORY.to_string(),
            title: naming::title_from_file_name(file_name),
            layout: layout_for(dimensions),
            dimensions,
        });
        self.items.last()
    }

    /// Read and stage one file.
    pub async fn stage_file(&mut self, path: &Path) -> Result<Option<&StagedImage>, StagingError> {
        if !is_image_path(path) {
            return Err(StagingError::NotAnImage(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StagingError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.stage_bytes(&file_name, bytes))
    }

    /// Stage files in the given order. Returns how many were added.
    pub async fn stage_files(&mut self, paths: &[PathBuf]) -> Result<usize, StagingError> {
        let mut added = 0;
        for path in paths {
            if self.stage_file(path).await?.is_some() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Stage every image under `dir`, ordered by `NNN-` prefix then name.
    pub async fn stage_dir(&mut self, dir: &Path) -> Result<usize, StagingError> {
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_path(e.path()))
            .map(|e| e.into_path())
            .collect();
        paths.sort_by(|a, b| naming::compare_file_names(&file_name_of(a), &file_name_of(b)));
        self.stage_files(&paths).await
    }

    /// Stage a file or a directory, giving every newly added image `category`.
    pub async fn stage_path(
        &mut self,
        path: &Path,
        category: Option<&str>,
    ) -> Result<usize, StagingError> {
        let before = self.items.len();
        let added = if path.is_dir() {
            self.stage_dir(path).await?
        } else {
            usize::from(self.stage_file(path).await?.is_some())
        };
        if let Some(category) = category {
            for item in &mut self.items[before..] {
                item.category = category_or_default(category);
            }
        }
        Ok(added)
    }

    /// Drag-and-drop: move `id` in front of `before`, or to the end if `None`.
    pub fn move_before(&mut self, id: &str, before: Option<&str>) -> Result<(), StagingError> {
        if before == Some(id) {
            return Ok(());
        }
        if let Some(target) = before
            && self.position(target).is_none()
        {
            return Err(StagingError::UnknownId(target.to_string()));
        }
        let from = self
            .position(id)
            .ok_or_else(|| StagingError::UnknownId(id.to_string()))?;
        let item = self.items.remove(from);
        let to = match before {
            Some(target) => self.position(target).unwrap_or(self.items.len()),
            None => self.items.len(),
        };
        self.items.insert(to, item);
        Ok(())
    }

    /// Adopt an externally captured order. Listed ids come first in the given
    /// order; unlisted items follow in their current relative order.
    pub fn apply_order(&mut self, ids: &[&str]) -> Result<(), StagingError> {
        if let Some(unknown) = ids.iter().find(|id| self.position(id).is_none()) {
            return Err(StagingError::UnknownId(unknown.to_string()));
        }
        let mut remaining = std::mem::take(&mut self.items);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(pos) = remaining.iter().position(|i| i.id == *id) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.append(&mut remaining);
        self.items = ordered;
        Ok(())
    }

    pub fn set_category(&mut self, id: &str, category: &str) -> Result<(), StagingError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StagingError::UnknownId(id.to_string()))?;
        item.category = category_or_default(category);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<StagedImage, StagingError> {
        let pos = self
            .position(id)
            .ok_or_else(|| StagingError::UnknownId(id.to_string()))?;
        Ok(self.items.remove(pos))
    }

    /// Drop everything (end of session, or after a successful publish).
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The first `max` items, or all of them.
    pub fn selection(&self, max: Option<usize>) -> &[StagedImage] {
        match max {
            Some(n) if n > 0 && n < self.items.len() => &self.items[..n],
            _ => &self.items,
        }
    }

    /// Serialize the current selection for export.
    pub fn export(&self, max: Option<usize>) -> Vec<ExportEntry> {
        export_entries(self.selection(max))
    }

    /// Write the export file. Returns the number of entries written.
    pub async fn write_export(&self, path: &Path, max: Option<usize>) -> Result<usize, StagingError> {
        let entries = self.export(max);
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| StagingError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(entries.len())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }
}

/// Export entries for a slice of staged images, order taken from position.
pub fn export_entries(items: &[StagedImage]) -> Vec<ExportEntry> {
    items
        .iter()
        .enumerate()
        .map(|(order, item)| ExportEntry {
            order,
            category: category_or_default(&item.category),
            preview: item.preview.clone(),
        })
        .collect()
}

/// Split a CLI staging input `path=category` into its parts.
///
/// The category is whatever follows the last `=`, unless it looks like part
/// of a path (contains a separator) or is empty.
pub fn parse_stage_input(input: &str) -> (PathBuf, Option<String>) {
    match input.rsplit_once('=') {
        Some((path, category))
            if !path.is_empty()
                && !category.trim().is_empty()
                && !category.contains(['/', '\\']) =>
        {
            (PathBuf::from(path), Some(category.trim().to_string()))
        }
        _ => (PathBuf::from(input), None),
    }
}

fn layout_for(dimensions: Option<(u32, u32)>) -> Layout {
    match dimensions {
        Some((w, h)) if w > 0 && h > 0 => {
            let aspect = f64::from(w) / f64::from(h);
            if aspect >= WIDE_ASPECT {
                Layout::Wide
            } else if aspect <= TALL_ASPECT {
                Layout::Tall
            } else {
                Layout::Normal
            }
        }
        _ => Layout::Normal,
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn mime_from_extension(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
