//! Shared types used across the publishing pipeline.
//!
//! [`GalleryRecord`] is the one record shape every layer agrees on: the
//! publisher produces it, the stores persist it, the loader renders it.
//! Anything read from outside the crate (store documents, snapshot files,
//! exported staging files) arrives as a [`RawEntry`] and is normalized
//! exactly once via [`RawEntry::normalize`]. Past that boundary nothing
//! sniffs shapes again.
//!
//! ## Accepted input shapes
//!
//! ```text
//! "https://i.ibb.co/abc/a.jpg"                           bare URL string
//! {"url": "...", "category": "portrait", "order": 2}     record object
//! {"src": "...", "deleteUrl": "...", "rotation": "90"}   legacy aliases
//! {"order": 0, "category": "x", "preview": "data:..."}   staging export
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category assigned to records that carry none.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Filter value that shows every item.
pub const ALL_FILTER: &str = "all";

/// Grid layout hint for a gallery item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Normal,
    Wide,
    Tall,
}

impl Layout {
    /// Lenient parse: anything other than `wide`/`tall` is `Normal`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "wide" => Layout::Wide,
            "tall" => Layout::Tall,
            _ => Layout::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Normal => "normal",
            Layout::Wide => "wide",
            Layout::Tall => "tall",
        }
    }
}

/// Persisted description of one published image.
///
/// Serialized with the field names the site has always used (`deleteUrl`,
/// `createdAt`), so documents written by this crate stay readable by older
/// pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryRecord {
    pub url: String,
    #[serde(rename = "deleteUrl", skip_serializing_if = "Option::is_none")]
    pub delete_handle: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub layout: Layout,
    pub rotation: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Read from a bare URL string rather than an object. Only affects the
    /// placeholder title; never persisted.
    #[serde(skip)]
    pub bare: bool,
}

impl GalleryRecord {
    /// A record with only a URL and a category; everything else defaulted.
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delete_handle: None,
            category: category_or_default(&category.into()),
            created_at: None,
            layout: Layout::Normal,
            rotation: 0,
            title: None,
            order: None,
            bare: false,
        }
    }

    /// A record for a bare URL entry.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            bare: true,
            ..Self::new(url, DEFAULT_CATEGORY)
        }
    }
}

/// Trim a category, substituting [`DEFAULT_CATEGORY`] when blank.
pub fn category_or_default(category: &str) -> String {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One entry as found in a store document or snapshot file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawEntry {
    Url(String),
    Record(RawRecord),
    Other(serde_json::Value),
}

/// Object-shaped entry with every historical field spelling.
///
/// Aliases are separate fields rather than `#[serde(alias)]` so that a
/// document carrying two spellings at once still parses. Display fields are
/// kept as raw JSON so a mistyped value degrades instead of dropping the
/// whole entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default, rename = "deleteUrl")]
    pub delete_url: Option<String>,
    #[serde(default, rename = "delete_url")]
    pub delete_url_snake: Option<String>,
    #[serde(default, rename = "deleteHandle")]
    pub delete_handle: Option<String>,
    #[serde(default)]
    pub category: Option<serde_json::Value>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub layout: Option<serde_json::Value>,
    #[serde(default)]
    pub rotation: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<serde_json::Value>,
    #[serde(default)]
    pub order: Option<serde_json::Value>,
}

impl RawEntry {
    /// Normalize into a [`GalleryRecord`]. `None` when the entry has no URL.
    pub fn normalize(self) -> Option<GalleryRecord> {
        match self {
            RawEntry::Url(url) => {
                let url = url.trim();
                (!url.is_empty()).then(|| GalleryRecord::from_url(url))
            }
            RawEntry::Record(raw) => raw.normalize(),
            RawEntry::Other(_) => None,
        }
    }
}

impl RawRecord {
    fn normalize(self) -> Option<GalleryRecord> {
        let url = first_non_empty([&self.url, &self.src, &self.preview])?;
        let delete_handle =
            first_non_empty([&self.delete_url, &self.delete_url_snake, &self.delete_handle]);
        Some(GalleryRecord {
            url,
            delete_handle,
            category: category_or_default(&loose_string(self.category.as_ref()).unwrap_or_default()),
            created_at: self.created_at.as_ref().and_then(parse_timestamp),
            layout: loose_string(self.layout.as_ref())
                .map(|l| Layout::parse(&l))
                .unwrap_or_default(),
            rotation: self.rotation.as_ref().map(parse_rotation).unwrap_or(0),
            title: loose_string(self.title.as_ref())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            order: self.order.as_ref().and_then(parse_order),
            bare: false,
        })
    }
}

/// Normalize a batch, dropping entries without a URL.
pub fn normalize_entries(entries: Vec<RawEntry>) -> Vec<GalleryRecord> {
    let total = entries.len();
    let records: Vec<GalleryRecord> = entries
        .into_iter()
        .filter_map(RawEntry::normalize)
        .collect();
    if records.len() < total {
        tracing::warn!(
            skipped = total - records.len(),
            "ignored gallery entries without a URL"
        );
    }
    records
}

fn first_non_empty<const N: usize>(candidates: [&Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .filter_map(|c| c.as_deref().map(str::trim))
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Display text from a scalar: strings as-is, non-zero numbers and `true`
/// as their JSON text. Falsy and structured values count as absent.
fn loose_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        serde_json::Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Rotation in whole degrees. Numbers are truncated; strings are read like
/// `parseInt` (leading integer, so `"90deg"` is 90). Garbage is 0.
fn parse_rotation(value: &serde_json::Value) -> i32 {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(0),
        serde_json::Value::String(s) => leading_int(s).unwrap_or(0),
        _ => 0,
    }
}

fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i32>().ok().map(|v| v * sign)
}

/// Only numeric `order` values count; anything else means "no explicit order".
fn parse_order(value: &serde_json::Value) -> Option<i64> {
    let serde_json::Value::Number(n) = value else {
        return None;
    };
    n.as_i64()
        .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

/// RFC 3339 strings, or `{seconds, nanoseconds}` objects as exported by the
/// Firestore web SDK.
fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))?
                .as_i64()?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

/// Where publishing sends images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Server proxy if configured, else direct upload, else local export.
    #[default]
    Auto,
    /// Through the server-side proxy (keeps the API key off the client).
    Server,
    /// Straight to the image host with a client-visible key.
    Direct,
    /// Don't publish; serialize the staged set to a file.
    Local,
}

/// Which gallery sources the loader may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Store first, snapshot file as fallback.
    #[default]
    Auto,
    /// Snapshot file only; the store is never contacted.
    Local,
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(UploadMode::Auto),
            "server" => Ok(UploadMode::Server),
            "direct" => Ok(UploadMode::Direct),
            "local" => Ok(UploadMode::Local),
            other => Err(format!(
                "unknown upload mode '{other}' (expected auto, server, direct or local)"
            )),
        }
    }
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(LoadMode::Auto),
            "local" => Ok(LoadMode::Local),
            other => Err(format!(
                "unknown load mode '{other}' (expected auto or local)"
            )),
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadMode::Auto => "auto",
            UploadMode::Server => "server",
            UploadMode::Direct => "direct",
            UploadMode::Local => "local",
        })
    }
}
