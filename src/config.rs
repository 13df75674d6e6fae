//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; the user's file overrides only the keys it names. Secrets
//! and the listen port can additionally come from the environment (`IMGBB_KEY`,
//! `IMGBB_SERVER_URL`, `PORT`), applied by the CLI on top of the file.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [image_host]
//! # server_url = "https://studio.example.com/api"  # proxy exposing /imgbb/upload
//! # api_key = "..."                                # direct uploads
//! api_base = "https://api.imgbb.com"
//!
//! [store]
//! backend = "none"          # "firestore", "file" or "none"
//! collection = "imagenes"
//! database = "(default)"
//! base_url = "https://firestore.googleapis.com/v1"
//! # project_id = "studio-site"
//! # api_key = "..."
//! # auth_token = "..."
//! path = "gallery-store.json"
//! poll_interval_secs = 5
//!
//! [gallery]
//! snapshot = "public/galeria.json"   # path or http(s) URL
//! placeholder_title = "Gallery"
//! mode = "auto"                      # or "local"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! public_dir = "public"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::{LoadMode, UploadMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("No upload method configured for mode '{0}': set image_host.server_url or image_host.api_key, or use local export")]
    NoUploadMethod(UploadMode),
}

/// Full pipeline configuration.
///
/// All fields have defaults; a user file need only name what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Image host endpoints and credentials.
    pub image_host: ImageHostConfig,
    /// Metadata store backend.
    pub store: StoreConfig,
    /// Viewing-side loader settings.
    pub gallery: GallerySettings,
    /// Local static server.
    pub server: ServerConfig,
    /// Default mode for `publish` when `--mode` is not given.
    pub upload_mode: UploadMode,
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = non_empty(&self.image_host.server_url) {
            require_http_url("image_host.server_url", url)?;
        }
        require_http_url("image_host.api_base", &self.image_host.api_base)?;
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.collection must not be empty".into(),
            ));
        }
        if self.store.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "store.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Firestore {
            if non_empty(&self.store.project_id).is_none() {
                return Err(ConfigError::Validation(
                    "store.project_id is required for the firestore backend".into(),
                ));
            }
            require_http_url("store.base_url", &self.store.base_url)?;
        }
        if self.store.backend == StoreBackend::File && self.store.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.path is required for the file backend".into(),
            ));
        }
        if self.gallery.snapshot.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gallery.snapshot must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{key} must be an http(s) URL, got '{value}'"
        )))
    }
}

/// `Some(trimmed)` for a set, non-blank optional string.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Image host settings (ImgBB-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageHostConfig {
    /// Base URL of a server exposing `POST /imgbb/upload`. Preferred when set.
    pub server_url: Option<String>,
    /// Client-visible API key for direct uploads.
    pub api_key: Option<String>,
    /// Image host API root for direct uploads.
    pub api_base: String,
}

impl Default for ImageHostConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            api_base: "https://api.imgbb.com".to_string(),
        }
    }
}

/// Metadata store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// No store: loads use the snapshot file, publishing is unavailable.
    #[default]
    None,
    /// Firestore REST API.
    Firestore,
    /// JSON document on local disk.
    File,
}

/// Metadata store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Document collection holding gallery records.
    pub collection: String,
    /// Firestore project id.
    pub project_id: Option<String>,
    /// Firestore database id.
    pub database: String,
    /// Firestore REST root.
    pub base_url: String,
    /// Web API key, sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// OAuth/ID token sent as a bearer token.
    pub auth_token: Option<String>,
    /// Path of the JSON document for the file backend.
    pub path: String,
    /// How often live subscriptions re-read the collection.
    pub poll_interval_secs: u64,
}

impl StoreConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::None,
            collection: "imagenes".to_string(),
            project_id: None,
            database: "(default)".to_string(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            api_key: None,
            auth_token: None,
            path: "gallery-store.json".to_string(),
            poll_interval_secs: 5,
        }
    }
}

/// Viewing-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GallerySettings {
    /// Snapshot file for forced-local and fallback loads: path or http(s) URL.
    pub snapshot: String,
    /// Title shown for records without one (numbered by position).
    pub placeholder_title: String,
    /// Default load mode.
    pub mode: LoadMode,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            snapshot: "public/galeria.json".to_string(),
            placeholder_title: "Gallery".to_string(),
            mode: LoadMode::Auto,
        }
    }
}

/// Local static server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for every path other than the health check.
    pub public_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            public_dir: "public".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# studio-gallery configuration
# ============================
# All settings are optional. Values shown are the defaults.
# Unknown keys will cause an error.

# Default publish mode: "auto", "server", "direct" or "local".
# auto = server proxy if configured, else direct key, else local export.
upload_mode = "auto"

# ---------------------------------------------------------------------------
# Image host (ImgBB-compatible)
# ---------------------------------------------------------------------------
[image_host]
# Server exposing POST /imgbb/upload; keeps the API key off operator machines.
# server_url = "https://studio.example.com/api"

# Key for direct uploads. Can also come from the IMGBB_KEY environment variable.
# api_key = ""

api_base = "https://api.imgbb.com"

# ---------------------------------------------------------------------------
# Metadata store
# ---------------------------------------------------------------------------
[store]
# "firestore", "file" or "none".
backend = "none"
collection = "imagenes"

# Firestore settings
# project_id = "studio-site"
database = "(default)"
base_url = "https://firestore.googleapis.com/v1"
# api_key = ""
# auth_token = ""

# File backend: JSON document replaced atomically on every commit.
path = "gallery-store.json"

# Seconds between reads for live gallery subscriptions.
poll_interval_secs = 5

# ---------------------------------------------------------------------------
# Gallery loading
# ---------------------------------------------------------------------------
[gallery]
# Snapshot used in forced-local mode and as the last-resort fallback.
# A filesystem path or an http(s) URL.
snapshot = "public/galeria.json"

# Title for records without one; rendered as "<title> <position>".
placeholder_title = "Gallery"

# "auto" (store, then snapshot) or "local" (snapshot only).
mode = "auto"

# ---------------------------------------------------------------------------
# Local server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
# Overridden by the PORT environment variable.
port = 3000
public_dir = "public"
"##
}
