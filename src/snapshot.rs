//! Snapshot files: the local JSON copy of the gallery.
//!
//! Used for forced-local loads and as the fallback when the metadata store
//! has nothing. The file is a JSON array of [`RawEntry`] values (bare URLs,
//! record objects, or a staging export). It may live on disk or behind an
//! `http(s)` URL, as the site's own `/galeria.json` does.

use crate::types::{GalleryRecord, RawEntry, normalize_entries};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a snapshot is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    Path(PathBuf),
    Url(String),
}

impl SnapshotSource {
    /// `http://` and `https://` locations are URLs; anything else is a path.
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SnapshotSource::Url(location.to_string())
        } else {
            SnapshotSource::Path(PathBuf::from(location))
        }
    }

    pub async fn read(&self, http: &reqwest::Client) -> Result<Vec<GalleryRecord>, SnapshotError> {
        let text = match self {
            SnapshotSource::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SnapshotError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
            SnapshotSource::Url(url) => {
                let response = http.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SnapshotError::Status {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }
                response.text().await?
            }
        };
        Ok(parse_snapshot(&text)?)
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Path(path) => write!(f, "{}", path.display()),
            SnapshotSource::Url(url) => f.write_str(url),
        }
    }
}

/// Parse snapshot text into normalized records.
pub fn parse_snapshot(text: &str) -> Result<Vec<GalleryRecord>, serde_json::Error> {
    let entries: Vec<RawEntry> = serde_json::from_str(text)?;
    Ok(normalize_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_CATEGORY;
    use tempfile::TempDir;

    #[test]
    fn parse_distinguishes_urls_from_paths() {
        assert_eq!(
            SnapshotSource::parse("https://studio.example.com/galeria.json"),
            SnapshotSource::Url("https://studio.example.com/galeria.json".into())
        );
        assert_eq!(
            SnapshotSource::parse("public/galeria.json"),
            SnapshotSource::Path(PathBuf::from("public/galeria.json"))
        );
    }

    #[test]
    fn parse_snapshot_mixed_shapes() {
        let records =
            parse_snapshot(r#"["a.jpg", {"src": "b.jpg", "category": "wedding"}, {"x": 1}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, DEFAULT_CATEGORY);
        assert_eq!(records[1].url, "b.jpg");
    }

    #[test]
    fn parse_snapshot_rejects_non_array() {
        assert!(parse_snapshot(r#"{"url": "a.jpg"}"#).is_err());
    }

    #[tokio::test]
    async fn read_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("galeria.json");
        std::fs::write(&path, r#"["a.jpg", "b.jpg"]"#).unwrap();
        let source = SnapshotSource::Path(path);
        let records = source.read(&reqwest::Client::new()).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = SnapshotSource::parse("/nonexistent/galeria.json");
        let err = source.read(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/galeria.json"));
    }
}
