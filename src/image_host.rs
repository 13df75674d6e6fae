//! Image host client (ImgBB-compatible API).
//!
//! The [`ImageHost`] trait is the seam the publisher and the stores depend on;
//! [`ImgbbClient`] is the production implementation. It talks to one of two
//! endpoints, fixed at construction:
//!
//! | Endpoint | Request | Response |
//! |---|---|---|
//! | [`HostEndpoint::ServerProxy`] | `POST {server}/imgbb/upload`, JSON `{"imageBase64": "data:..."}` | `{"url", "deleteUrl"?}` |
//! | [`HostEndpoint::Direct`] | `POST {api_base}/1/upload?key=…`, multipart field `image` | `{"data": {"url", "delete_url"?}}` |
//!
//! The proxy keeps the API key on the server; direct mode needs a key the
//! operator's machine can see. Either way a response without a URL is a
//! failed upload. Nothing is retried.

use crate::staging::StagedImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Image host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image host returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Image host returned invalid JSON: {0}")]
    InvalidResponse(String),
    #[error("Image host response has no image URL")]
    MissingUrl,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public URL of the hosted image.
    pub url: String,
    /// URL that deletes the image when requested, if the host issued one.
    pub delete_handle: Option<String>,
}

/// Anything that can store image bytes and hand back a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload one staged image.
    async fn upload(&self, image: &StagedImage) -> Result<UploadedImage, UploadError>;

    /// Invoke a deletion handle returned by an earlier upload.
    async fn delete(&self, handle: &str) -> Result<(), UploadError>;
}

/// Where uploads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEndpoint {
    ServerProxy { server_url: String },
    Direct { api_base: String, api_key: String },
}

impl HostEndpoint {
    /// Request URL for uploads.
    pub fn upload_url(&self) -> String {
        match self {
            HostEndpoint::ServerProxy { server_url } => {
                format!("{}/imgbb/upload", server_url.trim_end_matches('/'))
            }
            HostEndpoint::Direct { api_base, .. } => {
                format!("{}/1/upload", api_base.trim_end_matches('/'))
            }
        }
    }
}

/// Production [`ImageHost`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ImgbbClient {
    http: reqwest::Client,
    endpoint: HostEndpoint,
}

impl ImgbbClient {
    pub fn new(http: reqwest::Client, endpoint: HostEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &HostEndpoint {
        &self.endpoint
    }

    async fn upload_via_proxy(&self, image: &StagedImage) -> Result<UploadedImage, UploadError> {
        let body = serde_json::json!({ "imageBase64": image.preview });
        let response = self
            .http
            .post(self.endpoint.upload_url())
            .json(&body)
            .send()
            .await?;
        parse_proxy_response(&read_body(response).await?)
    }

    async fn upload_direct(
        &self,
        api_key: &str,
        image: &StagedImage,
    ) -> Result<UploadedImage, UploadError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)?;
        let form = Form::new().part("image", part);
        let response = self
            .http
            .post(self.endpoint.upload_url())
            .query(&[("key", api_key)])
            .multipart(form)
            .send()
            .await?;
        parse_direct_response(&read_body(response).await?)
    }
}

#[async_trait]
impl ImageHost for ImgbbClient {
    async fn upload(&self, image: &StagedImage) -> Result<UploadedImage, UploadError> {
        tracing::debug!(file = %image.file_name, bytes = image.bytes.len(), "uploading to image host");
        let result = match &self.endpoint {
            HostEndpoint::ServerProxy { .. } => self.upload_via_proxy(image).await,
            HostEndpoint::Direct { api_key, .. } => self.upload_direct(api_key, image).await,
        };
        if let Err(e) = &result {
            tracing::error!(file = %image.file_name, error = %e, "image host upload failed");
        }
        result
    }

    async fn delete(&self, handle: &str) -> Result<(), UploadError> {
        let response = self.http.get(handle).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

const MAX_ERROR_BODY: usize = 200;

/// Body text of a successful response; non-2xx becomes [`UploadError::Status`].
async fn read_body(response: reqwest::Response) -> Result<String, UploadError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let body: String = text.chars().take(MAX_ERROR_BODY).collect();
        return Err(UploadError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(text)
}

fn parse_json(body: &str) -> Result<Value, UploadError> {
    serde_json::from_str(body).map_err(|e| UploadError::InvalidResponse(e.to_string()))
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Parse the proxy's `{"url", "deleteUrl"}` response.
pub fn parse_proxy_response(body: &str) -> Result<UploadedImage, UploadError> {
    let value = parse_json(body)?;
    let url = string_field(&value, &["url"]).ok_or(UploadError::MissingUrl)?;
    Ok(UploadedImage {
        url,
        delete_handle: string_field(&value, &["deleteUrl", "delete_url"]),
    })
}

/// Parse the image host's `{"data": {"url", "delete_url"}}` response.
pub fn parse_direct_response(body: &str) -> Result<UploadedImage, UploadError> {
    let value = parse_json(body)?;
    let data = value.get("data").ok_or(UploadError::MissingUrl)?;
    let url = string_field(data, &["url"]).ok_or(UploadError::MissingUrl)?;
    Ok(UploadedImage {
        url,
        delete_handle: string_field(data, &["delete_url", "deleteUrl"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_urls_per_endpoint() {
        let proxy = HostEndpoint::ServerProxy {
            server_url: "https://studio.example.com/api/".into(),
        };
        assert_eq!(proxy.upload_url(), "https://studio.example.com/api/imgbb/upload");

        let direct = HostEndpoint::Direct {
            api_base: "https://api.imgbb.com".into(),
            api_key: "k".into(),
        };
        assert_eq!(direct.upload_url(), "https://api.imgbb.com/1/upload");
    }

    #[test]
    fn proxy_response_with_delete_url() {
        let uploaded =
            parse_proxy_response(r#"{"url": "https://i.ibb.co/a.jpg", "deleteUrl": "https://ibb.co/a/del"}"#)
                .unwrap();
        assert_eq!(uploaded.url, "https://i.ibb.co/a.jpg");
        assert_eq!(uploaded.delete_handle.as_deref(), Some("https://ibb.co/a/del"));
    }

    #[test]
    fn proxy_response_without_delete_url() {
        let uploaded = parse_proxy_response(r#"{"url": "u", "deleteUrl": null}"#).unwrap();
        assert_eq!(uploaded.delete_handle, None);
    }

    #[test]
    fn proxy_response_missing_url() {
        let err = parse_proxy_response(r#"{"ok": false}"#).unwrap_err();
        assert!(matches!(err, UploadError::MissingUrl));
        let err = parse_proxy_response(r#"{"url": "  "}"#).unwrap_err();
        assert!(matches!(err, UploadError::MissingUrl));
    }

    #[test]
    fn direct_response_nested_under_data() {
        let uploaded = parse_direct_response(
            r#"{"data": {"url": "https://i.ibb.co/b.png", "delete_url": "https://ibb.co/b/x"}, "success": true}"#,
        )
        .unwrap();
        assert_eq!(uploaded.url, "https://i.ibb.co/b.png");
        assert_eq!(uploaded.delete_handle.as_deref(), Some("https://ibb.co/b/x"));
    }

    #[test]
    fn direct_response_without_data() {
        let err = parse_direct_response(r#"{"error": {"message": "Invalid API v1 key."}}"#).unwrap_err();
        assert!(matches!(err, UploadError::MissingUrl));
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = parse_direct_response("<html>502</html>").unwrap_err();
        assert!(matches!(err, UploadError::InvalidResponse(_)));
    }
}
