//! Firestore REST backend.
//!
//! Talks to the v1 REST API rather than gRPC so the only transport is the
//! `reqwest` client the rest of the crate already uses.
//!
//! | Operation | Request |
//! |---|---|
//! | list | `GET …/documents/{collection}?orderBy=createdAt desc`, paged by `pageToken` |
//! | commit | `POST …/documents:commit` with one `writes` array (atomic) |
//! | clear | list, then one commit of `delete` writes |
//!
//! Documents use Firestore's typed value encoding (`{"stringValue": …}`);
//! [`decode_fields`] flattens that into plain JSON so records go through the
//! same [`RawEntry`] normalization as snapshot files.

use super::{ClearReport, MetadataStore, Snapshot, StoreError, Subscription, delete_hosted_images};
use crate::config::{ConfigError, StoreConfig, non_empty};
use crate::image_host::ImageHost;
use crate::types::{GalleryRecord, RawEntry};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Firestore rejects commits with more writes than this.
pub const MAX_BATCH_WRITES: usize = 500;

const PAGE_SIZE: u32 = 300;

/// Connection settings resolved from [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
}

impl FirestoreSettings {
    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        let project_id = non_empty(&config.project_id).ok_or_else(|| {
            ConfigError::Validation("store.project_id is required for the firestore backend".into())
        })?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            api_key: non_empty(&config.api_key).map(String::from),
            auth_token: non_empty(&config.auth_token).map(String::from),
            poll_interval: config.poll_interval(),
        })
    }

    /// Resource name of the documents root, without the API base.
    fn documents_name(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.documents_name(),
            self.collection
        )
    }

    fn commit_url(&self) -> String {
        format!("{}/{}:commit", self.base_url, self.documents_name())
    }

    fn document_name(&self, id: &str) -> String {
        format!("{}/{}/{}", self.documents_name(), self.collection, id)
    }
}

/// [`MetadataStore`] backed by a Firestore collection.
#[derive(Clone)]
pub struct FirestoreStore {
    http: reqwest::Client,
    settings: FirestoreSettings,
    deleter: Option<Arc<dyn ImageHost>>,
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("collection", &self.settings.collection_url())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(http: reqwest::Client, settings: FirestoreSettings) -> Self {
        Self {
            http,
            settings,
            deleter: None,
        }
    }

    /// Image host used by `clear_all` to delete hosted files.
    pub fn with_deleter(mut self, deleter: Arc<dyn ImageHost>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.settings.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match &self.settings.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// One page of the collection. With `ordered`, Firestore sorts by
    /// `createdAt desc` and omits documents that lack the field.
    async fn list_page(
        &self,
        page_size: u32,
        page_token: Option<&str>,
        ordered: bool,
    ) -> Result<ListResponse, StoreError> {
        let mut request = self
            .http
            .get(self.settings.collection_url())
            .query(&[("pageSize", page_size.to_string())]);
        if ordered {
            request = request.query(&[("orderBy", "createdAt desc")]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "HTTP {status} listing {}: {}",
                self.settings.collection,
                body.chars().take(200).collect::<String>()
            )));
        }
        response
            .json::<ListResponse>()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid list response: {e}")))
    }

    /// Every document as `(resource name, record)`. Documents without a URL
    /// are kept with `None` so `clear_all` still deletes them. Unordered
    /// listings include documents without `createdAt`.
    async fn list_documents(
        &self,
        ordered: bool,
    ) -> Result<Vec<(String, Option<GalleryRecord>)>, StoreError> {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(PAGE_SIZE, token.as_deref(), ordered).await?;
            for doc in page.documents {
                let record = decode_document(&doc.fields);
                out.push((doc.name, record));
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    async fn commit(&self, writes: Vec<Value>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        if writes.len() > MAX_BATCH_WRITES {
            return Err(StoreError::Write(format!(
                "batch of {} writes exceeds the limit of {MAX_BATCH_WRITES}",
                writes.len()
            )));
        }
        let request = self
            .http
            .post(self.settings.commit_url())
            .json(&json!({ "writes": writes }));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Write(format!(
                "HTTP {status} committing batch: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FirestoreStore {
    fn describe(&self) -> String {
        format!(
            "firestore {}/{}",
            self.settings.project_id, self.settings.collection
        )
    }

    async fn list_once(&self) -> Result<Snapshot, StoreError> {
        let docs = self.list_documents(true).await?;
        Ok(docs.into_iter().filter_map(|(_, record)| record).collect())
    }

    fn subscribe(&self, seen: Option<Snapshot>) -> Subscription {
        let store = self.clone();
        Subscription::poll_every(self.settings.poll_interval, seen, move || {
            let store = store.clone();
            async move { store.list_once().await }
        })
    }

    async fn clear_all(&self) -> Result<ClearReport, StoreError> {
        let docs = self.list_documents(false).await?;
        if docs.is_empty() {
            return Ok(ClearReport::default());
        }
        let records: Vec<GalleryRecord> = docs.iter().filter_map(|(_, r)| r.clone()).collect();
        let (deletions_attempted, deletions_failed) =
            delete_hosted_images(self.deleter.as_ref(), &records).await;

        let writes: Vec<Value> = docs
            .iter()
            .map(|(name, _)| json!({ "delete": name }))
            .collect();
        self.commit(writes).await?;
        tracing::info!(removed = docs.len(), collection = %self.settings.collection, "cleared collection");
        Ok(ClearReport {
            removed: docs.len(),
            deletions_attempted,
            deletions_failed,
        })
    }

    async fn commit_batch(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let writes: Vec<Value> = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let id = document_id(nonce, index, &record.url);
                json!({
                    "update": {
                        "name": self.settings.document_name(&id),
                        "fields": encode_record(record),
                    }
                })
            })
            .collect();
        self.commit(writes).await
    }

    async fn check_access(&self) -> Result<(), StoreError> {
        self.list_page(1, None, false).await.map(|_| ())
    }
}

/// 20 hex chars, unique per (commit, position, url).
fn document_id(nonce: i64, index: usize, url: &str) -> String {
    let digest = Sha256::digest(format!("{nonce}:{index}:{url}").as_bytes());
    digest.iter().take(10).map(|b| format!("{b:02x}")).collect()
}

fn decode_document(fields: &Map<String, Value>) -> Option<GalleryRecord> {
    let plain = Value::Object(decode_fields(fields));
    serde_json::from_value::<RawEntry>(plain)
        .ok()
        .and_then(RawEntry::normalize)
}

/// Flatten Firestore typed values into plain JSON.
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "doubleValue" | "booleanValue" => inner.clone(),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(|f| Value::Object(decode_fields(f)))
            .unwrap_or_else(|| Value::Object(Map::new())),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Encode a record as Firestore document fields.
pub fn encode_record(record: &GalleryRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("url".into(), json!({ "stringValue": record.url }));
    fields.insert(
        "deleteUrl".into(),
        match &record.delete_handle {
            Some(handle) => json!({ "stringValue": handle }),
            None => json!({ "nullValue": null }),
        },
    );
    fields.insert("category".into(), json!({ "stringValue": record.category }));
    if let Some(created) = record.created_at {
        fields.insert(
            "createdAt".into(),
            json!({ "timestampValue": created.to_rfc3339_opts(SecondsFormat::Micros, true) }),
        );
    }
    fields.insert("layout".into(), json!({ "stringValue": record.layout.as_str() }));
    fields.insert(
        "rotation".into(),
        json!({ "integerValue": record.rotation.to_string() }),
    );
    if let Some(title) = &record.title {
        fields.insert("title".into(), json!({ "stringValue": title }));
    }
    if let Some(order) = record.order {
        fields.insert("order".into(), json!({ "integerValue": order.to_string() }));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Layout;
    use chrono::{TimeZone, Utc};

    fn settings() -> FirestoreSettings {
        let config = StoreConfig {
            project_id: Some("studio".into()),
            base_url: "https://firestore.googleapis.com/v1/".into(),
            ..StoreConfig::default()
        };
        FirestoreSettings::from_config(&config).unwrap()
    }

    #[test]
    fn resource_urls() {
        let s = settings();
        assert_eq!(
            s.collection_url(),
            "https://firestore.googleapis.com/v1/projects/studio/databases/(default)/documents/imagenes"
        );
        assert_eq!(
            s.commit_url(),
            "https://firestore.googleapis.com/v1/projects/studio/databases/(default)/documents:commit"
        );
        assert_eq!(
            s.document_name("abc"),
            "projects/studio/databases/(default)/documents/imagenes/abc"
        );
    }

    #[test]
    fn blank_credentials_are_unset() {
        let config = StoreConfig {
            project_id: Some("p".into()),
            api_key: Some("".into()),
            auth_token: Some("  ".into()),
            ..StoreConfig::default()
        };
        let s = FirestoreSettings::from_config(&config).unwrap();
        assert_eq!(s.api_key, None);
        assert_eq!(s.auth_token, None);
    }

    #[test]
    fn encode_then_decode_preserves_record() {
        let record = GalleryRecord {
            url: "https://i.ibb.co/a.jpg".into(),
            delete_handle: Some("https://ibb.co/a/del".into()),
            category: "portrait".into(),
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            layout: Layout::Tall,
            rotation: 270,
            title: Some("Window light".into()),
            order: Some(4),
            bare: false,
        };
        let fields = encode_record(&record);
        assert_eq!(fields["rotation"], json!({ "integerValue": "270" }));
        assert_eq!(decode_document(&fields), Some(record));
    }

    #[test]
    fn missing_delete_handle_encodes_as_null() {
        let fields = encode_record(&GalleryRecord::new("u", "x"));
        assert_eq!(fields["deleteUrl"], json!({ "nullValue": null }));
        assert!(!fields.contains_key("order"));
        assert_eq!(decode_document(&fields).unwrap().delete_handle, None);
    }

    #[test]
    fn decode_nested_values() {
        let fields: Map<String, Value> = serde_json::from_value(json!({
            "n": { "integerValue": "12" },
            "d": { "doubleValue": 1.5 },
            "m": { "mapValue": { "fields": { "k": { "booleanValue": true } } } },
            "a": { "arrayValue": { "values": [{ "stringValue": "x" }] } },
            "z": { "nullValue": null }
        }))
        .unwrap();
        let plain = Value::Object(decode_fields(&fields));
        assert_eq!(plain, json!({ "n": 12, "d": 1.5, "m": { "k": true }, "a": ["x"], "z": null }));
    }

    #[test]
    fn document_without_url_decodes_to_none() {
        let fields: Map<String, Value> =
            serde_json::from_value(json!({ "category": { "stringValue": "x" } })).unwrap();
        assert_eq!(decode_document(&fields), None);
    }

    #[test]
    fn document_ids_differ_per_position() {
        let a = document_id(1, 0, "u");
        let b = document_id(1, 1, "u");
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
    }
}
