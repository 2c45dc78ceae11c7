//! The host library's `FileSystem` capability and its object-store mapping.
//!
//! [`FileSystem`] is the contract the RAG host uses to persist page images,
//! page content, extracted elements and error logs. [`PrefixFileSystem`]
//! implements it for any [`ObjectStore`] by composing keys as
//! `{kb_id}/{doc_id}/{artifact_name}` (see [`crate::path`]).
//!
//! # Directory deletion
//!
//! Object stores have no directories, so deleting a document or knowledge
//! base means enumerating its prefix and deleting every key. This is not
//! atomic. The policy is best-effort-all:
//!
//! 1. List every key under the prefix (a listing failure aborts).
//! 2. Attempt to delete every key, even after individual failures.
//! 3. If any delete failed, return [`Error::PartialDelete`] with the keys
//!    that remain. Everything else is gone.
//!
//! Deleting an absent key succeeds, so retrying the whole operation (or
//! just the residual keys) is safe.
//!
//! Concurrent writers are not coordinated: a `put` racing a
//! `delete_document` on the same prefix may or may not survive.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{
    ArtifactKind, ArtifactPayload, ErrorRecord, PageArtifact, PageArtifactKind, PageContent,
};
use crate::path::{self, PAGE_IMAGE_EXTENSIONS};
use crate::store::ObjectStore;

/// Hierarchical artifact storage keyed by knowledge base and document.
///
/// Required methods map one-to-one onto store operations; the provided
/// methods are conveniences for the artifact kinds the host library
/// writes.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Adapter type name used in persisted configuration.
    fn subclass_name(&self) -> &str;

    /// Write one artifact, overwriting any existing one.
    async fn put(
        &self,
        kb_id: &str,
        doc_id: &str,
        artifact_name: &str,
        payload: ArtifactPayload,
    ) -> Result<()>;

    /// Read one artifact. Fails with [`Error::ArtifactNotFound`] when absent.
    async fn get(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<ArtifactPayload>;

    async fn exists(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<bool>;

    /// Read page-indexed artifacts for pages `start..=end`, ascending.
    ///
    /// Missing pages are skipped. Fails with [`Error::ArtifactNotFound`]
    /// only when no page in the range exists.
    async fn get_range(
        &self,
        kb_id: &str,
        doc_id: &str,
        kind: PageArtifactKind,
        start: u32,
        end: u32,
    ) -> Result<Vec<PageArtifact>>;

    /// Artifact names stored under a document, sorted.
    async fn list_artifacts(&self, kb_id: &str, doc_id: &str) -> Result<Vec<String>>;

    async fn delete_document(&self, kb_id: &str, doc_id: &str) -> Result<()>;

    async fn delete_knowledge_base(&self, kb_id: &str) -> Result<()>;

    /// Append an error record under `errors/{timestamp}.json`.
    async fn log_error(&self, kb_id: &str, doc_id: &str, error: serde_json::Value) -> Result<()>;

    /// Prepare an empty document directory, removing leftovers from a
    /// previous ingestion.
    async fn create_directory(&self, kb_id: &str, doc_id: &str) -> Result<()> {
        self.delete_document(kb_id, doc_id).await
    }

    async fn save_json(
        &self,
        kb_id: &str,
        doc_id: &str,
        file_name: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let text = to_pretty_json(value, file_name)?;
        self.put(kb_id, doc_id, file_name, ArtifactPayload::Text(text))
            .await
    }

    async fn save_image(
        &self,
        kb_id: &str,
        doc_id: &str,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<()> {
        self.put(kb_id, doc_id, file_name, ArtifactPayload::Bytes(image))
            .await
    }

    /// Load `{data_name}.json` and parse it.
    async fn load_data(
        &self,
        kb_id: &str,
        doc_id: &str,
        data_name: &str,
    ) -> Result<serde_json::Value> {
        let name = format!("{}.json", data_name);
        let payload = self.get(kb_id, doc_id, &name).await?;
        parse_json(&payload, &name)
    }

    async fn save_page_content(
        &self,
        kb_id: &str,
        doc_id: &str,
        page: u32,
        content: &str,
    ) -> Result<()> {
        let name = path::page_content_name(page);
        let body = PageContent {
            content: content.to_string(),
        };
        let text = serde_json::to_string(&body)
            .map_err(|e| Error::invalid_artifact(format!("{}: {}", name, e)))?;
        self.put(kb_id, doc_id, &name, ArtifactPayload::Text(text))
            .await
    }

    async fn load_page_content(&self, kb_id: &str, doc_id: &str, page: u32) -> Result<String> {
        let name = path::page_content_name(page);
        let payload = self.get(kb_id, doc_id, &name).await?;
        decode_page_content(&payload, &name)
    }

    /// Page contents for `start..=end`, skipping missing pages.
    async fn load_page_content_range(
        &self,
        kb_id: &str,
        doc_id: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<String>> {
        let pages = self
            .get_range(kb_id, doc_id, PageArtifactKind::Content, start, end)
            .await?;
        pages
            .iter()
            .map(|p| decode_page_content(&p.payload, &p.key))
            .collect()
    }
}

fn to_pretty_json(value: &serde_json::Value, name: &str) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Error::invalid_artifact(format!("{}: {}", name, e)))
}

fn parse_json(payload: &ArtifactPayload, key: &str) -> Result<serde_json::Value> {
    serde_json::from_slice(payload.as_bytes()).map_err(|e| Error::MalformedArtifact {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode_page_content(payload: &ArtifactPayload, key: &str) -> Result<String> {
    let page: PageContent =
        serde_json::from_slice(payload.as_bytes()).map_err(|e| Error::MalformedArtifact {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    Ok(page.content)
}

/// Current UTC time with nanosecond precision, used as error-log key.
pub fn error_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ═══════════════════════════════════════════════════════════════════════
// Object-store mapping
// ═══════════════════════════════════════════════════════════════════════

/// [`FileSystem`] over a flat [`ObjectStore`].
pub struct PrefixFileSystem<S> {
    store: S,
    subclass_name: String,
}

impl<S: ObjectStore> PrefixFileSystem<S> {
    pub fn new(store: S) -> Self {
        Self::with_subclass_name(store, "PrefixFileSystem")
    }

    pub fn with_subclass_name(store: S, subclass_name: impl Into<String>) -> Self {
        Self {
            store,
            subclass_name: subclass_name.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read one key and decode it according to its artifact kind.
    async fn read(&self, key: &str, kind: ArtifactKind) -> Result<Option<ArtifactPayload>> {
        let bytes = match self.store.get_object(key).await? {
            Some(b) => b,
            None => return Ok(None),
        };
        if kind.is_text() {
            let text = String::from_utf8(bytes).map_err(|e| Error::MalformedArtifact {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            Ok(Some(ArtifactPayload::Text(text)))
        } else {
            Ok(Some(ArtifactPayload::Bytes(bytes)))
        }
    }

    /// First existing image for `page`, trying each known extension.
    async fn find_page_image(
        &self,
        kb_id: &str,
        doc_id: &str,
        page: u32,
    ) -> Result<Option<PageArtifact>> {
        for ext in PAGE_IMAGE_EXTENSIONS {
            let name = path::page_image_name(page, ext);
            let key = path::artifact_key(kb_id, doc_id, &name)?;
            if let Some(bytes) = self.store.get_object(&key).await? {
                return Ok(Some(PageArtifact {
                    page,
                    key,
                    payload: ArtifactPayload::Bytes(bytes),
                }));
            }
        }
        Ok(None)
    }

    async fn find_page_content(
        &self,
        kb_id: &str,
        doc_id: &str,
        page: u32,
    ) -> Result<Option<PageArtifact>> {
        let key = path::artifact_key(kb_id, doc_id, &path::page_content_name(page))?;
        Ok(self
            .read(&key, ArtifactKind::Json)
            .await?
            .map(|payload| PageArtifact { page, key, payload }))
    }

    /// Delete every key under `prefix`, best-effort-all.
    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys = self.store.list_keys(prefix).await?;
        let mut failed = Vec::new();

        for key in &keys {
            if let Err(e) = self.store.delete_object(key).await {
                warn!(key = %key, error = %e, "failed to delete object");
                failed.push(key.clone());
            }
        }

        if failed.is_empty() {
            debug!(prefix, deleted = keys.len(), "deleted prefix");
            Ok(())
        } else {
            Err(Error::PartialDelete {
                prefix: prefix.to_string(),
                failed,
            })
        }
    }

    /// Write a fully-formed error record. `log_error` stamps the current
    /// time and delegates here.
    pub async fn write_error_record(&self, record: &ErrorRecord) -> Result<()> {
        let name = path::error_log_name(&record.timestamp);
        let key = path::artifact_key(&record.kb_id, &record.doc_id, &name)?;
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| Error::invalid_artifact(format!("{}: {}", key, e)))?;
        self.store
            .put_object(&key, text.into_bytes(), ArtifactKind::Json.content_type())
            .await
            .map_err(|e| e.into_storage_write(&key))
    }
}

#[async_trait]
impl<S: ObjectStore> FileSystem for PrefixFileSystem<S> {
    fn subclass_name(&self) -> &str {
        &self.subclass_name
    }

    async fn put(
        &self,
        kb_id: &str,
        doc_id: &str,
        artifact_name: &str,
        payload: ArtifactPayload,
    ) -> Result<()> {
        let key = path::artifact_key(kb_id, doc_id, artifact_name)?;
        let kind = ArtifactKind::from_name(artifact_name);
        if kind.is_text() != payload.is_text() {
            return Err(Error::invalid_artifact(format!(
                "{} expects a {} payload",
                artifact_name,
                if kind.is_text() { "text" } else { "binary" }
            )));
        }

        debug!(key = %key, bytes = payload.len(), "put artifact");
        self.store
            .put_object(&key, payload.into_bytes(), kind.content_type())
            .await
            .map_err(|e| e.into_storage_write(&key))
    }

    async fn get(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<ArtifactPayload> {
        let key = path::artifact_key(kb_id, doc_id, artifact_name)?;
        self.read(&key, ArtifactKind::from_name(artifact_name))
            .await?
            .ok_or_else(|| Error::not_found(key))
    }

    async fn exists(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<bool> {
        let key = path::artifact_key(kb_id, doc_id, artifact_name)?;
        self.store.object_exists(&key).await
    }

    async fn get_range(
        &self,
        kb_id: &str,
        doc_id: &str,
        kind: PageArtifactKind,
        start: u32,
        end: u32,
    ) -> Result<Vec<PageArtifact>> {
        let prefix = path::document_prefix(kb_id, doc_id)?;
        if start > end {
            return Err(Error::invalid_artifact(format!(
                "page range {}..={} is empty",
                start, end
            )));
        }

        let mut pages = Vec::new();
        for page in start..=end {
            let found = match kind {
                PageArtifactKind::Image => self.find_page_image(kb_id, doc_id, page).await?,
                PageArtifactKind::Content => self.find_page_content(kb_id, doc_id, page).await?,
            };
            match found {
                Some(p) => pages.push(p),
                None => debug!(prefix = %prefix, page, "page missing from range"),
            }
        }

        if pages.is_empty() {
            return Err(Error::not_found(format!(
                "{}{:?} pages {}..={}",
                prefix, kind, start, end
            )));
        }
        Ok(pages)
    }

    async fn list_artifacts(&self, kb_id: &str, doc_id: &str) -> Result<Vec<String>> {
        let prefix = path::document_prefix(kb_id, doc_id)?;
        let keys = self.store.list_keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    async fn delete_document(&self, kb_id: &str, doc_id: &str) -> Result<()> {
        let prefix = path::document_prefix(kb_id, doc_id)?;
        self.delete_prefix(&prefix).await
    }

    async fn delete_knowledge_base(&self, kb_id: &str) -> Result<()> {
        let prefix = path::kb_prefix(kb_id)?;
        self.delete_prefix(&prefix).await
    }

    async fn log_error(&self, kb_id: &str, doc_id: &str, error: serde_json::Value) -> Result<()> {
        let record = ErrorRecord {
            kb_id: kb_id.to_string(),
            doc_id: doc_id.to_string(),
            error,
            timestamp: error_timestamp(),
        };
        self.write_error_record(&record).await
    }
}
