//! Azure Blob Storage [`FileSystem`] adapter.
//!
//! Maps `{kb_id}/{doc_id}/{artifact_name}` onto blobs in one container via
//! [`PrefixFileSystem`] over an [`AzureBlobClient`], and downloads
//! artifacts into self-deleting local files for tools that need a path.
//!
//! # Credential resolution
//!
//! Resolved once, at construction, in this order:
//!
//! 1. explicit connection string
//! 2. account name and key, each explicit or from
//!    `AZURE_STORAGE_ACCOUNT_NAME` / `AZURE_STORAGE_ACCOUNT_KEY`
//! 3. `AZURE_STORAGE_CONNECTION_STRING`
//!
//! Nothing resolvable fails with [`Error::CredentialsMissing`].

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rag_adapters_core::path;
use rag_adapters_core::{
    ArtifactKind, ArtifactPayload, Error, FileSystem, PageArtifact, PageArtifactKind,
    PrefixFileSystem, Result,
};
use tempfile::TempPath;

use crate::azure_blob::{AzureBlobClient, StorageAccount};
use crate::config::{
    self, AdapterConfig, BlobStorageConfig, Env, ProcessEnv, ENV_STORAGE_ACCOUNT_KEY,
    ENV_STORAGE_ACCOUNT_NAME, ENV_STORAGE_CONNECTION_STRING,
};

pub const SUBCLASS_NAME: &str = "AzureBlobStorage";

/// Construction parameters for [`AzureBlobStorage`].
#[derive(Clone, Default)]
pub struct BlobStorageOptions {
    /// Local directory for materialized downloads.
    pub base_path: PathBuf,
    pub container_name: String,
    pub connection_string: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    /// Blob service endpoint override (Azurite, private endpoints).
    pub endpoint: Option<String>,
    /// `List Blobs` page size override.
    pub page_size: Option<u32>,
}

impl BlobStorageOptions {
    pub fn new(base_path: impl Into<PathBuf>, container_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            container_name: container_name.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for BlobStorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("BlobStorageOptions")
            .field("base_path", &self.base_path)
            .field("container_name", &self.container_name)
            .field("connection_string", &redact(&self.connection_string))
            .field("account_name", &self.account_name)
            .field("account_key", &redact(&self.account_key))
            .field("endpoint", &self.endpoint)
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn resolve_account(options: &BlobStorageOptions, env: &dyn Env) -> Result<StorageAccount> {
    let endpoint = options.endpoint.as_deref();
    let with_override = |account: StorageAccount| match endpoint {
        Some(e) => account.with_endpoint(e),
        None => account,
    };

    if let Some(cs) = options
        .connection_string
        .as_deref()
        .filter(|cs| !cs.trim().is_empty())
    {
        return StorageAccount::from_connection_string(cs).map(with_override);
    }

    let name = config::resolve(options.account_name.as_deref(), env, ENV_STORAGE_ACCOUNT_NAME);
    let key = config::resolve(options.account_key.as_deref(), env, ENV_STORAGE_ACCOUNT_KEY);
    if let (Some(name), Some(key)) = (&name, &key) {
        return StorageAccount::new(name, key, endpoint);
    }

    if let Some(cs) = env.var(ENV_STORAGE_CONNECTION_STRING) {
        return StorageAccount::from_connection_string(&cs).map(with_override);
    }

    Err(Error::credentials_missing(match name {
        Some(name) => format!(
            "no account key for storage account {} (set {} or {})",
            name, ENV_STORAGE_ACCOUNT_KEY, ENV_STORAGE_CONNECTION_STRING
        ),
        None => format!(
            "no storage credentials (set {} or {} and {})",
            ENV_STORAGE_CONNECTION_STRING, ENV_STORAGE_ACCOUNT_NAME, ENV_STORAGE_ACCOUNT_KEY
        ),
    }))
}

// ═══════════════════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════════════════

/// Artifact storage backed by one Azure Blob container.
pub struct AzureBlobStorage {
    inner: PrefixFileSystem<AzureBlobClient>,
    base_path: PathBuf,
}

impl AzureBlobStorage {
    /// Build the adapter, reading missing credentials from the process
    /// environment. Makes no network calls.
    pub fn new(options: BlobStorageOptions) -> Result<Self> {
        Self::with_env(options, &ProcessEnv)
    }

    pub fn with_env(options: BlobStorageOptions, env: &dyn Env) -> Result<Self> {
        if options.base_path.as_os_str().is_empty() {
            return Err(Error::configuration("base_path must not be empty"));
        }
        let account = resolve_account(&options, env)?;
        let mut client = AzureBlobClient::new(account, options.container_name.trim())?;
        if let Some(page_size) = options.page_size {
            client = client.with_page_size(page_size);
        }
        Ok(Self {
            inner: PrefixFileSystem::with_subclass_name(client, SUBCLASS_NAME),
            base_path: options.base_path,
        })
    }

    /// Build the adapter and create its container if needed.
    pub async fn connect(options: BlobStorageOptions) -> Result<Self> {
        let storage = Self::new(options)?;
        storage.ensure_container().await?;
        Ok(storage)
    }

    pub async fn ensure_container(&self) -> Result<()> {
        self.inner.store().ensure_container().await
    }

    pub fn client(&self) -> &AzureBlobClient {
        self.inner.store()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Non-secret configuration for persistence.
    pub fn to_config(&self) -> BlobStorageConfig {
        let account = self.client().account();
        BlobStorageConfig {
            base_path: self.base_path.clone(),
            container_name: self.client().container().to_string(),
            account_name: account.name().to_string(),
            endpoint: (!account.has_default_endpoint())
                .then(|| account.blob_endpoint().to_string()),
        }
    }

    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig::AzureBlobStorage(self.to_config())
    }

    /// Rebuild from a persisted record; the key comes from the environment.
    pub fn from_config(config: &BlobStorageConfig) -> Result<Self> {
        Self::from_config_with_env(config, &ProcessEnv)
    }

    ///
    /// Fails with [`Error::Configuration`] when the only credentials
    /// available belong to a different storage account.
    pub fn from_config_with_env(config: &BlobStorageConfig, env: &dyn Env) -> Result<Self> {
        config.validate()?;
        let storage = Self::with_env(
            BlobStorageOptions {
                base_path: config.base_path.clone(),
                container_name: config.container_name.clone(),
                account_name: Some(config.account_name.clone()),
                endpoint: config.endpoint.clone(),
                ..Default::default()
            },
            env,
        )?;
        let resolved = storage.client().account().name();
        if resolved != config.account_name {
            return Err(Error::configuration(format!(
                "persisted storage account {} does not match credentials for {} (set {} for {})",
                config.account_name, resolved, ENV_STORAGE_ACCOUNT_KEY, config.account_name
            )));
        }
        Ok(storage)
    }

    // ============ Local materialization ============

    /// Download one artifact into a temporary file under
    /// `{base_path}/{kb_id}/{doc_id}/`.
    pub async fn materialize(
        &self,
        kb_id: &str,
        doc_id: &str,
        artifact_name: &str,
    ) -> Result<LocalArtifact> {
        let key = path::artifact_key(kb_id, doc_id, artifact_name)?;
        let payload = self.inner.get(kb_id, doc_id, artifact_name).await?;
        self.write_local(kb_id, doc_id, key, None, payload).await
    }

    /// Page images for `start..=end` as local files, ascending.
    ///
    /// Missing pages are skipped; an empty range result is
    /// [`Error::ArtifactNotFound`].
    pub async fn get_files(
        &self,
        kb_id: &str,
        doc_id: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<LocalArtifact>> {
        let pages = self
            .inner
            .get_range(kb_id, doc_id, PageArtifactKind::Image, start, end)
            .await?;
        let mut files = Vec::with_capacity(pages.len());
        for PageArtifact { page, key, payload } in pages {
            files.push(self.write_local(kb_id, doc_id, key, Some(page), payload).await?);
        }
        Ok(files)
    }

    /// Every image stored under the document, ordered by page number.
    /// Images without a page number sort last, by name.
    pub async fn get_all_image_files(
        &self,
        kb_id: &str,
        doc_id: &str,
    ) -> Result<Vec<LocalArtifact>> {
        let mut images: Vec<(Option<u32>, String)> = self
            .inner
            .list_artifacts(kb_id, doc_id)
            .await?
            .into_iter()
            .filter(|name| matches!(ArtifactKind::from_name(name), ArtifactKind::Image(_)))
            .map(|name| (path::page_number(&name), name))
            .collect();
        images.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(&b.1)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });

        let mut files = Vec::with_capacity(images.len());
        for (page, name) in images {
            let key = path::artifact_key(kb_id, doc_id, &name)?;
            let payload = match self.inner.get(kb_id, doc_id, &name).await {
                Ok(p) => p,
                // Removed between listing and download.
                Err(e) if e.is_not_found() => {
                    tracing::warn!(key = %key, "image disappeared before download");
                    continue;
                }
                Err(e) => return Err(e),
            };
            files.push(self.write_local(kb_id, doc_id, key, page, payload).await?);
        }
        Ok(files)
    }

    async fn write_local(
        &self,
        kb_id: &str,
        doc_id: &str,
        key: String,
        page: Option<u32>,
        payload: ArtifactPayload,
    ) -> Result<LocalArtifact> {
        let dir = self.base_path.join(kb_id).join(doc_id);
        let file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
        let (stem, suffix) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
            None => (file_name.clone(), String::new()),
        };

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix(&format!("{}-", stem))
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(payload.as_bytes())?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        tracing::debug!(key = %key, path = %path.display(), "materialized artifact");
        Ok(LocalArtifact { key, page, path })
    }
}

#[async_trait]
impl FileSystem for AzureBlobStorage {
    fn subclass_name(&self) -> &str {
        SUBCLASS_NAME
    }

    async fn put(
        &self,
        kb_id: &str,
        doc_id: &str,
        artifact_name: &str,
        payload: ArtifactPayload,
    ) -> Result<()> {
        self.inner.put(kb_id, doc_id, artifact_name, payload).await
    }

    async fn get(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<ArtifactPayload> {
        self.inner.get(kb_id, doc_id, artifact_name).await
    }

    async fn exists(&self, kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<bool> {
        self.inner.exists(kb_id, doc_id, artifact_name).await
    }

    async fn get_range(
        &self,
        kb_id: &str,
        doc_id: &str,
        kind: PageArtifactKind,
        start: u32,
        end: u32,
    ) -> Result<Vec<PageArtifact>> {
        self.inner.get_range(kb_id, doc_id, kind, start, end).await
    }

    async fn list_artifacts(&self, kb_id: &str, doc_id: &str) -> Result<Vec<String>> {
        self.inner.list_artifacts(kb_id, doc_id).await
    }

    async fn delete_document(&self, kb_id: &str, doc_id: &str) -> Result<()> {
        self.inner.delete_document(kb_id, doc_id).await
    }

    async fn delete_knowledge_base(&self, kb_id: &str) -> Result<()> {
        self.inner.delete_knowledge_base(kb_id).await
    }

    async fn log_error(&self, kb_id: &str, doc_id: &str, error: serde_json::Value) -> Result<()> {
        self.inner.log_error(kb_id, doc_id, error).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Materialized files
// ═══════════════════════════════════════════════════════════════════════

/// A downloaded artifact in a local temporary file.
///
/// The file is removed when this value is dropped unless [`keep`](Self::keep)
/// is called.
#[derive(Debug)]
pub struct LocalArtifact {
    key: String,
    page: Option<u32>,
    path: TempPath,
}

impl LocalArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object key the file was downloaded from.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Page number for page images.
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// Persist the file and return its path.
    pub fn keep(self) -> Result<PathBuf> {
        self.path.keep().map_err(|e| Error::Io(e.error))
    }
}

impl AsRef<Path> for LocalArtifact {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_adapters_core::ObjectStore;
    use std::collections::HashMap;

    const KEY: &str = "c2VjcmV0LWtleQ==";

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn options() -> BlobStorageOptions {
        BlobStorageOptions::new("/tmp/rag", "kb-artifacts")
    }

    #[test]
    fn test_no_credentials_is_credentials_missing() {
        let err = AzureBlobStorage::with_env(options(), &env(&[])).err().unwrap();
        assert!(matches!(err, Error::CredentialsMissing(_)));

        let err = AzureBlobStorage::with_env(
            options(),
            &env(&[(ENV_STORAGE_ACCOUNT_NAME, "acme"), (ENV_STORAGE_ACCOUNT_KEY, "")]),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::CredentialsMissing(_)));
    }

    #[test]
    fn test_explicit_connection_string_wins() {
        let opts = BlobStorageOptions {
            connection_string: Some(format!("AccountName=explicit;AccountKey={}", KEY)),
            ..options()
        };
        let e = env(&[
            (ENV_STORAGE_ACCOUNT_NAME, "fromenv"),
            (ENV_STORAGE_ACCOUNT_KEY, KEY),
        ]);
        let storage = AzureBlobStorage::with_env(opts, &e).unwrap();
        assert_eq!(storage.client().account().name(), "explicit");
    }

    #[test]
    fn test_name_and_key_beat_env_connection_string() {
        let cs = format!("AccountName=cs;AccountKey={}", KEY);
        let e = env(&[
            (ENV_STORAGE_CONNECTION_STRING, cs.as_str()),
            (ENV_STORAGE_ACCOUNT_KEY, KEY),
        ]);
        let opts = BlobStorageOptions {
            account_name: Some("named".into()),
            ..options()
        };
        let storage = AzureBlobStorage::with_env(opts, &e).unwrap();
        assert_eq!(storage.client().account().name(), "named");

        let storage = AzureBlobStorage::with_env(
            options(),
            &env(&[(ENV_STORAGE_CONNECTION_STRING, cs.as_str())]),
        )
        .unwrap();
        assert_eq!(storage.client().account().name(), "cs");
    }

    #[test]
    fn test_config_roundtrip_has_no_secrets() {
        let e = env(&[(ENV_STORAGE_ACCOUNT_KEY, KEY)]);
        let storage = AzureBlobStorage::with_env(
            BlobStorageOptions {
                account_name: Some("acme".into()),
                endpoint: Some("http://127.0.0.1:10000/acme".into()),
                ..options()
            },
            &e,
        )
        .unwrap();

        let config = storage.to_config();
        assert_eq!(config.endpoint.as_deref(), Some("http://127.0.0.1:10000/acme"));
        let json = storage.to_adapter_config().to_json().unwrap();
        assert!(json.contains(r#""subclass_name":"AzureBlobStorage""#));
        assert!(!json.contains(KEY));

        let rebuilt = AzureBlobStorage::from_config_with_env(&config, &e).unwrap();
        assert_eq!(rebuilt.client().location(), storage.client().location());
        assert_eq!(rebuilt.base_path(), storage.base_path());
    }

    #[test]
    fn test_default_endpoint_is_not_persisted() {
        let storage = AzureBlobStorage::with_env(
            BlobStorageOptions {
                account_name: Some("acme".into()),
                account_key: Some(KEY.into()),
                ..options()
            },
            &env(&[]),
        )
        .unwrap();
        assert_eq!(storage.to_config().endpoint, None);
    }

    #[test]
    fn test_from_config_without_key_fails() {
        let config = BlobStorageConfig {
            base_path: "/tmp/rag".into(),
            container_name: "kb-artifacts".into(),
            account_name: "acme".into(),
            endpoint: None,
        };
        let err = AzureBlobStorage::from_config_with_env(&config, &env(&[]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::CredentialsMissing(_)));
    }

    #[test]
    fn test_from_config_rejects_connection_string_for_other_account() {
        let config = BlobStorageConfig {
            base_path: "/tmp/rag".into(),
            container_name: "kb-artifacts".into(),
            account_name: "acme".into(),
            endpoint: None,
        };
        let other = env(&[(
            ENV_STORAGE_CONNECTION_STRING,
            "AccountName=otheraccount;AccountKey=c2VjcmV0LWtleQ==",
        )]);
        let err = AzureBlobStorage::from_config_with_env(&config, &other)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));

        let same = env(&[(
            ENV_STORAGE_CONNECTION_STRING,
            "AccountName=acme;AccountKey=c2VjcmV0LWtleQ==",
        )]);
        let storage = AzureBlobStorage::from_config_with_env(&config, &same).unwrap();
        assert_eq!(storage.client().account().name(), "acme");
        assert_eq!(storage.client().container(), "kb-artifacts");
    }

    #[test]
    fn test_options_debug_redacts_secrets() {
        let opts = BlobStorageOptions {
            connection_string: Some("AccountName=a;AccountKey=topsecret".into()),
            account_key: Some("topsecret".into()),
            ..options()
        };
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("topsecret"));
    }

    #[tokio::test]
    async fn test_local_artifact_removed_on_drop_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AzureBlobStorage::with_env(
            BlobStorageOptions {
                account_name: Some("acme".into()),
                account_key: Some(KEY.into()),
                ..BlobStorageOptions::new(dir.path(), "kb-artifacts")
            },
            &env(&[]),
        )
        .unwrap();

        let artifact = storage
            .write_local("kb1", "doc1", "kb1/doc1/page_1.png".into(), Some(1), vec![1u8, 2].into())
            .await
            .unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.starts_with(dir.path().join("kb1").join("doc1")));
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1u8, 2]);
        drop(artifact);
        assert!(!path.exists());

        let artifact = storage
            .write_local("kb1", "doc1", "kb1/doc1/notes.txt".into(), None, "hi".into())
            .await
            .unwrap();
        let kept = artifact.keep().unwrap();
        assert_eq!(std::fs::read_to_string(&kept).unwrap(), "hi");
    }
}
