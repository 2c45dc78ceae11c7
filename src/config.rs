//! Adapter configuration: resolution, persistence and file loading.
//!
//! Every adapter is configured from explicit parameters first and process
//! environment variables second; resolution happens once, at construction.
//! Each adapter can serialize its non-secret configuration to a typed
//! record and be rebuilt from it, with secrets re-read from the
//! environment.
//!
//! # Environment Variables
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `AZURE_STORAGE_CONNECTION_STRING` | [`AzureBlobStorage`](crate::blob_storage::AzureBlobStorage) |
//! | `AZURE_STORAGE_ACCOUNT_NAME` | [`AzureBlobStorage`](crate::blob_storage::AzureBlobStorage) |
//! | `AZURE_STORAGE_ACCOUNT_KEY` | [`AzureBlobStorage`](crate::blob_storage::AzureBlobStorage) |
//! | `AZURE_OPENAI_ENDPOINT` | chat, embedding, VLM |
//! | `AZURE_OPENAI_API_KEY` | chat, embedding, VLM |
//!
//! # Configuration file
//!
//! ```toml
//! [storage]
//! base_path = "/var/tmp/rag"
//! container_name = "kb-artifacts"
//! account_name = "acmestorage"
//!
//! [chat]
//! deployment_name = "gpt-4o-mini"
//! temperature = 0.2
//!
//! [embedding]
//! deployment_name = "text-embedding-3-small"
//! dimension = 1536
//!
//! [vlm]
//! deployment_name = "gpt-4o"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rag_adapters_core::{Embedding, Error, FileSystem, Llm, Result, Vlm};
use serde::{Deserialize, Serialize};

use crate::blob_storage::AzureBlobStorage;
use crate::chat::AzureOpenAIChat;
use crate::embedding::AzureOpenAIEmbedding;
use crate::vlm::AzureOpenAIVlm;

pub const ENV_STORAGE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const ENV_STORAGE_ACCOUNT_NAME: &str = "AZURE_STORAGE_ACCOUNT_NAME";
pub const ENV_STORAGE_ACCOUNT_KEY: &str = "AZURE_STORAGE_ACCOUNT_KEY";
pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

// ═══════════════════════════════════════════════════════════════════════
// Environment lookup
// ═══════════════════════════════════════════════════════════════════════

/// Source of environment variables.
///
/// [`ProcessEnv`] reads the real process environment; a `HashMap` works
/// as a fixed environment.
pub trait Env: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment. Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl Env for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Explicit value if present and non-empty, else the environment variable.
pub fn resolve(explicit: Option<&str>, env: &dyn Env, key: &str) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| env.var(key))
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::configuration(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Persisted adapter records
// ═══════════════════════════════════════════════════════════════════════

/// Non-secret configuration of [`AzureBlobStorage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlobStorageConfig {
    /// Local directory for materialized downloads.
    pub base_path: PathBuf,
    pub container_name: String,
    pub account_name: String,
    /// Blob service endpoint, when not the account default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl BlobStorageConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("container_name", &self.container_name)?;
        require_non_empty("account_name", &self.account_name)?;
        if self.base_path.as_os_str().is_empty() {
            return Err(Error::configuration("base_path must not be empty"));
        }
        Ok(())
    }
}

/// Non-secret configuration of [`AzureOpenAIChat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    pub deployment_name: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_chat_temperature")]
    pub temperature: f64,
    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ChatConfig {
    pub fn new(deployment_name: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            api_version: default_api_version(),
            temperature: default_chat_temperature(),
            max_tokens: default_chat_max_tokens(),
            azure_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("deployment_name", &self.deployment_name)?;
        require_non_empty("api_version", &self.api_version)?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::configuration("temperature must be in [0.0, 2.0]"));
        }
        if self.max_tokens == 0 {
            return Err(Error::configuration("max_tokens must be > 0"));
        }
        Ok(())
    }
}

/// Non-secret configuration of [`AzureOpenAIEmbedding`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub deployment_name: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn new(deployment_name: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            dimension: default_dimension(),
            api_version: default_api_version(),
            azure_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("deployment_name", &self.deployment_name)?;
        require_non_empty("api_version", &self.api_version)?;
        if self.dimension == 0 {
            return Err(Error::configuration("dimension must be > 0"));
        }
        Ok(())
    }
}

/// Non-secret configuration of [`AzureOpenAIVlm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VlmConfig {
    pub deployment_name: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl VlmConfig {
    pub fn new(deployment_name: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            api_version: default_api_version(),
            azure_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("deployment_name", &self.deployment_name)?;
        require_non_empty("api_version", &self.api_version)
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}
fn default_chat_temperature() -> f64 {
    0.2
}
fn default_chat_max_tokens() -> u32 {
    1000
}
fn default_dimension() -> usize {
    1536
}
fn default_timeout_secs() -> u64 {
    120
}

/// Persistence envelope tagged with the adapter type, as stored by the
/// host library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subclass_name")]
pub enum AdapterConfig {
    AzureBlobStorage(BlobStorageConfig),
    #[serde(rename = "AzureOpenAIChatAPI")]
    AzureOpenAIChat(ChatConfig),
    AzureOpenAIEmbedding(EmbeddingConfig),
    #[serde(rename = "AzureOpenAIVLM")]
    AzureOpenAIVlm(VlmConfig),
}

impl AdapterConfig {
    pub fn subclass_name(&self) -> &'static str {
        match self {
            Self::AzureBlobStorage(_) => "AzureBlobStorage",
            Self::AzureOpenAIChat(_) => "AzureOpenAIChatAPI",
            Self::AzureOpenAIEmbedding(_) => "AzureOpenAIEmbedding",
            Self::AzureOpenAIVlm(_) => "AzureOpenAIVLM",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Parse a persisted record. Unknown types, unknown fields and missing
    /// required fields are configuration errors.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::AzureBlobStorage(c) => c.validate(),
            Self::AzureOpenAIChat(c) => c.validate(),
            Self::AzureOpenAIEmbedding(c) => c.validate(),
            Self::AzureOpenAIVlm(c) => c.validate(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Configuration file
// ═══════════════════════════════════════════════════════════════════════

/// Adapter set described by a TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub storage: Option<BlobStorageConfig>,
    #[serde(default)]
    pub chat: Option<ChatConfig>,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    #[serde(default)]
    pub vlm: Option<VlmConfig>,
}

/// Constructed adapters, ready to hand to the host library.
#[derive(Default)]
pub struct Adapters {
    pub file_system: Option<Arc<dyn FileSystem>>,
    pub llm: Option<Arc<dyn Llm>>,
    pub embedding: Option<Arc<dyn Embedding>>,
    pub vlm: Option<Arc<dyn Vlm>>,
}

impl AdaptersConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(c) = &self.storage {
            c.validate()?;
        }
        if let Some(c) = &self.chat {
            c.validate()?;
        }
        if let Some(c) = &self.embedding {
            c.validate()?;
        }
        if let Some(c) = &self.vlm {
            c.validate()?;
        }
        Ok(())
    }

    /// Build every configured adapter, reading secrets from the process
    /// environment.
    pub fn build(&self) -> Result<Adapters> {
        self.build_with_env(&ProcessEnv)
    }

    pub fn build_with_env(&self, env: &dyn Env) -> Result<Adapters> {
        let mut adapters = Adapters::default();
        if let Some(c) = &self.storage {
            adapters.file_system = Some(Arc::new(AzureBlobStorage::from_config_with_env(c, env)?));
        }
        if let Some(c) = &self.chat {
            adapters.llm = Some(Arc::new(AzureOpenAIChat::with_env(c.clone(), None, env)?));
        }
        if let Some(c) = &self.embedding {
            adapters.embedding = Some(Arc::new(AzureOpenAIEmbedding::with_env(
                c.clone(),
                None,
                env,
            )?));
        }
        if let Some(c) = &self.vlm {
            adapters.vlm = Some(Arc::new(AzureOpenAIVlm::with_env(c.clone(), None, env)?));
        }
        Ok(adapters)
    }
}

/// Read and validate an adapter configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<AdaptersConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AdaptersConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        let e = env(&[("KEY", "from-env")]);
        assert_eq!(resolve(Some("explicit"), &e, "KEY").as_deref(), Some("explicit"));
        assert_eq!(resolve(None, &e, "KEY").as_deref(), Some("from-env"));
        assert_eq!(resolve(Some("  "), &e, "KEY").as_deref(), Some("from-env"));
        assert_eq!(resolve(None, &e, "OTHER"), None);
        assert_eq!(resolve(None, &env(&[("KEY", "")]), "KEY"), None);
    }

    #[test]
    fn test_adapter_config_json_roundtrip() {
        let config = AdapterConfig::AzureOpenAIChat(ChatConfig {
            azure_endpoint: Some("https://acme.openai.azure.com".into()),
            ..ChatConfig::new("gpt-4o-mini")
        });
        let json = config.to_json().unwrap();
        assert!(json.contains(r#""subclass_name":"AzureOpenAIChatAPI""#));
        assert_eq!(AdapterConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_adapter_config_defaults_fill_in() {
        let config = AdapterConfig::from_json(
            r#"{"subclass_name":"AzureOpenAIEmbedding","deployment_name":"emb"}"#,
        )
        .unwrap();
        match config {
            AdapterConfig::AzureOpenAIEmbedding(c) => {
                assert_eq!(c.dimension, 1536);
                assert_eq!(c.api_version, DEFAULT_API_VERSION);
                assert_eq!(c.azure_endpoint, None);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_adapter_config_rejects_bad_records() {
        for json in [
            "not json",
            r#"{"subclass_name":"Nope","deployment_name":"x"}"#,
            r#"{"subclass_name":"AzureOpenAIVLM"}"#,
            r#"{"subclass_name":"AzureOpenAIVLM","deployment_name":""}"#,
            r#"{"subclass_name":"AzureBlobStorage","base_path":"/tmp","container_name":"","account_name":"a"}"#,
        ] {
            let err = AdapterConfig::from_json(json).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{json}: {err:?}");
        }
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = serde_json::from_str::<ChatConfig>(
            r#"{"deployment_name":"gpt","deployment":"renamed"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_chat_config_validation() {
        let mut c = ChatConfig::new("gpt");
        assert!(c.validate().is_ok());
        c.temperature = 2.5;
        assert!(c.validate().is_err());
        c.temperature = 0.0;
        c.max_tokens = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapters.toml");
        std::fs::write(
            &path,
            r#"
[storage]
base_path = "/var/tmp/rag"
container_name = "kb-artifacts"
account_name = "acmestorage"

[chat]
deployment_name = "gpt-4o-mini"
max_tokens = 512

[embedding]
deployment_name = "text-embedding-3-small"
dimension = 256
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.unwrap().container_name, "kb-artifacts");
        let chat = config.chat.unwrap();
        assert_eq!(chat.max_tokens, 512);
        assert_eq!(chat.temperature, 0.2);
        assert_eq!(config.embedding.unwrap().dimension, 256);
        assert!(config.vlm.is_none());
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapters.toml");
        std::fs::write(&path, "[embedding]\ndeployment_name = \"e\"\ndimension = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("dimension must be > 0"));

        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_build_without_secrets_is_credentials_missing() {
        let config = AdaptersConfig {
            chat: Some(ChatConfig {
                azure_endpoint: Some("https://acme.openai.azure.com".into()),
                ..ChatConfig::new("gpt")
            }),
            ..Default::default()
        };
        let err = config.build_with_env(&env(&[])).err().unwrap();
        assert!(matches!(err, Error::CredentialsMissing(_)));

        let adapters = config
            .build_with_env(&env(&[(ENV_OPENAI_API_KEY, "k")]))
            .unwrap();
        assert_eq!(adapters.llm.unwrap().model_name(), "gpt");
        assert!(adapters.file_system.is_none());
    }
}
