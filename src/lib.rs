//! # Azure RAG Adapters
//!
//! Azure implementations of the storage and model capabilities a
//! retrieval-augmented generation library plugs into: artifact storage on
//! Blob Storage, chat completion, embeddings, and vision-language calls on
//! Azure OpenAI.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │  rag-adapters-core traits │
//!                 │ FileSystem Llm Embedding │
//!                 │           Vlm            │
//!                 └────────────┬─────────────┘
//!          ┌──────────────┬────┴─────────┬──────────────┐
//!          ▼              ▼              ▼              ▼
//!   ┌─────────────┐ ┌──────────┐ ┌─────────────┐ ┌──────────┐
//!   │ BlobStorage │ │   Chat   │ │  Embedding  │ │   VLM    │
//!   └──────┬──────┘ └────┬─────┘ └──────┬──────┘ └────┬─────┘
//!          ▼             └──────────────┼─────────────┘
//!   ┌─────────────┐              ┌──────▼──────┐
//!   │ Blob REST   │              │ OpenAI REST │
//!   │ (SharedKey) │              │  (api-key)  │
//!   └─────────────┘              └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azure_rag_adapters::blob_storage::{AzureBlobStorage, BlobStorageOptions};
//! use azure_rag_adapters::FileSystem;
//!
//! # async fn run() -> Result<(), azure_rag_adapters::Error> {
//! // Credentials come from AZURE_STORAGE_CONNECTION_STRING.
//! let storage =
//!     AzureBlobStorage::connect(BlobStorageOptions::new("/var/tmp/rag", "kb-artifacts")).await?;
//! storage
//!     .put("kb1", "doc1", "elements.json", r#"{"a":1}"#.into())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Adapter configs, env resolution, config files |
//! | [`azure_blob`] | Blob REST client with Shared Key signing |
//! | [`blob_storage`] | `FileSystem` adapter and local materialization |
//! | [`openai`] | Shared Azure OpenAI client |
//! | [`chat`] | Chat-completion adapter |
//! | [`embedding`] | Embedding adapter |
//! | [`vlm`] | Vision-language adapter |

pub mod azure_blob;
pub mod blob_storage;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod openai;
pub mod vlm;

pub use blob_storage::{AzureBlobStorage, BlobStorageOptions, LocalArtifact};
pub use chat::AzureOpenAIChat;
pub use config::{load_config, AdapterConfig, Adapters, AdaptersConfig};
pub use embedding::AzureOpenAIEmbedding;
pub use vlm::AzureOpenAIVlm;

pub use rag_adapters_core::{
    ArtifactPayload, ChatMessage, Embedding, Error, FileSystem, ImageFormat, ImageInput, Llm,
    ObjectStore, PageArtifact, PageArtifactKind, Result, Vlm, VlmRequest,
};
