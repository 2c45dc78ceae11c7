//! # RAG Adapters Core
//!
//! Runtime-agnostic pieces shared by vendor adapters: the capability
//! traits a RAG host programs against, the flat object-store abstraction,
//! the key layout that maps knowledge bases and documents onto it, and
//! the error taxonomy.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`filesystem`] | `FileSystem` trait and `PrefixFileSystem` mapper |
//! | [`store`] | `ObjectStore` trait and in-memory store |
//! | [`path`] | Artifact key layout |
//! | [`llm`] | `Llm` and `Vlm` traits |
//! | [`embedding`] | `Embedding` trait |
//! | [`models`] | Shared data types |
//! | [`error`] | Error taxonomy |

pub mod embedding;
pub mod error;
pub mod filesystem;
pub mod llm;
pub mod models;
pub mod path;
pub mod store;

pub use embedding::Embedding;
pub use error::{Error, Result};
pub use filesystem::{FileSystem, PrefixFileSystem};
pub use llm::{Llm, Vlm};
pub use models::{
    ArtifactKind, ArtifactPayload, ChatMessage, ErrorRecord, ImageFormat, ImageInput,
    PageArtifact, PageArtifactKind, Role, VlmRequest,
};
pub use store::ObjectStore;
