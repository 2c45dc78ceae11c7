//! Error taxonomy shared by every adapter.
//!
//! Adapters translate vendor failures into [`Error`] and propagate them
//! unchanged; nothing here retries or swallows.

use thiserror::Error;

/// Result type alias for adapter operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by storage and model adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable credentials (or endpoint) from parameters or environment.
    #[error("credentials missing: {0}")]
    CredentialsMissing(String),

    /// Persisted or explicit configuration is malformed or incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed an invalid identifier, artifact name, page range,
    /// or a payload that does not match the artifact kind.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// The requested key does not exist in the backing store.
    #[error("artifact not found: {key}")]
    ArtifactNotFound { key: String },

    /// The backing store rejected a write.
    #[error("failed to write {key}: {detail}")]
    StorageWrite { key: String, detail: String },

    /// A backing service rejected a call, or the transport failed.
    #[error("{service} call failed{}: {message}", fmt_status(.status))]
    Upstream {
        service: String,
        status: Option<u16>,
        message: String,
    },

    /// A prefix delete removed what it could but left `failed` behind.
    #[error("partial delete under {prefix}: {} key(s) could not be removed", .failed.len())]
    PartialDelete { prefix: String, failed: Vec<String> },

    /// A stored artifact exists but could not be decoded.
    #[error("malformed artifact {key}: {message}")]
    MalformedArtifact { key: String, message: String },

    /// Local I/O failure (temp-file materialization, image reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl Error {
    pub fn credentials_missing(msg: impl Into<String>) -> Self {
        Self::CredentialsMissing(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_artifact(msg: impl Into<String>) -> Self {
        Self::InvalidArtifact(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::ArtifactNotFound { key: key.into() }
    }

    /// Build an [`Error::Upstream`] for `service`.
    pub fn upstream(service: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Re-label a failed store write as [`Error::StorageWrite`], keeping the
    /// vendor detail. Errors that are already write errors pass through.
    pub fn into_storage_write(self, key: &str) -> Self {
        match self {
            e @ Self::StorageWrite { .. } => e,
            other => Self::StorageWrite {
                key: key.to_string(),
                detail: other.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ArtifactNotFound { .. })
    }
}
