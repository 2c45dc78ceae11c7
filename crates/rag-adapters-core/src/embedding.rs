//! Embedding capability trait.
//!
//! Concrete providers (Azure OpenAI) live in the adapter crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for embedding backends.
///
/// Output vectors always have [`dims`](Embedding::dims) components and are
/// returned in input order.
#[async_trait]
pub trait Embedding: Send + Sync {
    /// Returns the model or deployment identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts in one backend call.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream(self.model_name(), None, "empty embedding response"))
    }
}
