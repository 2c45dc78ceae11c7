//! Azure OpenAI embedding adapter.
//!
//! Sends the whole batch in one `embeddings` call. Vectors come back
//! ordered by the response's `index` field and are checked against the
//! configured dimension.

use async_trait::async_trait;
use rag_adapters_core::{Embedding, Error, Result};

use crate::config::{AdapterConfig, EmbeddingConfig, Env, ProcessEnv};
use crate::openai::{AzureOpenAIClient, SERVICE};

pub const SUBCLASS_NAME: &str = "AzureOpenAIEmbedding";

/// [`Embedding`] backed by an Azure OpenAI embedding deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAIEmbedding {
    config: EmbeddingConfig,
    client: AzureOpenAIClient,
}

impl AzureOpenAIEmbedding {
    pub fn new(config: EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        Self::with_env(config, api_key, &ProcessEnv)
    }

    pub fn with_env(
        config: EmbeddingConfig,
        api_key: Option<String>,
        env: &dyn Env,
    ) -> Result<Self> {
        config.validate()?;
        let client = AzureOpenAIClient::resolve(
            config.azure_endpoint.as_deref(),
            api_key.as_deref(),
            &config.api_version,
            config.timeout_secs,
            env,
        )?;
        Ok(Self { config, client })
    }

    pub fn to_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            azure_endpoint: Some(self.client.endpoint().to_string()),
            ..self.config.clone()
        }
    }

    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig::AzureOpenAIEmbedding(self.to_config())
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(config.clone(), None)
    }
}

#[async_trait]
impl Embedding for AzureOpenAIEmbedding {
    fn model_name(&self) -> &str {
        &self.config.deployment_name
    }

    fn dims(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({ "input": texts });
        let response = self
            .client
            .post(&self.config.deployment_name, "embeddings", &body)
            .await?;

        let embeddings = parse_embedding_response(&response)?;
        if embeddings.len() != texts.len() {
            return Err(Error::upstream(
                SERVICE,
                None,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    embeddings.len()
                ),
            ));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.config.dimension) {
            return Err(Error::upstream(
                SERVICE,
                None,
                format!(
                    "expected {}-dimensional embeddings, got {}",
                    self.config.dimension,
                    bad.len()
                ),
            ));
        }
        Ok(embeddings)
    }
}

/// Parse an embeddings response.
///
/// Extracts the `data[].embedding` arrays and returns them sorted by
/// `data[].index`; items without an index keep their position.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let invalid = |what: &str| {
        Error::upstream(SERVICE, None, format!("invalid embeddings response: {}", what))
    };

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid("missing embedding"))?;

        let vec = embedding
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| invalid("non-numeric embedding component"))?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
