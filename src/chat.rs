//! Azure OpenAI chat-completion adapter.

use async_trait::async_trait;
use rag_adapters_core::{ChatMessage, Llm, Result};

use crate::config::{AdapterConfig, ChatConfig, Env, ProcessEnv};
use crate::openai::{first_choice_content, AzureOpenAIClient};

pub const SUBCLASS_NAME: &str = "AzureOpenAIChatAPI";

/// [`Llm`] backed by an Azure OpenAI chat deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAIChat {
    config: ChatConfig,
    client: AzureOpenAIClient,
}

impl AzureOpenAIChat {
    /// `api_key` falls back to `AZURE_OPENAI_API_KEY`, the config's
    /// endpoint to `AZURE_OPENAI_ENDPOINT`.
    pub fn new(config: ChatConfig, api_key: Option<String>) -> Result<Self> {
        Self::with_env(config, api_key, &ProcessEnv)
    }

    pub fn with_env(config: ChatConfig, api_key: Option<String>, env: &dyn Env) -> Result<Self> {
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

    /// Non-secret configuration, with the resolved endpoint filled in.
    pub fn to_config(&self) -> ChatConfig {
        ChatConfig {
            azure_endpoint: Some(self.client.endpoint().to_string()),
            ..self.config.clone()
        }
    }

    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig::AzureOpenAIChat(self.to_config())
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(config.clone(), None)
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        })
    }
}

#[async_trait]
impl Llm for AzureOpenAIChat {
    fn model_name(&self) -> &str {
        &self.config.deployment_name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(
                &self.config.deployment_name,
                "chat/completions",
                &self.request_body(messages),
            )
            .await?;
        first_choice_content(&response)
    }
}
