//! Shared Azure OpenAI REST plumbing.
//!
//! Resolves endpoint and API key once, then posts JSON bodies to
//! `{endpoint}/openai/deployments/{deployment}/{operation}?api-version={v}`
//! with the `api-key` header. Failures are translated, never retried.

use std::fmt;
use std::time::Duration;

use rag_adapters_core::{Error, Result};

use crate::config::{self, Env, ENV_OPENAI_API_KEY, ENV_OPENAI_ENDPOINT};

pub(crate) const SERVICE: &str = "azure-openai";

/// Resolved Azure OpenAI endpoint, key, and HTTP client.
#[derive(Clone)]
pub struct AzureOpenAIClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl AzureOpenAIClient {
    /// Resolve `azure_endpoint` / `api_key` against `AZURE_OPENAI_ENDPOINT`
    /// / `AZURE_OPENAI_API_KEY`.
    pub fn resolve(
        azure_endpoint: Option<&str>,
        api_key: Option<&str>,
        api_version: &str,
        timeout_secs: u64,
        env: &dyn Env,
    ) -> Result<Self> {
        let endpoint = config::resolve(azure_endpoint, env, ENV_OPENAI_ENDPOINT).ok_or_else(|| {
            Error::credentials_missing(format!(
                "no Azure OpenAI endpoint (pass azure_endpoint or set {})",
                ENV_OPENAI_ENDPOINT
            ))
        })?;
        let api_key = config::resolve(api_key, env, ENV_OPENAI_API_KEY).ok_or_else(|| {
            Error::credentials_missing(format!(
                "no Azure OpenAI API key (pass api_key or set {})",
                ENV_OPENAI_API_KEY
            ))
        })?;
        if api_version.trim().is_empty() {
            return Err(Error::configuration("api_version must not be empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version: api_version.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    /// POST `body` to a deployment operation and return the response JSON.
    pub async fn post(
        &self,
        deployment: &str,
        operation: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        tracing::debug!(deployment, operation, "azure openai request");

        let resp = self
            .http
            .post(self.url(deployment, operation))
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::upstream(
                SERVICE,
                Some(status.as_u16()),
                error_message(&text),
            ));
        }

        resp.json().await.map_err(|e| {
            Error::upstream(
                SERVICE,
                Some(status.as_u16()),
                format!("invalid JSON response: {}", e),
            )
        })
    }
}

impl fmt::Debug for AzureOpenAIClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAIClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// `error.message` from an Azure OpenAI error body, else the first 500
/// characters of the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

/// `choices[0].message.content`, trimmed.
pub(crate) fn first_choice_content(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| {
            Error::upstream(
                SERVICE,
                None,
                "invalid chat response: missing choices[0].message.content",
            )
        })
}
