//! Azure OpenAI vision-language adapter.
//!
//! Sends one image, inlined as a `data:` URL, together with text
//! instructions to a chat deployment that accepts image input.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rag_adapters_core::{Error, ImageFormat, ImageInput, Result, Vlm, VlmRequest};

use crate::config::{AdapterConfig, Env, ProcessEnv, VlmConfig};
use crate::openai::{first_choice_content, AzureOpenAIClient};

pub const SUBCLASS_NAME: &str = "AzureOpenAIVLM";

/// [`Vlm`] backed by an Azure OpenAI vision-capable deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAIVlm {
    config: VlmConfig,
    client: AzureOpenAIClient,
}

impl AzureOpenAIVlm {
    pub fn new(config: VlmConfig, api_key: Option<String>) -> Result<Self> {
        Self::with_env(config, api_key, &ProcessEnv)
    }

    pub fn with_env(config: VlmConfig, api_key: Option<String>, env: &dyn Env) -> Result<Self> {
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

    pub fn to_config(&self) -> VlmConfig {
        VlmConfig {
            azure_endpoint: Some(self.client.endpoint().to_string()),
            ..self.config.clone()
        }
    }

    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig::AzureOpenAIVlm(self.to_config())
    }

    pub fn from_config(config: &VlmConfig) -> Result<Self> {
        Self::new(config.clone(), None)
    }
}

#[async_trait]
impl Vlm for AzureOpenAIVlm {
    fn model_name(&self) -> &str {
        &self.config.deployment_name
    }

    async fn analyze(&self, request: &VlmRequest) -> Result<String> {
        let data_url = image_data_url(&request.image).await?;
        let body = request_body(request, &data_url);
        let response = self
            .client
            .post(&self.config.deployment_name, "chat/completions", &body)
            .await?;
        first_choice_content(&response)
    }
}

/// Media type for an image path, from its extension; JPEG when unknown.
fn media_type_for(path: &std::path::Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .unwrap_or(ImageFormat::Jpeg)
        .media_type()
}

async fn image_data_url(image: &ImageInput) -> Result<String> {
    let (media_type, bytes) = match image {
        ImageInput::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read image {}: {}", path.display(), e),
                ))
            })?;
            (media_type_for(path), bytes)
        }
        ImageInput::Bytes { data, format } => (format.media_type(), data.clone()),
    };
    Ok(format!("data:{};base64,{}", media_type, BASE64.encode(bytes)))
}

fn request_body(request: &VlmRequest, data_url: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": request.instructions },
                { "type": "image_url", "image_url": { "url": data_url } },
            ],
        }],
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });
    if request.response_schema.is_some() {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(media_type_for(Path::new("a/page_1.jpg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("page_1.JPEG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("page_1.png")), "image/png");
        assert_eq!(media_type_for(Path::new("x.gif")), "image/gif");
        assert_eq!(media_type_for(Path::new("x.webp")), "image/webp");
        assert_eq!(media_type_for(Path::new("x.tiff")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("noext")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_data_url_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        std::fs::write(&path, b"abc").unwrap();
        let url = image_data_url(&ImageInput::Path(path)).await.unwrap();
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_missing_image_is_io_error() {
        let err = image_data_url(&ImageInput::Path("/nonexistent/page_9.jpg".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_schema_enables_json_object() {
        let image = ImageInput::Bytes {
            data: vec![1u8],
            format: ImageFormat::Webp,
        };
        let plain = VlmRequest::new(image.clone(), "Describe");
        let body = request_body(&plain, "data:image/webp;base64,AQ==");
        assert!(body.get("response_format").is_none());
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["content"][0]["text"], "Describe");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/webp;base64,AQ=="
        );

        let structured = VlmRequest::new(image, "Extract")
            .with_schema(serde_json::json!({"type": "object"}))
            .with_max_tokens(100)
            .with_temperature(0.1);
        let body = request_body(&structured, "data:,");
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 100);
    }
}
