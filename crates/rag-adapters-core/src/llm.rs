//! Chat and vision-language capability traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, VlmRequest};

/// A chat-completion backend.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Returns the model or deployment identifier.
    fn model_name(&self) -> &str;

    /// Send the conversation and return the model's reply text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// A vision-language backend: one image plus instructions in, text out.
///
/// When the request carries a response schema the returned text is a JSON
/// document.
#[async_trait]
pub trait Vlm: Send + Sync {
    fn model_name(&self) -> &str;

    async fn analyze(&self, request: &VlmRequest) -> Result<String>;
}
