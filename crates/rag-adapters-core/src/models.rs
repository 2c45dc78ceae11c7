//! Shared data types passed between the host library and adapters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Chat
// ═══════════════════════════════════════════════════════════════════════

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message in OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Artifacts
// ═══════════════════════════════════════════════════════════════════════

/// The body of a stored artifact.
///
/// JSON and text artifacts travel as [`ArtifactPayload::Text`]; images and
/// opaque blobs as [`ArtifactPayload::Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    Bytes(Vec<u8>),
    Text(String),
}

impl ArtifactPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(b) => b,
            Self::Text(t) => t.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            Self::Text(t) => t.into_bytes(),
        }
    }

    /// Returns the text when this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Bytes(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for ArtifactPayload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ArtifactPayload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for ArtifactPayload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Image encodings understood by the storage and vision adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// Artifact kind, derived from the artifact name's extension.
///
/// The kind fixes the payload format: text for JSON and plain text,
/// bytes for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Json,
    Text,
    Image(ImageFormat),
    Binary,
}

impl ArtifactKind {
    pub fn from_name(name: &str) -> Self {
        let file = name.rsplit('/').next().unwrap_or(name);
        let ext = match file.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Self::Binary,
        };
        match ext.as_str() {
            "json" => Self::Json,
            "txt" | "md" => Self::Text,
            other => ImageFormat::from_extension(other)
                .map(Self::Image)
                .unwrap_or(Self::Binary),
        }
    }

    /// Whether payloads of this kind are UTF-8 text.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Json | Self::Text)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
            Self::Image(format) => format.media_type(),
            Self::Binary => "application/octet-stream",
        }
    }
}

/// Page-indexed artifact families usable with `get_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageArtifactKind {
    /// `page_N.jpg`, `page_N.jpeg` or `page_N.png`.
    Image,
    /// `page_content_N.json`.
    Content,
}

/// One page returned by a range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    pub page: u32,
    /// Full store key the artifact was read from.
    pub key: String,
    pub payload: ArtifactPayload,
}

/// Body written under `errors/` by `log_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kb_id: String,
    pub doc_id: String,
    pub error: serde_json::Value,
    pub timestamp: String,
}

/// Envelope for `page_content_N.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub content: String,
}

// ═══════════════════════════════════════════════════════════════════════
// Vision
// ═══════════════════════════════════════════════════════════════════════

/// Image handed to a vision-language model.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    /// A local file; the format is inferred from its extension.
    Path(PathBuf),
    /// Raw encoded image bytes.
    Bytes { data: Vec<u8>, format: ImageFormat },
}

/// A vision-language request: one image, instructions, optional schema.
#[derive(Debug, Clone, PartialEq)]
pub struct VlmRequest {
    pub image: ImageInput,
    pub instructions: String,
    /// When set, the model is asked for a JSON object response.
    pub response_schema: Option<serde_json::Value>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl VlmRequest {
    pub const DEFAULT_MAX_TOKENS: u32 = 4000;
    pub const DEFAULT_TEMPERATURE: f64 = 0.5;

    pub fn new(image: ImageInput, instructions: impl Into<String>) -> Self {
        Self {
            image,
            instructions: instructions.into(),
            response_schema: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ArtifactKind::from_name("elements.json"), ArtifactKind::Json);
        assert_eq!(
            ArtifactKind::from_name("errors/2026-01-01T00:00:00Z.json"),
            ArtifactKind::Json
        );
        assert_eq!(
            ArtifactKind::from_name("page_3.JPG"),
            ArtifactKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            ArtifactKind::from_name("page_3.png"),
            ArtifactKind::Image(ImageFormat::Png)
        );
        assert_eq!(ArtifactKind::from_name("notes.md"), ArtifactKind::Text);
        assert_eq!(ArtifactKind::from_name("raw.bin"), ArtifactKind::Binary);
        assert_eq!(ArtifactKind::from_name("noext"), ArtifactKind::Binary);
    }

    #[test]
    fn test_kind_content_types() {
        assert_eq!(ArtifactKind::Json.content_type(), "application/json");
        assert_eq!(
            ArtifactKind::Image(ImageFormat::Webp).content_type(),
            "image/webp"
        );
        assert!(ArtifactKind::Json.is_text());
        assert!(!ArtifactKind::Image(ImageFormat::Png).is_text());
    }

    #[test]
    fn test_chat_message_wire_shape() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_vlm_request_defaults() {
        let req = VlmRequest::new(ImageInput::Path("page_1.jpg".into()), "describe");
        assert_eq!(req.max_tokens, 4000);
        assert_eq!(req.temperature, 0.5);
        assert!(req.response_schema.is_none());
    }
}
