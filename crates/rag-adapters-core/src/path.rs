//! Key layout for knowledge-base artifacts on a flat object store.
//!
//! ```text
//! {kb_id}/                          ← knowledge-base prefix
//! {kb_id}/{doc_id}/                 ← document prefix
//! {kb_id}/{doc_id}/page_3.jpg       ← page image
//! {kb_id}/{doc_id}/page_content_3.json
//! {kb_id}/{doc_id}/elements.json
//! {kb_id}/{doc_id}/errors/{timestamp}.json
//! ```
//!
//! Identifiers may not contain `/`. Without that rule `kb1` and
//! `kb1/doc` would share key space and a prefix delete of one could
//! remove artifacts of the other.

use std::fmt;

use crate::error::{Error, Result};

/// Element-extraction artifact name.
pub const ELEMENTS_FILE: &str = "elements.json";

/// Sub-prefix holding error-log records.
pub const ERRORS_DIR: &str = "errors";

/// Page-image extensions, in lookup order.
pub const PAGE_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn validate_id(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_artifact(format!("{} must not be empty", label)));
    }
    if value.contains('/') {
        return Err(Error::invalid_artifact(format!(
            "{} must not contain '/': {:?}",
            label, value
        )));
    }
    if value == "." || value == ".." {
        return Err(Error::invalid_artifact(format!(
            "{} must not be {:?}",
            label, value
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_artifact("artifact name must not be empty"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::invalid_artifact(format!(
            "artifact name must be relative and name a file: {:?}",
            name
        )));
    }
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::invalid_artifact(format!(
                "invalid segment in artifact name {:?}",
                name
            )));
        }
    }
    Ok(())
}

/// `{kb_id}/`
pub fn kb_prefix(kb_id: &str) -> Result<String> {
    validate_id("kb_id", kb_id)?;
    Ok(format!("{}/", kb_id))
}

/// `{kb_id}/{doc_id}/`
pub fn document_prefix(kb_id: &str, doc_id: &str) -> Result<String> {
    validate_id("kb_id", kb_id)?;
    validate_id("doc_id", doc_id)?;
    Ok(format!("{}/{}/", kb_id, doc_id))
}

/// `{kb_id}/{doc_id}/{artifact_name}`
pub fn artifact_key(kb_id: &str, doc_id: &str, artifact_name: &str) -> Result<String> {
    Ok(ArtifactKey::new(kb_id, doc_id, artifact_name)?.to_string())
}

pub fn page_image_name(page: u32, extension: &str) -> String {
    format!("page_{}.{}", page, extension)
}

pub fn page_content_name(page: u32) -> String {
    format!("page_content_{}.json", page)
}

pub fn error_log_name(timestamp: &str) -> String {
    format!("{}/{}.json", ERRORS_DIR, timestamp)
}

/// Extract the page number from `page_N.<ext>` or `page_content_N.json`.
///
/// Only the last path segment is inspected.
pub fn page_number(artifact_name: &str) -> Option<u32> {
    let file = artifact_name.rsplit('/').next()?;
    let (stem, _ext) = file.rsplit_once('.')?;
    let digits = stem
        .strip_prefix("page_content_")
        .or_else(|| stem.strip_prefix("page_"))?;
    digits.parse().ok()
}

/// A validated, composed artifact key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub kb_id: String,
    pub doc_id: String,
    pub name: String,
}

impl ArtifactKey {
    pub fn new(kb_id: &str, doc_id: &str, name: &str) -> Result<Self> {
        validate_id("kb_id", kb_id)?;
        validate_id("doc_id", doc_id)?;
        validate_name(name)?;
        Ok(Self {
            kb_id: kb_id.to_string(),
            doc_id: doc_id.to_string(),
            name: name.to_string(),
        })
    }

    /// Split a full store key back into its parts.
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts = key.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kb), Some(doc), Some(name)) => Self::new(kb, doc, name),
            _ => Err(Error::invalid_artifact(format!(
                "not an artifact key: {:?}",
                key
            ))),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kb_id, self.doc_id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_keys() {
        assert_eq!(kb_prefix("kb1").unwrap(), "kb1/");
        assert_eq!(document_prefix("kb1", "doc1").unwrap(), "kb1/doc1/");
        assert_eq!(
            artifact_key("kb1", "doc1", ELEMENTS_FILE).unwrap(),
            "kb1/doc1/elements.json"
        );
        assert_eq!(
            artifact_key("kb1", "doc1", &error_log_name("t1")).unwrap(),
            "kb1/doc1/errors/t1.json"
        );
    }

    #[test]
    fn test_rejects_ids_that_would_overlap() {
        assert!(kb_prefix("").is_err());
        assert!(kb_prefix("a/b").is_err());
        assert!(document_prefix("kb", "..").is_err());
        assert!(document_prefix("kb", "x/y").is_err());
    }

    #[test]
    fn test_rejects_traversing_names() {
        assert!(artifact_key("kb", "doc", "").is_err());
        assert!(artifact_key("kb", "doc", "/abs.json").is_err());
        assert!(artifact_key("kb", "doc", "errors/../x.json").is_err());
        assert!(artifact_key("kb", "doc", "errors//x.json").is_err());
        assert!(artifact_key("kb", "doc", "errors/").is_err());
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number("page_12.jpg"), Some(12));
        assert_eq!(page_number("page_content_4.json"), Some(4));
        assert_eq!(page_number("kb/doc/page_7.png"), Some(7));
        assert_eq!(page_number("elements.json"), None);
        assert_eq!(page_number("page_x.jpg"), None);
    }

    #[test]
    fn test_parse_roundtrip() {
        let key = ArtifactKey::parse("kb1/doc1/errors/t.json").unwrap();
        assert_eq!(key.kb_id, "kb1");
        assert_eq!(key.doc_id, "doc1");
        assert_eq!(key.name, "errors/t.json");
        assert_eq!(key.to_string(), "kb1/doc1/errors/t.json");
        assert!(ArtifactKey::parse("kb1/doc1").is_err());
    }
}
