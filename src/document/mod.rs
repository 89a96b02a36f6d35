//! Source documents and plain-text loading

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata carried from a document into every chunk cut from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path the document was loaded from
    pub source: String,
}

/// A fully loaded source document
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
            },
        }
    }

    /// Length in characters, the unit chunk offsets are measured in
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// BLAKE3 hash of the content, hex encoded
    pub fn content_hash(&self) -> String {
        hash_content(self.content.as_bytes())
    }
}

/// Hex BLAKE3 digest of raw document bytes
pub fn hash_content(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Load a UTF-8 text file as a single document
pub fn load_text(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(RagError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| RagError::io(e, format!("Failed to read document {}", path.display())))?;

    tracing::debug!("Loaded {} ({} bytes)", path.display(), content.len());

    Ok(Document::new(content, path.display().to_string()))
}
