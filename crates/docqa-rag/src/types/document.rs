//! Document, segment and chunk types with provenance for citations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Section label used when no heading has been detected yet
pub const UNKNOWN_SECTION: &str = "Unknown";

/// A run of extracted text with its page and best-effort section label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    /// Extracted text
    pub text: String,
    /// Page number (1-indexed)
    pub page: u32,
    /// Section heading, `"Unknown"` if undetected
    pub section: String,
}

impl TextSegment {
    /// Create a segment
    pub fn new(text: impl Into<String>, page: u32, section: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page,
            section: section.into(),
        }
    }

    /// Create a segment with no detected section
    pub fn unsectioned(text: impl Into<String>, page: u32) -> Self {
        Self::new(text, page, UNKNOWN_SECTION)
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document ID
    pub document_id: Uuid,
    /// Position within the document, starting at 0
    pub chunk_index: u32,
    /// Text content
    pub content: String,
    /// Page inherited from the source segment
    pub page: u32,
    /// Section inherited from the source segment
    pub section: String,
    /// Tokens in `content`, never above the configured chunk size
    pub token_count: usize,
}

impl Chunk {
    /// Stable point identifier for vector storage.
    ///
    /// Derived from `(document_id, chunk_index)` so re-indexing a document overwrites
    /// its points instead of duplicating them.
    pub fn point_id(&self) -> Uuid {
        point_id(self.document_id, self.chunk_index)
    }

    /// Convert to a JSON payload for vector storage
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "document_id": self.document_id.to_string(),
            "chunk_index": self.chunk_index,
            "content": self.content,
            "page": self.page,
            "section": self.section,
            "token_count": self.token_count,
        })
    }

    /// Rebuild a chunk from a stored payload
    pub fn from_payload(payload: serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(payload).map_err(crate::Error::from)
    }
}

/// Point identifier for a chunk position within a document
pub fn point_id(document_id: Uuid, chunk_index: u32) -> Uuid {
    Uuid::new_v5(&document_id, &chunk_index.to_be_bytes())
}

/// Registry entry for an indexed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document ID
    pub id: Uuid,
    /// Original filename, if the upload carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Pages seen during extraction
    pub pages: u32,
    /// Chunks indexed
    pub chunks: usize,
    /// Size of the uploaded file in bytes
    pub file_size: u64,
    /// Last time the document was (re)indexed
    pub indexed_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(id: Uuid, filename: Option<String>, pages: u32, chunks: usize, file_size: u64) -> Self {
        Self {
            id,
            filename,
            pages,
            chunks,
            file_size,
            indexed_at: Utc::now(),
        }
    }
}
