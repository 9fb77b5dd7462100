//! Response types for uploads, queries and health checks

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Chunk;

/// Citation pointing back to one retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Section title of the cited chunk
    pub section: String,
    /// Page number of the cited chunk
    pub page: u32,
    /// Leading characters of the chunk text
    pub text_snippet: String,
    /// The `N` of the `[Source N]` marker (1-based)
    pub source_index: usize,
    /// Index of the cited chunk within its document
    pub chunk_index: u32,
    /// Similarity score the chunk was retrieved with
    pub score: f32,
}

impl Citation {
    /// Create a citation from a retrieved chunk
    pub fn from_chunk(source_index: usize, chunk: &Chunk, score: f32, snippet_chars: usize) -> Self {
        Self {
            section: chunk.section.clone(),
            page: chunk.page,
            text_snippet: snippet(&chunk.content, snippet_chars),
            source_index,
            chunk_index: chunk.chunk_index,
            score,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        format!(
            "[Source {}] Section: {}, Page {}",
            self.source_index, self.section, self.page
        )
    }
}

/// First `max_chars` characters of `text`, suffixed with `...` when truncated
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Response from a document query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer, or the insufficient-information sentinel
    pub answer: String,
    /// Citations with source snippets
    pub citations: Vec<Citation>,
    /// Number of chunks retrieved above the threshold
    pub chunks_retrieved: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Response from a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Identifier to query the document with
    pub document_id: Uuid,
    /// Always `indexed` for a completed upload
    pub status: String,
    /// Chunks indexed
    pub chunks: usize,
    /// Pages extracted
    pub pages: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl UploadResponse {
    pub fn indexed(document_id: Uuid, chunks: usize, pages: u32, processing_time_ms: u64) -> Self {
        Self {
            document_id,
            status: "indexed".to_string(),
            chunks,
            pages,
            processing_time_ms,
        }
    }
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Reachability of each backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub embedding: bool,
    pub llm: bool,
    pub vector_store: bool,
}

impl HealthReport {
    pub fn from_probes(embedding: bool, llm: bool, vector_store: bool) -> Self {
        let status = if embedding && llm && vector_store {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            embedding,
            llm,
            vector_store,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}
