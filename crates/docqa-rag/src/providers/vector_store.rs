//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Result;
use crate::types::Chunk;

/// Search result from vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (higher is more similar)
    pub similarity: f32,
}

/// Trait for vector storage and document-scoped similarity search
///
/// Implementations:
/// - `LocalVectorStore`: in-process HNSW index (hnsw_rs)
/// - `QdrantVectorStore`: Qdrant over REST
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Store one point per chunk, replacing any points previously stored for the document.
    ///
    /// `vectors[i]` belongs to `chunks[i]`. Returns the number of points written.
    async fn upsert(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize>;

    /// Search one document's points.
    ///
    /// Returns at most `top_k` results with similarity >= `threshold`, best first.
    async fn search(
        &self,
        document_id: Uuid,
        query_embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Whether any point is stored for the document
    async fn document_exists(&self, document_id: Uuid) -> Result<bool>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
