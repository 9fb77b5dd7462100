//! Retrieval: the in-process vector index and the document-scoped index adapter

mod search;

pub use search::{cosine_similarity, HnswIndex};

use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::{VectorSearchResult, VectorStoreProvider};
use crate::types::Chunk;

/// Keep results at or above `threshold`, best first, ties by ascending chunk index
pub fn rank_results(
    mut results: Vec<VectorSearchResult>,
    top_k: usize,
    threshold: f32,
) -> Vec<VectorSearchResult> {
    results.retain(|r| r.similarity >= threshold);
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    results.truncate(top_k);
    results
}

/// Retrieval index adapter over a vector store backend.
///
/// Whatever the backend returns, results are restricted to the requested document,
/// never score below the threshold, and are ordered deterministically.
#[derive(Clone)]
pub struct IndexAdapter {
    store: Arc<dyn VectorStoreProvider>,
}

impl IndexAdapter {
    pub fn new(store: Arc<dyn VectorStoreProvider>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.store
    }

    /// Index one vector per chunk; re-indexing a document overwrites its points
    pub async fn upsert(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::internal(format!(
                "Cannot index {} chunks with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let written = self
            .store
            .upsert(document_id, chunks, vectors)
            .await
            .map_err(as_index_error)?;
        tracing::debug!("Indexed {} points for document {} in {}", written, document_id, self.store.name());
        Ok(written)
    }

    /// Top-k chunks of one document by cosine similarity
    pub async fn search(
        &self,
        document_id: Uuid,
        query_vector: &[f32],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<VectorSearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let raw = self
            .store
            .search(document_id, query_vector, top_k, similarity_threshold)
            .await
            .map_err(as_index_error)?;

        let candidates = raw.len();
        let scoped: Vec<VectorSearchResult> = raw
            .into_iter()
            .filter(|r| r.chunk.document_id == document_id)
            .collect();
        if scoped.len() != candidates {
            tracing::warn!(
                "{} returned {} points outside document {}",
                self.store.name(),
                candidates - scoped.len(),
                document_id
            );
        }

        Ok(rank_results(scoped, top_k, similarity_threshold))
    }

    /// Whether the backend holds any point for the document
    pub async fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        self.store
            .document_exists(document_id)
            .await
            .map_err(as_index_error)
    }

    pub async fn health_check(&self) -> bool {
        match self.store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!("Vector store health check failed: {}", e);
                false
            }
        }
    }
}

/// Backend failures surface as index-unavailable
fn as_index_error(err: Error) -> Error {
    match err {
        Error::VectorDb(_) => err,
        other => Error::vector_db(other.to_string()),
    }
}
