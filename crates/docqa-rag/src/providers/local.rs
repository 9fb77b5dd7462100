//! Local vector store over the in-process HNSW index

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::retrieval::{rank_results, HnswIndex};
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Local vector store wrapping an hnsw_rs index
pub struct LocalVectorStore {
    index: Arc<HnswIndex>,
}

impl LocalVectorStore {
    pub fn new(index: Arc<HnswIndex>) -> Self {
        Self { index }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(Arc::new(HnswIndex::new(
            &config.vector_db,
            config.embeddings.dimensions,
        )))
    }

    /// Get underlying index for direct access
    pub fn inner(&self) -> &Arc<HnswIndex> {
        &self.index
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Internal(format!("Task join error: {}", e))
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        // HNSW insertion is CPU-bound
        let index = self.index.clone();
        let chunks = chunks.to_vec();
        let vectors = vectors.to_vec();
        tokio::task::spawn_blocking(move || index.upsert(document_id, &chunks, &vectors))
            .await
            .map_err(join_error)?
    }

    async fn search(
        &self,
        document_id: Uuid,
        query_embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<VectorSearchResult>> {
        let index = self.index.clone();
        let query = query_embedding.to_vec();

        tokio::task::spawn_blocking(move || {
            let results = index
                .search(document_id, &query, top_k)?
                .into_iter()
                .map(|(chunk, similarity)| VectorSearchResult { chunk, similarity })
                .collect();
            Ok(rank_results(results, top_k, threshold))
        })
        .await
        .map_err(join_error)?
    }

    async fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        Ok(self.index.contains_document(document_id))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }

    async fn health_check(&self) -> Result<bool> {
        // In-process index is always available
        Ok(true)
    }

    fn name(&self) -> &str {
        "local-hnsw"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_SECTION;

    fn store() -> LocalVectorStore {
        let mut config = RagConfig::default();
        config.embeddings.dimensions = 3;
        config.vector_db.hnsw_max_elements = 100;
        LocalVectorStore::from_config(&config)
    }

    fn chunk(document_id: Uuid, chunk_index: u32) -> Chunk {
        Chunk {
            document_id,
            chunk_index,
            content: format!("text {}", chunk_index),
            page: 1,
            section: UNKNOWN_SECTION.to_string(),
            token_count: 2,
        }
    }

    #[tokio::test]
    async fn test_search_applies_threshold_and_top_k() {
        let store = store();
        let doc = Uuid::new_v4();
        let chunks: Vec<Chunk> = (0..3).map(|i| chunk(doc, i)).collect();
        let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0], vec![0.0, 0.0, 1.0]];

        assert_eq!(store.upsert(doc, &chunks, &vectors).await.unwrap(), 3);
        assert!(store.document_exists(doc).await.unwrap());
        assert!(!store.document_exists(Uuid::new_v4()).await.unwrap());

        let results = store.search(doc, &[1.0, 0.0, 0.0], 5, 0.5).await.unwrap();
        let order: Vec<u32> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 1]);

        let top1 = store.search(doc, &[1.0, 0.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(store.len().await.unwrap(), 3);
    }
}
