//! Qdrant vector store over the REST API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Qdrant collection holding every document's chunk points.
///
/// The collection is created on first use with cosine distance at the configured
/// dimension. Each point carries the chunk as payload; `document_id` filters scope
/// every search to one document.
pub struct QdrantVectorStore {
    client: Client,
    base_url: String,
    collection: String,
    dimensions: usize,
    ready: OnceCell<()>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<Value>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantVectorStore {
    pub fn new(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.qdrant_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.qdrant_collection.clone(),
            dimensions,
            ready: OnceCell::new(),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Qdrant request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_db(format!("Qdrant returned HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        suffix: &str,
        body: Value,
    ) -> Result<T> {
        self.ensure_collection().await?;
        let response = self
            .send(self.client.request(method, self.collection_url(suffix)).json(&body))
            .await?;
        let parsed: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse Qdrant response: {}", e)))?;
        Ok(parsed.result)
    }

    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                let url = self.collection_url("");
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::vector_db(format!("Qdrant request failed: {}", e)))?;

                if response.status().is_success() {
                    return Ok(());
                }
                if response.status() != reqwest::StatusCode::NOT_FOUND {
                    return Err(Error::vector_db(format!(
                        "Qdrant collection lookup returned HTTP {}",
                        response.status()
                    )));
                }

                tracing::info!(
                    "Creating Qdrant collection {} ({} dimensions, cosine)",
                    self.collection,
                    self.dimensions
                );
                self.send(self.client.put(&url).json(&json!({
                    "vectors": {"size": self.dimensions, "distance": "Cosine"}
                })))
                .await?;
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

fn document_filter(document_id: Uuid) -> Value {
    json!({"must": [{"key": "document_id", "match": {"value": document_id.to_string()}}]})
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStore {
    async fn upsert(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::vector_db(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let points: Vec<Value> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                json!({
                    "id": chunk.point_id().to_string(),
                    "vector": vector,
                    "payload": chunk.to_payload(),
                })
            })
            .collect();

        if !points.is_empty() {
            let _: Value = self
                .call(Method::PUT, "/points?wait=true", json!({"points": points}))
                .await?;
        }

        // Point ids are positional, so a shorter re-upload only leaves a stale tail
        let _: Value = self
            .call(
                Method::POST,
                "/points/delete?wait=true",
                json!({"filter": {"must": [
                    {"key": "document_id", "match": {"value": document_id.to_string()}},
                    {"key": "chunk_index", "range": {"gte": chunks.len()}}
                ]}}),
            )
            .await?;

        Ok(chunks.len())
    }

    async fn search(
        &self,
        document_id: Uuid,
        query_embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<VectorSearchResult>> {
        let hits: Vec<ScoredPoint> = self
            .call(
                Method::POST,
                "/points/search",
                json!({
                    "vector": query_embedding,
                    "limit": top_k,
                    "filter": document_filter(document_id),
                    "with_payload": true,
                    "score_threshold": threshold,
                }),
            )
            .await?;

        hits.into_iter()
            .filter_map(|hit| hit.payload.map(|payload| (payload, hit.score)))
            .map(|(payload, similarity)| -> Result<VectorSearchResult> {
                Ok(VectorSearchResult {
                    chunk: Chunk::from_payload(payload)
                        .map_err(|e| Error::vector_db(format!("Malformed point payload: {}", e)))?,
                    similarity,
                })
            })
            .collect()
    }

    async fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        let scroll: ScrollResult = self
            .call(
                Method::POST,
                "/points/scroll",
                json!({
                    "filter": document_filter(document_id),
                    "limit": 1,
                    "with_payload": false,
                    "with_vector": false,
                }),
            )
            .await?;
        Ok(!scroll.points.is_empty())
    }

    async fn len(&self) -> Result<usize> {
        let count: CountResult = self
            .call(Method::POST, "/points/count", json!({"exact": true}))
            .await?;
        Ok(count.count)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Qdrant health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
