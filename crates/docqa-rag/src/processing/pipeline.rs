//! Upload and query flows
//!
//! Upload: `Received -> Chunked -> Embedded -> Indexed -> Done`.
//! Query: `Received -> Embedded -> Retrieved -> Synthesized -> Done`.
//! Either flow ends in `Failed(reason)` from any stage; each runs under one
//! wall-clock budget covering the whole flow.

use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::config::{RagConfig, VectorBackend};
use crate::embeddings::{open_cache, CachedEncoder, EmbeddingCache};
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::ingestion::{validate_upload, DocumentExtractor, FileParser, TextChunker};
use crate::providers::{
    EmbeddingProvider, LlmProvider, LocalVectorStore, OllamaProvider, QdrantVectorStore,
    VectorStoreProvider,
};
use crate::retrieval::IndexAdapter;
use crate::types::{DocumentRecord, HealthReport, QueryRequest, QueryResponse, UploadResponse};

use super::registry::DocumentRegistry;

/// Collaborators the pipeline is assembled from
pub struct PipelineComponents {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub chunker: TextChunker,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub cache: Arc<dyn EmbeddingCache>,
    pub vector_store: Arc<dyn VectorStoreProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub registry: DocumentRegistry,
}

impl PipelineComponents {
    /// Build the production collaborators described by `config`
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config.llm, &config.embeddings)?.split();
        tracing::info!(
            "Ollama at {} (embeddings: {}, generation: {})",
            config.llm.base_url,
            config.embeddings.model,
            config.llm.generate_model
        );

        let vector_store: Arc<dyn VectorStoreProvider> = match config.vector_db.backend {
            VectorBackend::Local => {
                tracing::info!("Using local HNSW vector store");
                Arc::new(LocalVectorStore::from_config(config))
            }
            VectorBackend::Qdrant => {
                tracing::info!(
                    "Using Qdrant vector store at {} (collection {})",
                    config.vector_db.qdrant_url,
                    config.vector_db.qdrant_collection
                );
                Arc::new(QdrantVectorStore::new(&config.vector_db, config.embeddings.dimensions)?)
            }
        };

        Ok(Self {
            extractor: Arc::new(FileParser::new(config.pipeline.max_upload_bytes)?),
            chunker: TextChunker::from_config(&config.chunking)?,
            embedder: Arc::new(embedder),
            cache: open_cache(&config.embeddings)?,
            vector_store,
            llm: Arc::new(llm),
            registry: DocumentRegistry::from_path(config.pipeline.registry_path())?,
        })
    }
}

/// Document Q&A pipeline orchestrator
pub struct RagPipeline {
    config: RagConfig,
    extractor: Arc<dyn DocumentExtractor>,
    chunker: Arc<TextChunker>,
    encoder: CachedEncoder,
    index: IndexAdapter,
    synthesizer: AnswerSynthesizer,
    registry: DocumentRegistry,
    /// Per-document upload locks, present only while an upload holds or awaits one
    upload_locks: DashMap<Uuid, Arc<AsyncMutex<()>>>,
}

impl RagPipeline {
    pub fn new(config: RagConfig, components: PipelineComponents) -> Result<Self> {
        config.validate()?;

        if components.embedder.dimensions() != config.embeddings.dimensions {
            return Err(Error::Config(format!(
                "Embedder produces {} dimensions but embeddings.dimensions is {}",
                components.embedder.dimensions(),
                config.embeddings.dimensions
            )));
        }

        Ok(Self {
            encoder: CachedEncoder::new(
                components.embedder,
                components.cache,
                config.embeddings.batch_size,
            ),
            index: IndexAdapter::new(components.vector_store),
            synthesizer: AnswerSynthesizer::new(components.llm, config.retrieval.snippet_chars)?,
            extractor: components.extractor,
            chunker: Arc::new(components.chunker),
            registry: components.registry,
            upload_locks: DashMap::new(),
            config,
        })
    }

    /// Build a pipeline with the production backends
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let components = PipelineComponents::from_config(&config)?;
        Self::new(config, components)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn encoder(&self) -> &CachedEncoder {
        &self.encoder
    }

    /// Documents with an upload holding or awaiting their lock
    pub fn uploads_in_flight(&self) -> usize {
        self.upload_locks.len()
    }

    /// Index a new document under a fresh identifier
    pub async fn upload(&self, data: Bytes, filename: Option<String>) -> Result<UploadResponse> {
        self.upload_as(Uuid::new_v4(), data, filename).await
    }

    /// Index a document under `document_id`, replacing any previous version
    pub async fn upload_as(
        &self,
        document_id: Uuid,
        data: Bytes,
        filename: Option<String>,
    ) -> Result<UploadResponse> {
        let budget = self.config.pipeline.upload_timeout();
        // Outlives the budgeted future so a timeout still releases the map entry
        let upload_lock = self
            .config
            .pipeline
            .serialize_reuploads
            .then(|| UploadLock::register(&self.upload_locks, document_id));

        let result = with_budget("upload", budget, async {
            let _held = match &upload_lock {
                Some(lock) => Some(lock.mutex.lock().await),
                None => None,
            };
            self.run_upload(document_id, data, filename).await
        })
        .await;
        drop(upload_lock);

        if let Err(e) = &result {
            tracing::warn!("[{}] Upload failed ({}): {}", document_id, e.reason(), e);
        }
        result
    }

    async fn run_upload(
        &self,
        document_id: Uuid,
        data: Bytes,
        filename: Option<String>,
    ) -> Result<UploadResponse> {
        let start = Instant::now();
        let file_size = data.len() as u64;
        tracing::info!(
            "[{}] Received {} ({} bytes)",
            document_id,
            filename.as_deref().unwrap_or("unnamed upload"),
            file_size
        );

        validate_upload(&data, self.config.pipeline.max_upload_bytes)?;

        // Extraction and tokenization are CPU-bound
        let extractor = self.extractor.clone();
        let chunker = self.chunker.clone();
        let (chunks, pages) = tokio::task::spawn_blocking(move || -> Result<_> {
            let segments = extractor.extract(&data)?;
            let pages = segments.iter().map(|s| s.page).max().unwrap_or(0);
            let chunks = chunker.chunk_segments(document_id, &segments)?;
            Ok((chunks, pages))
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;
        tracing::info!("[{}] Chunked: {} chunks from {} pages", document_id, chunks.len(), pages);

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.encoder.encode(&texts).await?;
        tracing::info!("[{}] Embedded: {} vectors", document_id, vectors.len());

        let written = self.index.upsert(document_id, &chunks, &vectors).await?;
        tracing::info!("[{}] Indexed: {} points", document_id, written);

        // The index is authoritative; a lost registry write is recovered on the next query
        if let Err(e) = self
            .registry
            .record(DocumentRecord::new(document_id, filename, pages, chunks.len(), file_size))
            .await
        {
            tracing::warn!("[{}] Failed to persist document registry: {}", document_id, e);
        }

        let elapsed = start.elapsed().as_millis() as u64;
        tracing::info!("[{}] Done in {}ms", document_id, elapsed);
        Ok(UploadResponse::indexed(document_id, chunks.len(), pages, elapsed))
    }

    /// Answer a question from one document
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let document_id = request.document_id;
        let budget = self.config.pipeline.query_timeout();

        let result = match self.validate_query(&request) {
            Ok(top_k) => with_budget("query", budget, self.run_query(request, top_k)).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::warn!("[{}] Query failed ({}): {}", document_id, e.reason(), e);
        }
        result
    }

    /// Effective `top_k` for a well-formed query
    pub fn validate_query(&self, request: &QueryRequest) -> Result<usize> {
        if request.question.trim().is_empty() {
            return Err(Error::invalid_query("Question must not be empty"));
        }

        let retrieval = &self.config.retrieval;
        let top_k = request.top_k.unwrap_or(retrieval.top_k_default);
        if top_k < retrieval.top_k_min || top_k > retrieval.top_k_max {
            return Err(Error::invalid_query(format!(
                "top_k must be between {} and {}, got {}",
                retrieval.top_k_min, retrieval.top_k_max, top_k
            )));
        }
        Ok(top_k)
    }

    async fn run_query(&self, request: QueryRequest, top_k: usize) -> Result<QueryResponse> {
        let start = Instant::now();
        let document_id = request.document_id;
        tracing::info!("[{}] Received query (top_k={})", document_id, top_k);

        // Decide existence before any embedding work; an empty search result is not "not found"
        if !self.document_exists(document_id).await? {
            return Err(Error::DocumentNotFound(document_id));
        }

        let query_vector = self.encoder.encode_one(&request.question).await?;
        tracing::debug!("[{}] Embedded question", document_id);

        let ranked = self
            .index
            .search(
                document_id,
                &query_vector,
                top_k,
                self.config.retrieval.similarity_threshold,
            )
            .await?;
        tracing::info!("[{}] Retrieved {} chunks", document_id, ranked.len());

        let synthesized = self.synthesizer.synthesize(&request.question, &ranked).await?;
        tracing::info!(
            "[{}] Synthesized answer with {} citations",
            document_id,
            synthesized.citations.len()
        );

        Ok(QueryResponse {
            answer: synthesized.answer,
            citations: synthesized.citations,
            chunks_retrieved: ranked.len(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Registry first, then the index for documents indexed before the registry knew them
    pub async fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        if self.registry.contains(document_id) {
            return Ok(true);
        }
        if !self.index.document_exists(document_id).await? {
            return Ok(false);
        }

        tracing::info!("[{}] Found in vector store but not in registry, backfilling", document_id);
        if let Err(e) = self
            .registry
            .record(DocumentRecord::new(document_id, None, 0, 0, 0))
            .await
        {
            tracing::warn!("[{}] Failed to persist document registry: {}", document_id, e);
        }
        Ok(true)
    }

    /// Probe the encoder, generator and vector store concurrently
    pub async fn health(&self) -> HealthReport {
        let embedder = self.encoder.provider().clone();
        let llm = self.synthesizer.llm().clone();

        let (embedding, generation, vector_store) = tokio::join!(
            async move { probe("embedding", embedder.health_check().await) },
            async move { probe("llm", llm.health_check().await) },
            self.index.health_check(),
        );

        HealthReport::from_probes(embedding, generation, vector_store)
    }
}

/// Registration in the per-document lock map, removed on drop when no other upload shares it
struct UploadLock<'a> {
    locks: &'a DashMap<Uuid, Arc<AsyncMutex<()>>>,
    document_id: Uuid,
    mutex: Arc<AsyncMutex<()>>,
}

impl<'a> UploadLock<'a> {
    fn register(locks: &'a DashMap<Uuid, Arc<AsyncMutex<()>>>, document_id: Uuid) -> Self {
        let mutex = locks
            .entry(document_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .value()
            .clone();
        Self {
            locks,
            document_id,
            mutex,
        }
    }
}

impl Drop for UploadLock<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and this registration's
        self.locks
            .remove_if(&self.document_id, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

fn probe(name: &str, result: Result<bool>) -> bool {
    match result {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("{} health check failed: {}", name, e);
            false
        }
    }
}

/// Bound a whole flow by `budget`; in-flight backend calls are dropped, not cancelled remotely
async fn with_budget<T>(
    flow: &'static str,
    budget: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| Error::Timeout { flow, budget })?
}
