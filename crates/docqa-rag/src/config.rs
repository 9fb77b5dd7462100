//! Configuration for the document Q&A pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Upload/query flow configuration
    pub pipeline: PipelineConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing sections
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".to_string()));
        }

        let retrieval = &self.retrieval;
        if retrieval.top_k_min == 0 || retrieval.top_k_min > retrieval.top_k_max {
            return Err(Error::Config(format!(
                "retrieval top_k bounds are invalid: {}..={}",
                retrieval.top_k_min, retrieval.top_k_max
            )));
        }
        if !(retrieval.top_k_min..=retrieval.top_k_max).contains(&retrieval.top_k_default) {
            return Err(Error::Config(format!(
                "retrieval.top_k_default ({}) is outside {}..={}",
                retrieval.top_k_default, retrieval.top_k_min, retrieval.top_k_max
            )));
        }
        if !(-1.0..=1.0).contains(&retrieval.similarity_threshold) {
            return Err(Error::Config(
                "retrieval.similarity_threshold must be within [-1, 1]".to_string(),
            ));
        }

        if self.pipeline.upload_timeout_secs == 0 || self.pipeline.query_timeout_secs == 0 {
            return Err(Error::Config("pipeline timeouts must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Window over the whole document instead of per segment
    pub span_segments: bool,
    /// Optional HuggingFace tokenizer.json; the built-in subword tokenizer is used otherwise
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            span_segments: false,
            tokenizer_path: None,
        }
    }
}

/// Where embedding cache entries live
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// SQLite file under `cache_dir`
    #[default]
    Sqlite,
    /// Process memory only
    Memory,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (part of every cache fingerprint)
    pub model: String,
    /// Embedding dimensions, constant for the lifetime of an index
    pub dimensions: usize,
    /// Maximum texts per backend request
    pub batch_size: usize,
    /// Cache backend
    pub cache_backend: CacheBackend,
    /// Cache directory
    pub cache_dir: PathBuf,
}

impl EmbeddingConfig {
    /// Path of the SQLite cache file
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join("embeddings.sqlite3")
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            cache_backend: CacheBackend::Sqlite,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("docqa-rag"),
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for embedding requests (generation is never retried)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3".to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Vector store backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// In-process HNSW index
    #[default]
    Local,
    /// Qdrant over its REST API
    Qdrant,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend selection
    pub backend: VectorBackend,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    pub hnsw_ef_search: usize,
    /// HNSW capacity hint
    pub hnsw_max_elements: usize,
    /// Documents with at most this many points are scored exhaustively
    pub exact_search_below: usize,
    /// Qdrant base URL
    pub qdrant_url: String,
    /// Qdrant collection name
    pub qdrant_collection: String,
    /// Qdrant request timeout in seconds
    pub qdrant_timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Local,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 100,
            hnsw_max_elements: 100_000,
            exact_search_below: 256,
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "research_papers".to_string(),
            qdrant_timeout_secs: 10,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// top_k used when a query does not specify one
    pub top_k_default: usize,
    /// Smallest accepted top_k
    pub top_k_min: usize,
    /// Largest accepted top_k
    pub top_k_max: usize,
    /// Minimum cosine similarity for a chunk to be retrieved
    pub similarity_threshold: f32,
    /// Characters of chunk text kept in a citation snippet
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_default: 5,
            top_k_min: 1,
            top_k_max: 20,
            similarity_threshold: 0.35,
            snippet_chars: 200,
        }
    }
}

/// Upload and query flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget for one upload
    pub upload_timeout_secs: u64,
    /// Wall-clock budget for one query
    pub query_timeout_secs: u64,
    /// Maximum upload size in bytes
    pub max_upload_bytes: u64,
    /// Serialize concurrent uploads that target the same document id
    pub serialize_reuploads: bool,
    /// Directory for the document registry; in-memory registry when unset
    pub data_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Path of the persisted document registry
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("documents.json"))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_timeout_secs: 300,
            query_timeout_secs: 60,
            max_upload_bytes: 20 * 1024 * 1024, // 20MB
            serialize_reuploads: true,
            data_dir: dirs::data_local_dir().map(|dir| dir.join("docqa-rag")),
        }
    }
}
