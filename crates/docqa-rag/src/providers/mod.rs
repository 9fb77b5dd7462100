//! Provider abstractions for embeddings, LLM, and vector storage
//!
//! Trait-based seams that allow switching between the in-process index and
//! Qdrant, and substituting test doubles for the Ollama backends.

pub mod embedding;
pub mod llm;
pub mod vector_store;
pub mod ollama;
pub mod local;
pub mod qdrant;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use qdrant::QdrantVectorStore;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};
