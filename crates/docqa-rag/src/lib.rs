//! docqa-rag: question answering over uploaded documents with source citations
//!
//! Documents are split into overlapping token-bounded chunks, embedded through a
//! content-addressed cache, and indexed per document. Questions retrieve the best
//! chunks above a similarity threshold and are answered by a generator constrained
//! to those chunks, with `[Source N]` markers linked back to section and page.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, FailureReason, Result};
pub use processing::{PipelineComponents, RagPipeline};
pub use types::{
    Chunk, Citation, DocumentRecord, HealthReport, QueryRequest, QueryResponse, TextSegment,
    UploadResponse,
};
