//! Core types for document question answering

pub mod document;
pub mod query;
pub mod response;

pub use document::{point_id, Chunk, DocumentRecord, TextSegment, UNKNOWN_SECTION};
pub use query::QueryRequest;
pub use response::{
    snippet, Citation, HealthReport, HealthStatus, QueryResponse, UploadResponse,
};
