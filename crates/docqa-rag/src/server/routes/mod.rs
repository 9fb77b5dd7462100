//! API routes for the document Q&A server

pub mod documents;
pub mod query;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Room for multipart boundaries and headers around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body limit for uploads of at most `max_upload_bytes`
pub fn upload_body_limit(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build all API routes
pub fn api_routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = upload_body_limit(max_upload_bytes);

    Router::new()
        // Upload - with larger body limit for files
        .route(
            "/upload",
            post(upload::upload_document).layer(DefaultBodyLimit::max(body_limit)),
        )
        // Documents
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document)
                .put(upload::reupload_document)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        // Query
        .route("/query", post(query::query_document))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "docqa-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document question answering with source citations",
        "endpoints": {
            "POST /api/upload": "Upload a document (multipart field `file`)",
            "PUT /api/documents/:id": "Re-index a document under an existing id",
            "POST /api/query": "Ask a question about one document",
            "GET /api/documents": "List indexed documents",
            "GET /api/documents/:id": "Get document details",
            "GET /health": "Backend reachability"
        }
    }))
}
