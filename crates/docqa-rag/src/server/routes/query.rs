//! Query endpoint

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /api/query - Answer a question about one document
pub async fn query_document(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(request) = payload.map_err(|e| Error::invalid_query(e.body_text()))?;

    tracing::info!("Query on {}: \"{}\"", request.document_id, request.question);
    let response = state.pipeline().query(request).await?;
    Ok(Json(response))
}
