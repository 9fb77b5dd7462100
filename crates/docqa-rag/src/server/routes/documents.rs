//! Document registry endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::DocumentRecord;

/// GET /api/documents - List indexed documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentRecord>> {
    Json(state.pipeline().registry().list())
}

/// GET /api/documents/:id - Get one document's record
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentRecord>> {
    state
        .pipeline()
        .registry()
        .get(id)
        .map(Json)
        .ok_or(Error::DocumentNotFound(id))
}
