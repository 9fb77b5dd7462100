//! Document upload endpoints

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::UploadResponse;

use super::upload_body_limit;

/// POST /api/upload - Index a document under a new id
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let (filename, data) = read_file_field(&state, multipart).await?;
    let response = state.pipeline().upload(data, filename).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /api/documents/:id - Re-index a document, replacing its chunks
pub async fn reupload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let (filename, data) = read_file_field(&state, multipart).await?;
    let response = state.pipeline().upload_as(id, data, filename).await?;
    Ok(Json(response))
}

/// Read the `file` field; other fields are ignored
async fn read_file_field(state: &AppState, mut multipart: Multipart) -> Result<(Option<String>, Bytes)> {
    let limit = state.config().pipeline.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        return Ok((filename, data));
    }

    Err(Error::invalid_document("Missing multipart field `file`"))
}

fn multipart_error(err: MultipartError, limit: u64) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // The body was cut off at the limit, so the true size is only known to exceed it
        return Error::DocumentTooLarge {
            size: upload_body_limit(limit) as u64,
            limit,
        };
    }
    Error::invalid_document(format!("Failed to read multipart upload: {}", err))
}
