//! HTTP routes over an in-memory pipeline

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use docqa_rag::server::{state::AppState, RagServer};

const BOUNDARY: &str = "docqa-test-boundary";

fn router() -> Router {
    let pipeline = pipeline_with(
        test_config(),
        three_page_document(),
        Arc::new(HashEmbedder::new()),
        Arc::new(ScriptedLlm::replying("It converts sunlight [Source 1].")),
    );
    RagServer::with_state(AppState::from_pipeline(Arc::new(pipeline))).router()
}

fn multipart(field: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
        b = BOUNDARY,
        field = field,
        filename = filename,
        content = content
    );
    Request::post("/api/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn query(body: Value) -> Request<Body> {
    Request::post("/api/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_upload_then_query() {
    let app = router();

    let response = app
        .clone()
        .oneshot(multipart("file", "paper.pdf", "%PDF-1.4 fixture"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let upload = json_body(response).await;
    assert_eq!(upload["status"], "indexed");
    assert_eq!(upload["chunks"], 7);

    let response = app
        .clone()
        .oneshot(query(json!({
            "document_id": upload["document_id"],
            "question": MATCHING_QUESTION,
            "top_k": 5
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let answer = json_body(response).await;
    assert_eq!(answer["citations"][0]["page"], 2);
    assert_eq!(answer["citations"][0]["section"], "Results");

    let response = app
        .oneshot(Request::get("/api/documents").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let documents = json_body(response).await;
    assert_eq!(documents.as_array().map(Vec::len), Some(1));
    assert_eq!(documents[0]["filename"], "paper.pdf");
}

#[tokio::test]
async fn test_unknown_document_is_404() {
    let response = router()
        .oneshot(query(json!({
            "document_id": uuid::Uuid::new_v4(),
            "question": MATCHING_QUESTION
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["reason"], "document-not-found");
}

#[tokio::test]
async fn test_upload_without_file_field_is_400() {
    let response = router()
        .oneshot(multipart("attachment", "paper.pdf", "%PDF-1.4 fixture"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["reason"], "invalid-format");
}

#[tokio::test]
async fn test_malformed_query_body_is_invalid_query() {
    let response = router()
        .oneshot(
            Request::post("/api/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"document_id\": \"not-a-uuid\""))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["reason"], "invalid-query");
    assert_eq!(body["error"]["type"], "invalid_query");
}
