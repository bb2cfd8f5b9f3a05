// src/api/http/uploads.rs
// Text document uploads: chunk, embed, and store for RAG

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::chat::chunk_document;
use crate::error::LumenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub content: String,
}

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<Json<Value>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let session = map_core(&state, state.memory.get_session(&session_id).await)?
        .ok_or_else(|| api_err(&state, LumenError::not_found(format!("session {session_id}"))))?;
    if session.owner_user_id != user.id {
        return Err(api_err(&state, LumenError::forbidden("not the session owner")));
    }

    if req.content.trim().is_empty() {
        return Err(api_err(&state, LumenError::validation("document is empty")));
    }

    let file_id = Uuid::new_v4().to_string();
    let chunks = chunk_document(&state.embedder, &file_id, &req.filename, &req.content).await;
    let chunk_count = chunks.len();

    map_core(
        &state,
        state.memory.store_document_chunks(&session_id, &chunks).await,
    )?;

    Ok(envelope(
        json!({
            "file_id": file_id,
            "filename": req.filename,
            "chunks": chunk_count,
        }),
        "Document stored for retrieval",
    ))
}
