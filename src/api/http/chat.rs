// src/api/http/chat.rs
// SSE chat streaming and model listing

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiResult, api_err, authenticate, envelope, map_core};
use crate::auth::RouteFamily;
use crate::chat::ChatStreamEvent;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub model: Option<String>,
}

/// Stream a chat completion as server-sent events:
///
/// ```text
/// data: [START]
///
/// data: {"content":"..."}
///
/// data: {"done": true, "message_id":"..."}
/// ```
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user = authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    map_core(
        &state,
        state
            .fabric
            .check_rate_limit(RouteFamily::Route, &user.id, &user.id)
            .await,
    )?;

    let stream = map_core(
        &state,
        state
            .chat
            .send_message(&session_id, &user.id, &req.content, req.model)
            .await,
    )?;

    let sse_stream = stream.map(|event| {
        let frame = match event {
            ChatStreamEvent::Start => Event::default().data("[START]"),
            ChatStreamEvent::Content(chunk) => {
                Event::default().data(json!({ "content": chunk }).to_string())
            }
            ChatStreamEvent::Done { message_id } => Event::default().data(
                json!({ "done": true, "message_id": message_id.to_string() }).to_string(),
            ),
            ChatStreamEvent::Error(message) => {
                Event::default().data(json!({ "error": message }).to_string())
            }
        };
        Ok(frame)
    });

    Ok(Sse::new(sse_stream))
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    authenticate(&state, &headers)
        .await
        .map_err(|e| api_err(&state, e))?;

    let models = map_core(&state, state.chat.list_models().await)?;
    Ok(envelope(models, "Models listed"))
}
