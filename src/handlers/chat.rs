use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{ConversationRecord, Stage};
use crate::services::conversation;
use crate::state::AppState;

// POST /api/chat
#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    session_id: String,
    reply: String,
    stage: Stage,
    record: ConversationRecord,
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = match body.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let outcome = conversation::process_message(&state, &session_id, message).await?;

    Ok(Json(ChatResponse {
        session_id,
        reply: outcome.reply,
        stage: outcome.stage,
        record: outcome.record,
    }))
}

// GET /api/chat/:session_id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationRecord>, AppError> {
    conversation::get_record(&state, &session_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
}

// POST /api/chat/:session_id/reset
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = conversation::reset_conversation(&state, &session_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })))
}
