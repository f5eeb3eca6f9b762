// Conversation endpoints
// Threads are owned by signed-in users; guests only ever get the "no conversation" answer

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::RequireUser,
    models::mood,
    services::Identity,
    utils::{trim_optional_field, validation::validate_session_id, ChatError},
};

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub mood_id: String,
    pub session_id: String,
    #[serde(default)]
    pub force_new: bool,
}

/// Resume the latest thread for a mood or start one
/// POST /api/v1/conversations
pub async fn open_conversation(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<OpenConversationRequest>,
) -> Result<impl IntoResponse, ChatError> {
    if mood::find(&request.mood_id).is_none() {
        return Err(ChatError::InvalidMood(request.mood_id));
    }
    let session_id = validate_session_id(&request.session_id).map_err(ChatError::BadRequest)?;

    let conversation_id = state
        .conversations
        .get_or_create(
            identity.owner_uid(),
            &request.mood_id,
            &session_id,
            request.force_new,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "conversation_id": conversation_id }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub mood_id: Option<String>,
    pub limit: Option<i64>,
}

/// Sidebar listing, most recently active first
/// GET /api/v1/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<ListConversationsQuery>,
) -> Result<impl IntoResponse, ChatError> {
    let mood_id = trim_optional_field(query.mood_id.as_deref());
    let conversations = state
        .conversations
        .list(&user.uid, mood_id.as_deref(), query.limit)
        .await?;

    Ok(Json(json!({ "success": true, "data": conversations })))
}

/// GET /api/v1/conversations/{id}/messages
pub async fn get_messages(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    let messages = state.conversations.history(&user.uid, conversation_id).await?;
    Ok(Json(json!({ "success": true, "data": messages })))
}

/// DELETE /api/v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    state.conversations.delete(&user.uid, conversation_id).await?;
    info!("User {} deleted conversation {}", user.uid, conversation_id);
    Ok(StatusCode::NO_CONTENT)
}
