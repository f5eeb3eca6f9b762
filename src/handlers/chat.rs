// Chat endpoints: send a message, browse the persona catalogue

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    models::{mood::MOODS, HistoryEntry},
    services::{plan_catalog, Identity, SendRequest},
    utils::{validation::validate_session_id, ChatError},
};

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 8000, message = "Message is too long"))]
    pub content: String,
    pub mood_id: String,
    pub session_id: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Guest clients keep their own transcript and send it along
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Send one chat message
/// POST /api/v1/chat/messages
pub async fn send_message(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<SendMessageRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return ChatError::from(e).into_response();
    }
    let session_id = match validate_session_id(&request.session_id) {
        Ok(id) => id,
        Err(e) => return ChatError::BadRequest(e).into_response(),
    };

    let send = SendRequest {
        content: request.content,
        mood_id: request.mood_id,
        session_id,
        conversation_id: request.conversation_id,
        client_history: request.history,
    };

    match state.chat.send(&identity, send).await {
        Ok(outcome) => Json(json!({ "success": true, "data": outcome })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Persona catalogue and plan table for the client
/// GET /api/v1/moods
pub async fn list_moods() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "moods": MOODS,
            "plans": plan_catalog::all_policies(),
            "guest_prompt_cap": plan_catalog::GUEST_PROMPT_CAP
        }
    }))
}
