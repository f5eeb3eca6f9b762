// HTTP handlers for the MoodGPT API

pub mod chat;
pub mod conversations;
pub mod session;
pub mod webhooks;

use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};

// Routes that act on behalf of the caller's identity
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/moods", get(chat::list_moods))
        .route("/session", post(session::establish_session))
        .route("/usage", get(session::get_usage))
        .route("/chat/messages", post(chat::send_message))
        .route(
            "/conversations",
            post(conversations::open_conversation).get(conversations::list_conversations),
        )
        .route(
            "/conversations/{id}",
            axum::routing::delete(conversations::delete_conversation),
        )
        .route("/conversations/{id}/messages", get(conversations::get_messages))
}

// Server-to-server callbacks; these carry their own signatures instead of identity tokens
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/skipcash", post(webhooks::skipcash_webhook))
}
