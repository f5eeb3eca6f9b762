// Error taxonomy for the chat and quota API
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::models::Plan;
use crate::services::plan_catalog;

pub const PRICING_PATH: &str = "/pricing";
pub const AUTH_PATH: &str = "/auth";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Daily message limit reached for the {plan} plan")]
    QuotaExceeded { plan: Plan, count: u32, limit: u32 },

    #[error("Sign in to keep chatting")]
    SignInRequired { count: u32, limit: u32 },

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Unknown mood: {0}")]
    InvalidMood(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("A message is already being sent in this conversation")]
    SendInFlight,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Conversation belongs to another user")]
    Forbidden,

    #[error("Could not start a conversation: {0}")]
    ConversationCreateFailed(String),

    #[error("The assistant could not reply: {0}")]
    CompletionFailed(String),

    #[error("Storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ChatError::SignInRequired { .. } => StatusCode::UNAUTHORIZED,
            ChatError::EmptyMessage | ChatError::InvalidMood(_) | ChatError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            },
            ChatError::SendInFlight => StatusCode::CONFLICT,
            ChatError::ConversationNotFound => StatusCode::NOT_FOUND,
            ChatError::Forbidden => StatusCode::FORBIDDEN,
            ChatError::ConversationCreateFailed(_) | ChatError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            ChatError::CompletionFailed(_) => StatusCode::BAD_GATEWAY,
            ChatError::Unauthorized(_) | ChatError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ChatError::Database(_) | ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> String {
        match self {
            ChatError::QuotaExceeded { plan, .. } => format!("plan:{}", plan),
            ChatError::SignInRequired { .. } => "signin_required".to_string(),
            ChatError::EmptyMessage => "empty_message".to_string(),
            ChatError::InvalidMood(_) => "invalid_mood".to_string(),
            ChatError::BadRequest(_) => "bad_request".to_string(),
            ChatError::SendInFlight => "send_in_flight".to_string(),
            ChatError::ConversationNotFound => "conversation_not_found".to_string(),
            ChatError::Forbidden => "forbidden".to_string(),
            ChatError::ConversationCreateFailed(_) => "conversation_create_failed".to_string(),
            ChatError::CompletionFailed(_) => "completion_failed".to_string(),
            ChatError::StoreUnavailable(_) => "store_unavailable".to_string(),
            ChatError::Unauthorized(_) => "unauthorized".to_string(),
            ChatError::InvalidSignature => "invalid_signature".to_string(),
            ChatError::Database(_) => "database_error".to_string(),
            ChatError::Internal(_) => "internal_error".to_string(),
        }
    }

    /// Where the client should navigate, if anywhere
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            ChatError::QuotaExceeded { plan, .. } if plan_catalog::redirects_to_pricing(*plan) => {
                Some(PRICING_PATH)
            },
            ChatError::SignInRequired { .. } => Some(AUTH_PATH),
            _ => None,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ChatError::QuotaExceeded { plan, limit, .. }
                if plan_catalog::redirects_to_pricing(*plan) =>
            {
                format!(
                    "You've used all {} messages on the {} plan today. Upgrade to keep chatting.",
                    limit, plan
                )
            },
            ChatError::QuotaExceeded { limit, .. } => format!(
                "You've used all {} messages for today. Come back tomorrow.",
                limit
            ),
            // Internal details stay in the logs
            ChatError::Database(_) | ChatError::Internal(_) => "Internal server error".to_string(),
            ChatError::StoreUnavailable(_) => {
                "Storage is temporarily unavailable. Please try again.".to_string()
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.client_message();

        let mut body = json!({
            "error": message,
            "code": self.code(),
            "message": message,
            "redirect": self.redirect(),
            "status": status.as_u16()
        });

        if let ChatError::QuotaExceeded { count, limit, .. }
        | ChatError::SignInRequired { count, limit } = &self
        {
            body["count"] = json!(count);
            body["limit"] = json!(limit);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ChatError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(msg) => ChatError::StoreUnavailable(msg),
            StoreError::NotFound => ChatError::ConversationNotFound,
            StoreError::Query(msg) => ChatError::Database(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ChatError {
    fn from(error: validator::ValidationErrors) -> Self {
        ChatError::BadRequest(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_redirects_by_plan() {
        let free = ChatError::QuotaExceeded { plan: Plan::Free, count: 21, limit: 20 };
        let creator = ChatError::QuotaExceeded { plan: Plan::Creator, count: 364, limit: 363 };

        assert_eq!(free.code(), "plan:free");
        assert_eq!(free.redirect(), Some(PRICING_PATH));
        assert_eq!(creator.code(), "plan:creator");
        assert_eq!(creator.redirect(), None);
        assert_eq!(free.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_signin_required() {
        let err = ChatError::SignInRequired { count: 2, limit: 2 };
        assert_eq!(err.code(), "signin_required");
        assert_eq!(err.redirect(), Some(AUTH_PATH));
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ChatError::from(StoreError::Unavailable("x".into())),
            ChatError::StoreUnavailable(_)
        ));
        assert!(matches!(
            ChatError::from(StoreError::NotFound),
            ChatError::ConversationNotFound
        ));
        assert_eq!(
            ChatError::CompletionFailed("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
