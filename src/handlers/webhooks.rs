// Payment gateway webhooks

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

use crate::{
    app::AppState,
    models::SkipCashPayload,
    utils::{webhook_signature, ChatError},
};

/// SkipCash payment notification, signed in the Authorization header
/// POST /api/v1/webhooks/skipcash
pub async fn skipcash_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let raw: JsonValue = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return ChatError::BadRequest(format!("Invalid JSON: {}", e)).into_response(),
    };
    let payload: SkipCashPayload = match serde_json::from_value(raw.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            return ChatError::BadRequest(format!("Invalid webhook payload: {}", e))
                .into_response()
        },
    };
    info!(
        "SkipCash webhook received for payment {} (status {})",
        payload.payment_id, payload.status_id
    );

    let Some(key) = state.webhook_key.as_deref() else {
        error!("SKIPCASH_WEBHOOK_KEY is not configured; rejecting webhook");
        return ChatError::InvalidSignature.into_response();
    };

    let signature = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !webhook_signature::verify(key, &payload, signature) {
        warn!("Invalid webhook signature for payment {}", payload.payment_id);
        return ChatError::InvalidSignature.into_response();
    }

    match state.subscriptions.apply_payment_event(&payload, raw).await {
        Ok(outcome) => Json(json!({ "success": true, "status": outcome })).into_response(),
        Err(e) => e.into_response(),
    }
}
