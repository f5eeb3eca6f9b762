// Session establishment and usage endpoints

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    app::AppState,
    models::Plan,
    services::{plan_catalog, Identity},
    utils::{validation::validate_session_id, ChatError},
};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// Establish the caller's session
/// POST /api/v1/session
pub async fn establish_session(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<SessionRequest>,
) -> impl IntoResponse {
    let session_id = match validate_session_id(&request.session_id) {
        Ok(id) => id,
        Err(e) => return ChatError::BadRequest(e).into_response(),
    };

    match state
        .subscriptions
        .establish_session(&identity, &session_id)
        .await
    {
        Ok(info) => Json(json!({ "success": true, "data": info })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GuestUsage {
    pub plan: Plan,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

/// Today's usage: the daily counter for users, the prompt allowance for guests
/// GET /api/v1/usage
pub async fn get_usage(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UsageQuery>,
) -> Result<impl IntoResponse, ChatError> {
    if let Some(user) = identity.signed_in() {
        let plan = state
            .users
            .find_user(&user.uid)
            .await?
            .map(|u| u.plan)
            .unwrap_or_default();
        let snapshot = state.usage.snapshot(&user.uid, plan).await?;
        let upgrade_to = plan_catalog::policy(plan).upgrade_to;

        return Ok(Json(json!({
            "success": true,
            "data": snapshot,
            "upgrade_to": upgrade_to
        })));
    }

    let session_id = query
        .session_id
        .as_deref()
        .ok_or_else(|| ChatError::BadRequest("session_id is required for guests".to_string()))
        .and_then(|id| validate_session_id(id).map_err(ChatError::BadRequest))?;

    let used = state.guests.prompt_count(&session_id).await;
    let limit = state.guests.cap();
    Ok(Json(json!({
        "success": true,
        "data": GuestUsage {
            plan: Plan::Free,
            used,
            limit,
            remaining: limit.saturating_sub(used),
        },
        "upgrade_to": null
    })))
}
