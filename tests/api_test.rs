// HTTP surface: health, catalogue, sessions, usage, conversations and identity handling

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{session_id, setup_test_app, TestApp};
use moodgpt_backend::models::{NewUserProfile, Plan, User};
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_check() {
    let app = setup_test_app().await;

    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["store"]["backend"], "memory");

    app.store.set_available(false);
    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await;
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_moods_and_plans_catalogue() {
    let app = setup_test_app().await;

    let body: Value = app.get("/api/v1/moods").send().await.json().await;
    let moods = body["data"]["moods"].as_array().unwrap();
    assert!(moods.iter().any(|m| m["id"] == "sassy"));

    let plans = body["data"]["plans"].as_array().unwrap();
    let limits: Vec<u64> = plans
        .iter()
        .map(|p| p["daily_limit"].as_u64().unwrap())
        .collect();
    assert_eq!(limits, vec![20, 50, 363, 500]);
    assert_eq!(body["data"]["guest_prompt_cap"], 2);
}

#[tokio::test]
async fn test_guest_session_reports_prompt_allowance() {
    let app = setup_test_app().await;
    let session = session_id();

    app.post("/api/v1/chat/messages")
        .json(&json!({ "content": "hi", "mood_id": "annoyed", "session_id": session }))
        .send()
        .await;

    let body: Value = app
        .post("/api/v1/session")
        .json(&json!({ "session_id": session }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["data"]["kind"], "guest");
    assert_eq!(body["data"]["guest_prompts_used"], 1);
    assert_eq!(body["data"]["guest_prompt_cap"], 2);

    let usage: Value = app
        .get(&format!("/api/v1/usage?session_id={}", session))
        .send()
        .await
        .json()
        .await;
    assert_eq!(usage["data"]["used"], 1);
    assert_eq!(usage["data"]["remaining"], 1);

    let missing = app.get("/api/v1/usage").send().await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sign_in_clears_guest_count_and_creates_user() {
    let app = setup_test_app().await;
    let session = session_id();

    for _ in 0..2 {
        app.post("/api/v1/chat/messages")
            .json(&json!({ "content": "hi", "mood_id": "annoyed", "session_id": session }))
            .send()
            .await;
    }

    let token = app.user_token("olivia");
    let body: Value = app
        .post("/api/v1/session")
        .bearer(&token)
        .json(&json!({ "session_id": session }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["data"]["kind"], "user");
    assert_eq!(body["data"]["plan"], "free");
    assert_eq!(body["data"]["downgraded"], false);
    assert_eq!(body["data"]["user"]["email"], "olivia@example.com");

    let guest_usage: Value = app
        .get(&format!("/api/v1/usage?session_id={}", session))
        .send()
        .await
        .json()
        .await;
    assert_eq!(guest_usage["data"]["used"], 0);
}

#[tokio::test]
async fn test_expired_plan_is_downgraded_on_session() {
    let app = setup_test_app().await;
    let now = Utc::now();
    let mut user = User::new(
        &NewUserProfile {
            id: "peggy".to_string(),
            email: None,
            display_name: None,
        },
        now - Duration::days(40),
    );
    user.plan = Plan::Basic;
    user.plan_start_at = Some(now - Duration::days(31));
    app.store.insert_user(user).await;

    let token = app.user_token("peggy");
    let body: Value = app
        .post("/api/v1/session")
        .bearer(&token)
        .json(&json!({ "session_id": session_id() }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["data"]["plan"], "free");
    assert_eq!(body["data"]["downgraded"], true);
    assert_eq!(body["data"]["user"]["plan_start_at"], Value::Null);

    // A second session sees the already downgraded plan
    let again: Value = app
        .post("/api/v1/session")
        .bearer(&token)
        .json(&json!({ "session_id": session_id() }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(again["data"]["downgraded"], false);
}

#[tokio::test]
async fn test_signed_in_usage_snapshot() {
    let app = setup_test_app().await;
    let token = app.user_token("quentin");
    app.store.seed_usage("quentin", 5, Utc::now()).await;

    let body: Value = app.get("/api/v1/usage").bearer(&token).send().await.json().await;
    assert_eq!(body["data"]["plan"], "free");
    assert_eq!(body["data"]["used_today"], 5);
    assert_eq!(body["data"]["remaining"], 15);
    assert_eq!(body["upgrade_to"], "basic");
}

async fn open_conversation(app: &TestApp, token: &str, session: &str, force_new: bool) -> Value {
    app.post("/api/v1/conversations")
        .bearer(token)
        .json(&json!({ "mood_id": "cute", "session_id": session, "force_new": force_new }))
        .send()
        .await
        .json()
        .await
}

#[tokio::test]
async fn test_open_list_and_delete_conversations() {
    let app = setup_test_app().await;
    let token = app.user_token("rupert");
    let session = session_id();

    let first = open_conversation(&app, &token, &session, false).await;
    let first_id = first["data"]["conversation_id"].as_str().unwrap().to_string();
    let resumed = open_conversation(&app, &token, &session, false).await;
    assert_eq!(resumed["data"]["conversation_id"], first_id.as_str());
    let fresh = open_conversation(&app, &token, &session, true).await;
    assert_ne!(fresh["data"]["conversation_id"], first_id.as_str());

    let listed: Value = app
        .get("/api/v1/conversations?mood_id=cute&limit=1")
        .bearer(&token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["title"], "New chat");

    let deleted = app
        .delete(&format!("/api/v1/conversations/{}", first_id))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = app
        .get(&format!("/api/v1/conversations/{}/messages", first_id))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let stranger = app.user_token("sybil");
    let fresh_id = fresh["data"]["conversation_id"].as_str().unwrap();
    let forbidden = app
        .delete(&format!("/api/v1/conversations/{}", fresh_id))
        .bearer(&stranger)
        .send()
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_guests_have_no_conversations() {
    let app = setup_test_app().await;

    let opened: Value = app
        .post("/api/v1/conversations")
        .json(&json!({ "mood_id": "cute", "session_id": session_id() }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(opened["data"]["conversation_id"], Value::Null);

    let listed = app.get("/api/v1/conversations").send().await;
    assert_eq!(listed.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = setup_test_app().await;

    let garbage = app
        .get("/api/v1/usage")
        .bearer("not-a-token")
        .send()
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    let body: Value = garbage.json().await;
    assert_eq!(body["code"], "unauthorized");

    let scheme = app
        .get("/api/v1/moods")
        .header("authorization", "Basic abc")
        .send()
        .await;
    assert_eq!(scheme.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_token_is_treated_as_guest() {
    let app = setup_test_app().await;
    let token = app.anonymous_token("anon-1");
    let session = session_id();

    let body: Value = app
        .post("/api/v1/session")
        .bearer(&token)
        .json(&json!({ "session_id": session }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(body["data"]["kind"], "anonymous");
    assert_eq!(body["data"]["user"], Value::Null);

    let sent: Value = app
        .post("/api/v1/chat/messages")
        .bearer(&token)
        .json(&json!({ "content": "hello", "mood_id": "funny", "session_id": session }))
        .send()
        .await
        .json()
        .await;
    assert_eq!(sent["data"]["conversation_id"], Value::Null);
    assert_eq!(sent["data"]["quota"]["limit"], 2);

    let listed = app.get("/api/v1/conversations").bearer(&token).send().await;
    assert_eq!(listed.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight_reflects_origin() {
    let app = setup_test_app().await;

    let response = app
        .post("/api/v1/chat/messages")
        .header("origin", "http://localhost:3000")
        .send()
        .await;
    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("http://localhost:3000")
    );

    let preflight = app
        .options("/api/v1/chat/messages")
        .header("origin", "http://localhost:3000")
        .send()
        .await;
    assert_eq!(preflight.status(), StatusCode::OK);
    assert_eq!(
        preflight.header("access-control-allow-credentials").as_deref(),
        Some("true")
    );
}
