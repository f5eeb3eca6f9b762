// SkipCash webhook: signature checks, plan changes and duplicate deliveries

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, TestApp, TEST_WEBHOOK_KEY};
use moodgpt_backend::{
    db::UserStore,
    models::{Plan, SkipCashPayload, SubStatus},
    utils::webhook_signature,
};
use serde_json::Value;

fn payment(payment_id: &str, status_id: i32, uid: &str, plan: &str) -> SkipCashPayload {
    SkipCashPayload {
        payment_id: payment_id.to_string(),
        amount: "9.99".to_string(),
        status_id,
        transaction_id: Some(uid.to_string()),
        custom1: Some(plan.to_string()),
        visa_id: "4111".to_string(),
        token_id: None,
        recurring_subscription_id: Some("sub-123".to_string()),
    }
}

async fn deliver(app: &TestApp, payload: &SkipCashPayload, signature: &str) -> (StatusCode, Value) {
    let response = app
        .post("/api/v1/webhooks/skipcash")
        .header("authorization", signature)
        .json(payload)
        .send()
        .await;
    let status = response.status();
    (status, response.json().await)
}

#[tokio::test]
async fn test_paid_webhook_upgrades_plan() {
    let app = setup_test_app().await;
    let payload = payment("pay-1", 2, "ivan", "basic");
    let signature = webhook_signature::sign(TEST_WEBHOOK_KEY, &payload);

    let (status, body) = deliver(&app, &payload, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");

    let user = app.store.find_user("ivan").await.unwrap().expect("user created");
    assert_eq!(user.plan, Plan::Basic);
    assert_eq!(user.sub_status, Some(SubStatus::Active));
    assert_eq!(user.subscription_id.as_deref(), Some("sub-123"));
    assert!(user.plan_start_at.is_some());
    assert!(user.last_payment_at.is_some());

    // The new plan applies to the next send
    let token = app.user_token("ivan");
    let usage: Value = app.get("/api/v1/usage").bearer(&token).send().await.json().await;
    assert_eq!(usage["data"]["daily_limit"], 50);
}

#[tokio::test]
async fn test_duplicate_delivery_is_ignored() {
    let app = setup_test_app().await;
    let payload = payment("pay-dup", 2, "judy", "creator");
    let signature = webhook_signature::sign(TEST_WEBHOOK_KEY, &payload);

    let (_, first) = deliver(&app, &payload, &signature).await;
    assert_eq!(first["status"], "processed");

    // A later failure notice under the same payment id changes nothing
    let replay = SkipCashPayload {
        status_id: 4,
        ..payload.clone()
    };
    let replay_signature = webhook_signature::sign(TEST_WEBHOOK_KEY, &replay);
    let (status, second) = deliver(&app, &replay, &replay_signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "duplicate");

    assert_eq!(app.store.payment_event_count().await, 1);
    let user = app.store.find_user("judy").await.unwrap().unwrap();
    assert_eq!(user.plan, Plan::Creator);
}

#[tokio::test]
async fn test_failed_payment_downgrades() {
    let app = setup_test_app().await;
    let paid = payment("pay-a", 2, "ken", "lifetime");
    deliver(&app, &paid, &webhook_signature::sign(TEST_WEBHOOK_KEY, &paid)).await;

    let failed = payment("pay-b", 4, "ken", "lifetime");
    let (status, body) =
        deliver(&app, &failed, &webhook_signature::sign(TEST_WEBHOOK_KEY, &failed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");

    let user = app.store.find_user("ken").await.unwrap().unwrap();
    assert_eq!(user.plan, Plan::Free);
    assert_eq!(user.sub_status, Some(SubStatus::Failed));
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let app = setup_test_app().await;
    let payload = payment("pay-forged", 2, "mallory", "lifetime");

    let forged = webhook_signature::sign("some-other-key", &payload);
    let (status, body) = deliver(&app, &payload, &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_signature");

    // Signature over different content
    let original = webhook_signature::sign(TEST_WEBHOOK_KEY, &payload);
    let tampered = SkipCashPayload {
        amount: "0.01".to_string(),
        ..payload.clone()
    };
    let (status, _) = deliver(&app, &tampered, &original).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = deliver(&app, &payload, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.store.payment_event_count().await, 0);
    assert!(app.store.find_user("mallory").await.unwrap().is_none());
}

#[tokio::test]
async fn test_other_statuses_are_recorded_only() {
    let app = setup_test_app().await;
    let pending = payment("pay-pending", 1, "nina", "basic");

    let (status, body) =
        deliver(&app, &pending, &webhook_signature::sign(TEST_WEBHOOK_KEY, &pending)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");
    assert_eq!(app.store.payment_event_count().await, 1);
    assert!(app.store.find_user("nina").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = setup_test_app().await;

    let response = app
        .post("/api/v1/webhooks/skipcash")
        .header("content-type", "application/json")
        .header("authorization", "irrelevant")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
