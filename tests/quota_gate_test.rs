// Quota gate against the in-memory store: plan limits, guest cap and failure modes

use chrono::{Duration, Utc};
use moodgpt_backend::{
    db::MemoryStore,
    models::{NewUserProfile, Plan, User},
    services::{
        plan_catalog, BlockReason, GuestQuotaTracker, Identity, MemorySessionStateStore, QuotaGate,
        SignedInUser, UsageCounterService,
    },
    ChatError,
};
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    guests: Arc<GuestQuotaTracker>,
    gate: QuotaGate,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let guests = Arc::new(GuestQuotaTracker::new(Arc::new(
        MemorySessionStateStore::new(),
    )));
    let usage = Arc::new(UsageCounterService::new(store.clone()));
    let gate = QuotaGate::new(store.clone(), usage, guests.clone());
    Harness { store, guests, gate }
}

fn signed_in(uid: &str) -> Identity {
    Identity::SignedIn(SignedInUser {
        uid: uid.to_string(),
        email: None,
        display_name: None,
    })
}

async fn insert_user(store: &MemoryStore, uid: &str, plan: Plan) {
    let now = Utc::now();
    let mut user = User::new(
        &NewUserProfile {
            id: uid.to_string(),
            email: None,
            display_name: None,
        },
        now,
    );
    user.plan = plan;
    user.plan_start_at = plan.is_paid().then_some(now);
    store.insert_user(user).await;
}

#[tokio::test]
async fn test_free_user_blocked_after_daily_limit() {
    let h = harness();
    insert_user(&h.store, "free-user", Plan::Free).await;
    h.store.seed_usage("free-user", 19, Utc::now()).await;

    let last = h.gate.can_send(&signed_in("free-user"), "s").await.unwrap();
    assert!(last.allowed);
    assert_eq!(last.count, 20);
    assert_eq!(last.limit, 20);

    let blocked = h.gate.can_send(&signed_in("free-user"), "s").await.unwrap();
    assert!(!blocked.allowed);
    assert_eq!(blocked.count, 21);
    assert_eq!(blocked.reason, Some(BlockReason::Plan(Plan::Free)));

    let err = blocked.into_result().unwrap_err();
    assert_eq!(err.code(), "plan:free");
    assert_eq!(err.redirect(), Some("/pricing"));
}

#[tokio::test]
async fn test_creator_block_has_no_redirect() {
    let h = harness();
    insert_user(&h.store, "creator", Plan::Creator).await;
    h.store.seed_usage("creator", 363, Utc::now()).await;

    let decision = h.gate.can_send(&signed_in("creator"), "s").await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.limit, 363);

    let err = decision.into_result().unwrap_err();
    assert_eq!(err.code(), "plan:creator");
    assert_eq!(err.redirect(), None);
}

#[tokio::test]
async fn test_yesterdays_usage_does_not_block() {
    let h = harness();
    insert_user(&h.store, "returning", Plan::Free).await;
    h.store
        .seed_usage("returning", 40, Utc::now() - Duration::days(2))
        .await;

    let decision = h.gate.can_send(&signed_in("returning"), "s").await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.count, 1);
}

#[tokio::test]
async fn test_missing_user_row_counts_as_free() {
    let h = harness();

    let decision = h.gate.can_send(&signed_in("unknown"), "s").await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, 20);
}

#[tokio::test]
async fn test_every_plan_blocks_one_past_its_limit() {
    let h = harness();

    for plan in Plan::ALL {
        let uid = format!("user-{}", plan);
        insert_user(&h.store, &uid, plan).await;
        let limit = plan_catalog::daily_limit(plan);
        h.store.seed_usage(&uid, limit - 1, Utc::now()).await;

        let last = h.gate.can_send(&signed_in(&uid), "s").await.unwrap();
        assert!(last.allowed, "{} should allow attempt {}", plan, limit);
        assert_eq!(last.count, limit);

        let blocked = h.gate.can_send(&signed_in(&uid), "s").await.unwrap();
        assert!(!blocked.allowed, "{} should block attempt {}", plan, limit + 1);
        assert_eq!(blocked.count, limit + 1);
        assert_eq!(blocked.reason, Some(BlockReason::Plan(plan)));

        let err = blocked.into_result().unwrap_err();
        assert_eq!(err.code(), format!("plan:{}", plan));
        let expected_redirect = match plan {
            Plan::Free | Plan::Basic => Some("/pricing"),
            Plan::Creator | Plan::Lifetime => None,
        };
        assert_eq!(err.redirect(), expected_redirect, "{}", plan);
    }
}

#[tokio::test]
async fn test_guest_blocked_at_cap() {
    let h = harness();
    let guest = Identity::Guest;

    for expected in 1..=2 {
        let decision = h.gate.can_send(&guest, "guest-session").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, expected);
        assert_eq!(decision.limit, 2);
    }

    let blocked = h.gate.can_send(&guest, "guest-session").await.unwrap();
    assert!(!blocked.allowed);
    assert_eq!(blocked.reason, Some(BlockReason::SignInRequired));
    assert!(matches!(
        blocked.into_result(),
        Err(ChatError::SignInRequired { count: 2, limit: 2 })
    ));

    // Blocked attempts are not counted
    assert_eq!(h.guests.prompt_count("guest-session").await, 2);

    // Other sessions keep their own count
    assert!(h.gate.can_send(&guest, "other").await.unwrap().allowed);
}

#[tokio::test]
async fn test_concurrent_guest_sends_share_the_cap() {
    let h = Arc::new(harness());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.gate.can_send(&Identity::Guest, "shared").await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);
}

#[tokio::test]
async fn test_anonymous_identity_uses_guest_cap() {
    let h = harness();
    let anonymous = Identity::Anonymous {
        uid: "anon".to_string(),
    };
    h.guests.consume_prompt("anon-session").await;
    h.guests.consume_prompt("anon-session").await;

    let decision = h.gate.can_send(&anonymous, "anon-session").await.unwrap();
    assert_eq!(decision.reason, Some(BlockReason::SignInRequired));
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let h = harness();
    h.store.set_available(false);

    let result = h.gate.can_send(&signed_in("someone"), "s").await;
    assert!(matches!(result, Err(ChatError::StoreUnavailable(_))));
}
