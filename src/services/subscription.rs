// Subscription Lifecycle Service
// Session establishment (lazy user creation, plan expiry) and payment-driven plan changes

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::db::{PaymentEventStore, UserStore};
use crate::models::payment::{STATUS_FAILED, STATUS_PAID};
use crate::models::{PaymentEvent, Plan, SkipCashPayload, SubStatus, User, UserUpdate};
use crate::services::guest_quota::GuestQuotaTracker;
use crate::services::identity::Identity;
use crate::utils::ChatError;

// =============================================================================
// RESULT TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Guest,
    Anonymous,
    User,
}

/// What the client learns when it (re)establishes a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub kind: SessionKind,
    pub user: Option<User>,
    pub plan: Plan,
    /// True when this call downgraded an expired paid plan
    pub downgraded: bool,
    pub guest_prompts_used: u32,
    pub guest_prompt_cap: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Processed,
    Duplicate,
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct SubscriptionService {
    users: Arc<dyn UserStore>,
    payments: Arc<dyn PaymentEventStore>,
    guests: Arc<GuestQuotaTracker>,
}

impl SubscriptionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        payments: Arc<dyn PaymentEventStore>,
        guests: Arc<GuestQuotaTracker>,
    ) -> Self {
        Self {
            users,
            payments,
            guests,
        }
    }

    /// Create the user on first sight, stamp the login, downgrade an expired
    /// paid plan and clear the browser session's guest count.
    #[instrument(skip(self, identity))]
    pub async fn establish_session(
        &self,
        identity: &Identity,
        session_id: &str,
    ) -> Result<SessionInfo, ChatError> {
        let Some(signed_in) = identity.signed_in() else {
            let kind = match identity {
                Identity::Anonymous { .. } => SessionKind::Anonymous,
                _ => SessionKind::Guest,
            };
            return Ok(SessionInfo {
                kind,
                user: None,
                plan: Plan::Free,
                downgraded: false,
                guest_prompts_used: self.guests.prompt_count(session_id).await,
                guest_prompt_cap: self.guests.cap(),
            });
        };

        self.guests.reset(session_id).await;

        let now = Utc::now();
        let mut user = self.users.upsert_on_login(&signed_in.profile(), now).await?;
        let mut downgraded = false;

        if user.is_plan_expired(now) {
            info!("Plan {} expired for user {}, downgrading to free", user.plan, user.id);
            user = self.users.update_user(&user.id, &Self::downgrade(), now).await?;
            downgraded = true;
        }

        Ok(SessionInfo {
            kind: SessionKind::User,
            plan: user.plan,
            user: Some(user),
            downgraded,
            guest_prompts_used: 0,
            guest_prompt_cap: self.guests.cap(),
        })
    }

    fn downgrade() -> UserUpdate {
        UserUpdate {
            plan: Some(Plan::Free),
            plan_start_at: Some(None),
            ..Default::default()
        }
    }

    /// Translate a gateway event into a user update
    pub fn update_for_payment(payload: &SkipCashPayload, now: DateTime<Utc>) -> Option<UserUpdate> {
        match payload.status_id {
            STATUS_PAID => {
                let plan = match payload.plan_name().map(Plan::from_str) {
                    Some(Ok(plan)) => Some(plan),
                    Some(Err(e)) => {
                        warn!("Payment {} names an unknown plan: {}", payload.payment_id, e);
                        None
                    },
                    None => None,
                };

                // A subscription charge or a one-off purchase of a known plan
                if payload.subscription_id().is_none() && plan.is_none() {
                    return None;
                }

                Some(UserUpdate {
                    plan,
                    plan_start_at: plan.filter(Plan::is_paid).map(|_| Some(now)),
                    sub_status: Some(SubStatus::Active),
                    subscription_id: payload.subscription_id().map(str::to_string),
                    last_payment_at: Some(now),
                    ..Default::default()
                })
            },
            STATUS_FAILED => Some(UserUpdate {
                plan: Some(Plan::Free),
                sub_status: Some(SubStatus::Failed),
                ..Default::default()
            }),
            _ => None,
        }
    }

    /// Record the event once per payment id and apply its plan change
    #[instrument(skip(self, payload, raw), fields(payment_id = %payload.payment_id))]
    pub async fn apply_payment_event(
        &self,
        payload: &SkipCashPayload,
        raw: JsonValue,
    ) -> Result<PaymentOutcome, ChatError> {
        let now = Utc::now();
        let event = PaymentEvent::from_payload(payload, raw, now);
        let update = Self::update_for_payment(payload, now);

        if event.user_id.is_none() {
            warn!("Payment {} carries no user id, recording only", payload.payment_id);
        }

        let recorded = self
            .payments
            .apply_payment_event(&event, update.as_ref(), now)
            .await?;

        if !recorded {
            info!("Duplicate payment {}, skipping", payload.payment_id);
            return Ok(PaymentOutcome::Duplicate);
        }

        match (&event.user_id, &update) {
            (Some(uid), Some(update)) => info!(
                "Payment {} (status {}) applied to user {}: plan {:?}, status {:?}",
                payload.payment_id, payload.status_id, uid, update.plan, update.sub_status
            ),
            _ => info!(
                "Payment {} (status {}) recorded without a plan change",
                payload.payment_id, payload.status_id
            ),
        }
        Ok(PaymentOutcome::Processed)
    }
}
