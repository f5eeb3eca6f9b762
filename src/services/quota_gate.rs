// Quota Gate
// Decides, before anything is persisted, whether the caller may send another message

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::db::UserStore;
use crate::models::Plan;
use crate::services::guest_quota::{GuestQuotaTracker, PromptSlot};
use crate::services::identity::Identity;
use crate::services::plan_catalog;
use crate::services::usage_counter::UsageCounterService;
use crate::utils::ChatError;

pub const SIGNIN_REQUIRED: &str = "signin_required";

/// Why a send was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    SignInRequired,
    Plan(Plan),
}

impl BlockReason {
    /// Wire form: `signin_required` or `plan:<tier>`
    pub fn as_code(&self) -> String {
        match self {
            BlockReason::SignInRequired => SIGNIN_REQUIRED.to_string(),
            BlockReason::Plan(plan) => format!("plan:{}", plan),
        }
    }
}

impl Serialize for BlockReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    pub count: u32,
    pub limit: u32,
}

impl QuotaDecision {
    fn allow(count: u32, limit: u32) -> Self {
        Self {
            allowed: true,
            reason: None,
            count,
            limit,
        }
    }

    fn block(reason: BlockReason, count: u32, limit: u32) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            count,
            limit,
        }
    }

    /// Turn a block into the error the client sees
    pub fn into_result(self) -> Result<Self, ChatError> {
        match self.reason {
            None => Ok(self),
            Some(BlockReason::SignInRequired) => Err(ChatError::SignInRequired {
                count: self.count,
                limit: self.limit,
            }),
            Some(BlockReason::Plan(plan)) => Err(ChatError::QuotaExceeded {
                plan,
                count: self.count,
                limit: self.limit,
            }),
        }
    }
}

pub struct QuotaGate {
    users: Arc<dyn UserStore>,
    usage: Arc<UsageCounterService>,
    guests: Arc<GuestQuotaTracker>,
}

impl QuotaGate {
    pub fn new(
        users: Arc<dyn UserStore>,
        usage: Arc<UsageCounterService>,
        guests: Arc<GuestQuotaTracker>,
    ) -> Self {
        Self { users, usage, guests }
    }

    /// Signed-in callers consume a usage slot even when the attempt is blocked.
    /// Guests claim a prompt here too, so the check and the count are one step.
    /// Store failures surface as errors so the send fails closed.
    #[instrument(skip(self, identity))]
    pub async fn can_send(
        &self,
        identity: &Identity,
        session_id: &str,
    ) -> Result<QuotaDecision, ChatError> {
        match identity.signed_in() {
            Some(user) => {
                let plan = self
                    .users
                    .find_user(&user.uid)
                    .await?
                    .map(|u| u.plan)
                    .unwrap_or_default();
                let limit = plan_catalog::daily_limit(plan);
                let count = self.usage.increment_and_get(&user.uid).await?;

                if count > limit {
                    info!(
                        "User {} blocked on {} plan: {} of {}",
                        user.uid, plan, count, limit
                    );
                    return Ok(QuotaDecision::block(BlockReason::Plan(plan), count, limit));
                }
                debug!("User {} at {} of {}", user.uid, count, limit);
                Ok(QuotaDecision::allow(count, limit))
            },
            None => {
                let cap = self.guests.cap();
                match self.guests.consume_prompt(session_id).await {
                    PromptSlot::Granted(count) => Ok(QuotaDecision::allow(count, cap)),
                    PromptSlot::Exhausted(count) => {
                        info!("Guest session {} must sign in after {} prompts", session_id, count);
                        Ok(QuotaDecision::block(BlockReason::SignInRequired, count, cap))
                    },
                }
            },
        }
    }
}
