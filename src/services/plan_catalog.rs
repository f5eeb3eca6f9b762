// Plan Catalog
// Single source of truth for per-plan daily prompt limits, block behaviour and validity

use chrono::Duration;
use serde::Serialize;

use crate::models::Plan;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Prompts a guest session may send before signing in
pub const GUEST_PROMPT_CAP: u32 = 2;

const MONTHLY_VALIDITY_DAYS: i64 = 30;
const LIFETIME_VALIDITY_DAYS: i64 = 3 * 365;

// =============================================================================
// PLAN POLICY
// =============================================================================

/// What the client should do when a plan's daily limit is hit
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockBehaviour {
    /// Send the user to pricing to upgrade
    UpgradeRequired,
    /// Nothing to buy; wait for the next calendar day
    ComeBackTomorrow,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlanPolicy {
    pub plan: Plan,
    pub daily_limit: u32,
    pub block_behaviour: BlockBehaviour,
    pub validity_days: Option<i64>,
    pub upgrade_to: Option<Plan>,
}

pub fn policy(plan: Plan) -> PlanPolicy {
    match plan {
        Plan::Free => PlanPolicy {
            plan,
            daily_limit: 20,
            block_behaviour: BlockBehaviour::UpgradeRequired,
            validity_days: None,
            upgrade_to: Some(Plan::Basic),
        },
        Plan::Basic => PlanPolicy {
            plan,
            daily_limit: 50,
            block_behaviour: BlockBehaviour::UpgradeRequired,
            validity_days: Some(MONTHLY_VALIDITY_DAYS),
            upgrade_to: Some(Plan::Creator),
        },
        Plan::Creator => PlanPolicy {
            plan,
            daily_limit: 363,
            block_behaviour: BlockBehaviour::ComeBackTomorrow,
            validity_days: Some(MONTHLY_VALIDITY_DAYS),
            upgrade_to: Some(Plan::Lifetime),
        },
        Plan::Lifetime => PlanPolicy {
            plan,
            daily_limit: 500,
            block_behaviour: BlockBehaviour::ComeBackTomorrow,
            validity_days: Some(LIFETIME_VALIDITY_DAYS),
            upgrade_to: None,
        },
    }
}

pub fn daily_limit(plan: Plan) -> u32 {
    policy(plan).daily_limit
}

/// How long a paid plan lasts after `plan_start_at`; `None` for free
pub fn validity_window(plan: Plan) -> Option<Duration> {
    policy(plan).validity_days.map(Duration::days)
}

/// Whether a block on this plan should send the client to pricing
pub fn redirects_to_pricing(plan: Plan) -> bool {
    policy(plan).block_behaviour == BlockBehaviour::UpgradeRequired
}

/// The whole table, in upgrade order
pub fn all_policies() -> Vec<PlanPolicy> {
    Plan::ALL.iter().copied().map(policy).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_limits() {
        assert_eq!(daily_limit(Plan::Free), 20);
        assert_eq!(daily_limit(Plan::Basic), 50);
        assert_eq!(daily_limit(Plan::Creator), 363);
        assert_eq!(daily_limit(Plan::Lifetime), 500);
    }

    #[test]
    fn test_block_behaviour() {
        assert!(redirects_to_pricing(Plan::Free));
        assert!(redirects_to_pricing(Plan::Basic));
        assert!(!redirects_to_pricing(Plan::Creator));
        assert!(!redirects_to_pricing(Plan::Lifetime));
    }

    #[test]
    fn test_validity_windows() {
        assert_eq!(validity_window(Plan::Free), None);
        assert_eq!(validity_window(Plan::Basic), Some(Duration::days(30)));
        assert_eq!(validity_window(Plan::Creator), Some(Duration::days(30)));
        assert_eq!(validity_window(Plan::Lifetime), Some(Duration::days(1095)));
    }

    #[test]
    fn test_limits_increase_along_upgrade_path() {
        let policies = all_policies();
        assert_eq!(policies.len(), 4);
        for pair in policies.windows(2) {
            assert!(pair[0].daily_limit < pair[1].daily_limit);
            assert_eq!(pair[0].upgrade_to, Some(pair[1].plan));
        }
    }
}
