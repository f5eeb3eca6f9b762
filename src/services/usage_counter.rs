// Usage Counter
// Daily prompt counter per signed-in user, reset on the server's local calendar day

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::db::{StoreError, UsageStore};
use crate::models::{DayWindow, Plan};
use crate::services::plan_catalog;

/// Today's usage against a plan
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageSnapshot {
    pub plan: Plan,
    pub used_today: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

pub struct UsageCounterService {
    store: Arc<dyn UsageStore>,
}

impl UsageCounterService {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Count one prompt and return the running total for today
    pub async fn increment_and_get(&self, user_id: &str) -> Result<u32, StoreError> {
        self.increment_and_get_at(user_id, Local::now()).await
    }

    /// Same as `increment_and_get` against an explicit clock
    #[instrument(skip(self, now))]
    pub async fn increment_and_get_at<Tz: TimeZone>(
        &self,
        user_id: &str,
        now: DateTime<Tz>,
    ) -> Result<u32, StoreError> {
        let day = DayWindow::containing(&now);
        self.store
            .increment_usage(user_id, now.with_timezone(&Utc), day)
            .await
            .map_err(|e| {
                error!("Failed to increment usage for {}: {}", user_id, e);
                e
            })
    }

    /// Read-only view of today's usage
    pub async fn snapshot(&self, user_id: &str, plan: Plan) -> Result<UsageSnapshot, StoreError> {
        self.snapshot_at(user_id, plan, Local::now()).await
    }

    pub async fn snapshot_at<Tz: TimeZone>(
        &self,
        user_id: &str,
        plan: Plan,
        now: DateTime<Tz>,
    ) -> Result<UsageSnapshot, StoreError> {
        let day = DayWindow::containing(&now);
        let counter = self.store.find_usage(user_id).await?;
        let used_today = counter
            .as_ref()
            .filter(|c| day.contains(c.updated_at))
            .map_or(0, |c| c.total);
        let daily_limit = plan_catalog::daily_limit(plan);

        Ok(UsageSnapshot {
            plan,
            used_today,
            daily_limit,
            remaining: daily_limit.saturating_sub(used_today),
            last_used_at: counter.map(|c| c.updated_at),
        })
    }
}
