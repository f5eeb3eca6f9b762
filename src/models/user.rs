// User Database Model
// Users are keyed by the identity provider's stable id and created lazily

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::users;
use crate::services::plan_catalog;

/// Subscription plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Creator,
    Lifetime,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Creator, Plan::Lifetime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Creator => "creator",
            Plan::Lifetime => "lifetime",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "basic" => Ok(Plan::Basic),
            "creator" => Ok(Plan::Creator),
            "lifetime" => Ok(Plan::Lifetime),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription status as reported by payment events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubStatus {
    Active,
    Cancelled,
    Failed,
}

impl SubStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubStatus::Active => "active",
            SubStatus::Cancelled => "cancelled",
            SubStatus::Failed => "failed",
        }
    }
}

impl FromStr for SubStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubStatus::Active),
            "cancelled" | "canceled" => Ok(SubStatus::Cancelled),
            "failed" => Ok(SubStatus::Failed),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

/// User row as stored
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: String,
    pub plan_start_at: Option<DateTime<Utc>>,
    pub sub_status: Option<String>,
    pub subscription_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub sub_status_updated_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRecord<'a> {
    pub id: &'a str,
    pub email: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub plan: &'a str,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a stored user
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChangeset {
    pub plan: Option<String>,
    pub plan_start_at: Option<Option<DateTime<Utc>>>,
    pub sub_status: Option<Option<String>>,
    pub subscription_id: Option<Option<String>>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub sub_status_updated_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile captured from the identity token at first sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserProfile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Domain-level user update, storage independent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub plan: Option<Plan>,
    pub plan_start_at: Option<Option<DateTime<Utc>>>,
    pub sub_status: Option<SubStatus>,
    pub subscription_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserUpdate {
    pub fn to_changeset(&self, now: DateTime<Utc>) -> UserChangeset {
        UserChangeset {
            plan: self.plan.map(|p| p.as_str().to_string()),
            plan_start_at: self.plan_start_at,
            sub_status: self.sub_status.map(|s| Some(s.as_str().to_string())),
            subscription_id: self.subscription_id.clone().map(Some),
            last_payment_at: self.last_payment_at,
            sub_status_updated_at: self.sub_status.map(|_| now),
            last_login_at: self.last_login_at,
            updated_at: Some(now),
        }
    }
}

/// User as the rest of the crate sees it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub plan: Plan,
    pub plan_start_at: Option<DateTime<Utc>>,
    pub sub_status: Option<SubStatus>,
    pub subscription_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh free-plan user
    pub fn new(profile: &NewUserProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            plan: Plan::Free,
            plan_start_at: None,
            sub_status: None,
            subscription_id: None,
            last_payment_at: None,
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Paid plans lapse once their validity window has elapsed since
    /// `plan_start_at`. A paid plan without a start date never lapses.
    pub fn is_plan_expired(&self, now: DateTime<Utc>) -> bool {
        match (plan_catalog::validity_window(self.plan), self.plan_start_at) {
            (Some(window), Some(started)) => now.signed_duration_since(started) >= window,
            _ => false,
        }
    }

    /// Apply an update in memory the same way the database would
    pub fn apply(&mut self, update: &UserUpdate, now: DateTime<Utc>) {
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(start) = update.plan_start_at {
            self.plan_start_at = start;
        }
        if let Some(status) = update.sub_status {
            self.sub_status = Some(status);
        }
        if let Some(subscription) = &update.subscription_id {
            self.subscription_id = Some(subscription.clone());
        }
        if let Some(paid_at) = update.last_payment_at {
            self.last_payment_at = Some(paid_at);
        }
        if let Some(login) = update.last_login_at {
            self.last_login_at = Some(login);
        }
        self.updated_at = now;
    }
}

// Every stored plan and status string is defaulted here and nowhere else
impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let plan = Plan::from_str(&record.plan).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid plan '{}' for user {}, defaulting to free: {}",
                record.plan,
                record.id,
                e
            );
            Plan::Free
        });

        let sub_status = record.sub_status.as_deref().and_then(|raw| {
            SubStatus::from_str(raw)
                .map_err(|e| {
                    tracing::warn!(
                        "Ignoring subscription status '{}' for user {}: {}",
                        raw,
                        record.id,
                        e
                    );
                })
                .ok()
        });

        Self {
            id: record.id,
            email: record.email,
            display_name: record.display_name,
            plan,
            plan_start_at: record.plan_start_at,
            sub_status,
            subscription_id: record.subscription_id,
            last_payment_at: record.last_payment_at,
            last_login_at: record.last_login_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl UserRecord {
    /// Find user by identity id
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .select(UserRecord::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Insert the user unless it already exists; returns true when created
    pub async fn insert_if_absent(
        conn: &mut AsyncPgConnection,
        new_user: &NewUserRecord<'_>,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        let inserted = diesel::insert_into(users)
            .values(new_user)
            .on_conflict(id)
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }

    /// Insert the user or stamp the login time of an existing one
    pub async fn upsert_profile(
        conn: &mut AsyncPgConnection,
        new_user: &NewUserRecord<'_>,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(new_user)
            .on_conflict(id)
            .do_update()
            .set((
                last_login_at.eq(excluded(last_login_at)),
                updated_at.eq(excluded(updated_at)),
            ))
            .returning(UserRecord::as_returning())
            .get_result(conn)
            .await
    }

    /// Apply a partial update
    pub async fn update(
        conn: &mut AsyncPgConnection,
        user_id: &str,
        changes: &UserChangeset,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set(changes)
            .returning(UserRecord::as_returning())
            .get_result(conn)
            .await
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(plan: &str, status: Option<&str>) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: "uid-1".to_string(),
            email: None,
            display_name: None,
            plan: plan.to_string(),
            plan_start_at: None,
            sub_status: status.map(str::to_string),
            subscription_id: None,
            last_payment_at: None,
            sub_status_updated_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_plan_round_trip_and_case() {
        for plan in Plan::ALL {
            assert_eq!(Plan::from_str(plan.as_str()), Ok(plan));
        }
        assert_eq!(Plan::from_str(" Creator "), Ok(Plan::Creator));
        assert!(Plan::from_str("pro").is_err());
    }

    #[test]
    fn test_unknown_stored_plan_defaults_to_free() {
        let user = User::from(record("platinum", Some("active")));
        assert_eq!(user.plan, Plan::Free);
        assert_eq!(user.sub_status, Some(SubStatus::Active));
    }

    #[test]
    fn test_unknown_status_is_dropped() {
        let user = User::from(record("basic", Some("paused")));
        assert_eq!(user.plan, Plan::Basic);
        assert_eq!(user.sub_status, None);
    }

    #[test]
    fn test_plan_expiry_windows() {
        let now = Utc::now();
        let mut user = User::from(record("basic", None));

        // No start date never expires
        assert!(!user.is_plan_expired(now));

        user.plan_start_at = Some(now - Duration::days(29));
        assert!(!user.is_plan_expired(now));
        user.plan_start_at = Some(now - Duration::days(30));
        assert!(user.is_plan_expired(now));

        user.plan = Plan::Lifetime;
        assert!(!user.is_plan_expired(now));
        user.plan_start_at = Some(now - Duration::days(3 * 365));
        assert!(user.is_plan_expired(now));

        user.plan = Plan::Free;
        assert!(!user.is_plan_expired(now));
    }

    #[test]
    fn test_changeset_stamps_status_time() {
        let now = Utc::now();
        let update = UserUpdate {
            sub_status: Some(SubStatus::Cancelled),
            ..Default::default()
        };
        let changes = update.to_changeset(now);
        assert_eq!(changes.sub_status, Some(Some("cancelled".to_string())));
        assert_eq!(changes.sub_status_updated_at, Some(now));
        assert!(changes.plan.is_none());
    }
}
