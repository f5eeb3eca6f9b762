use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::payment_events;

/// Recurring subscription id the gateway sends for one-off payments
pub const ZERO_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// Gateway status ids this service acts on
pub const STATUS_PAID: i32 = 2;
pub const STATUS_FAILED: i32 = 4;

/// Webhook body posted by the SkipCash gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SkipCashPayload {
    pub payment_id: String,
    pub amount: String,
    pub status_id: i32,
    /// Carries the payer's user id, set when the payment was created
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Carries the purchased plan name
    #[serde(default)]
    pub custom1: Option<String>,
    #[serde(default)]
    pub visa_id: String,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub recurring_subscription_id: Option<String>,
}

impl SkipCashPayload {
    /// The payer, when the gateway echoed one back
    pub fn user_id(&self) -> Option<&str> {
        self.transaction_id.as_deref().filter(|uid| !uid.trim().is_empty())
    }

    pub fn plan_name(&self) -> Option<&str> {
        self.custom1.as_deref().filter(|plan| !plan.trim().is_empty())
    }

    /// Subscription reference, absent for one-off payments
    pub fn subscription_id(&self) -> Option<&str> {
        self.recurring_subscription_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != ZERO_GUID)
    }
}

/// Processed gateway event; the primary key makes redelivery a no-op
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = payment_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEvent {
    pub payment_id: String,
    pub user_id: Option<String>,
    pub status_id: i32,
    pub plan: Option<String>,
    pub amount: Option<String>,
    pub subscription_id: Option<String>,
    pub raw_payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn from_payload(payload: &SkipCashPayload, raw: JsonValue, now: DateTime<Utc>) -> Self {
        Self {
            payment_id: payload.payment_id.clone(),
            user_id: payload.user_id().map(str::to_string),
            status_id: payload.status_id,
            plan: payload.plan_name().map(str::to_string),
            amount: Some(payload.amount.clone()),
            subscription_id: payload.subscription_id().map(str::to_string),
            raw_payload: raw,
            received_at: now,
        }
    }

    /// Insert unless the payment id was seen before; true when newly recorded
    pub async fn record(
        conn: &mut AsyncPgConnection,
        event: &PaymentEvent,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::payment_events::dsl::*;

        let inserted = diesel::insert_into(payment_events)
            .values(event)
            .on_conflict(payment_id)
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_names() {
        let payload: SkipCashPayload = serde_json::from_value(serde_json::json!({
            "PaymentId": "p-1",
            "Amount": "9.99",
            "StatusId": 2,
            "TransactionId": "uid-1",
            "Custom1": "basic",
            "VisaId": "v-1",
            "TokenId": "t-1",
            "RecurringSubscriptionId": ZERO_GUID
        }))
        .expect("payload");

        assert_eq!(payload.user_id(), Some("uid-1"));
        assert_eq!(payload.plan_name(), Some("basic"));
        assert_eq!(payload.subscription_id(), None);
    }

    #[test]
    fn test_blank_transaction_id_has_no_user() {
        let payload: SkipCashPayload = serde_json::from_value(serde_json::json!({
            "PaymentId": "p-2",
            "Amount": "1.00",
            "StatusId": 4,
            "TransactionId": "",
            "RecurringSubscriptionId": "8d4b3c9e-0000-4000-8000-000000000001"
        }))
        .expect("payload");

        assert_eq!(payload.user_id(), None);
        assert_eq!(payload.visa_id, "");
        assert!(payload.subscription_id().is_some());
    }
}
