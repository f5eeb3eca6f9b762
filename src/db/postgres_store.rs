// PostgreSQL backend for the storage traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::diesel_pool::DieselPool;
use super::store::{
    ConversationStore, HealthProbe, MessageStore, PaymentEventStore, StoreError, UsageStore,
    UserStore,
};
use crate::models::conversation::title_from_message;
use crate::models::usage::UsageCounterRecord;
use crate::models::user::{NewUserRecord, UserRecord};
use crate::models::{
    Conversation, DayWindow, GuestMessage, Message, NewConversation, NewMessage, NewUserProfile,
    PaymentEvent, Plan, UsageCounter, User, UserUpdate,
};

#[derive(Clone)]
pub struct PgStore {
    pool: DieselPool,
}

impl PgStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        let record = UserRecord::find_by_id(&mut conn, user_id).await?;
        Ok(record.map(User::from))
    }

    async fn upsert_on_login(
        &self,
        profile: &NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let mut conn = self.pool.get().await?;
        let new_user = NewUserRecord {
            id: &profile.id,
            email: profile.email.as_deref(),
            display_name: profile.display_name.as_deref(),
            plan: Plan::Free.as_str(),
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let record = UserRecord::upsert_profile(&mut conn, &new_user).await?;
        Ok(User::from(record))
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let mut conn = self.pool.get().await?;
        let changes = update.to_changeset(now);

        UserRecord::update(&mut conn, user_id, &changes)
            .await?
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UsageStore for PgStore {
    #[instrument(skip(self, day))]
    async fn increment_usage(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        day: DayWindow,
    ) -> Result<u32, StoreError> {
        let mut conn = self.pool.get().await?;
        let total = UsageCounterRecord::increment(&mut conn, user_id, now, day).await?;
        debug!("Usage for {} is now {}", user_id, total);
        Ok(u32::try_from(total).unwrap_or(0))
    }

    async fn find_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, StoreError> {
        let mut conn = self.pool.get().await?;
        let record = UsageCounterRecord::find(&mut conn, user_id).await?;
        Ok(record.map(UsageCounter::from))
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_latest_conversation(
        &self,
        owner_uid: &str,
        mood_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Conversation::find_latest(&mut conn, owner_uid, mood_id).await?)
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Conversation::create(&mut conn, &conversation).await?)
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Conversation::find_by_id(&mut conn, id).await?)
    }

    async fn list_conversations(
        &self,
        owner_uid: &str,
        mood_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Conversation>, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Conversation::list_for_owner(&mut conn, owner_uid, mood_id, limit).await?)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Conversation::delete(&mut conn, id).await?)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &NewMessage,
    ) -> Result<Message, StoreError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                // Serializes appends to one thread so the first-message check is exact
                Conversation::lock_for_update(conn, conversation_id)
                    .await?
                    .ok_or(StoreError::NotFound)?;

                let prior = Message::count_for(conn, conversation_id).await?;
                let stored = Message::insert(conn, &message.as_record(conversation_id)).await?;

                let title = (prior == 0 && message.is_user)
                    .then(|| title_from_message(&message.content));
                Conversation::touch(conn, conversation_id, message.sent_at, title.as_deref())
                    .await?;

                Ok(stored)
            }
            .scope_boxed()
        })
        .await
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(Message::recent_for(&mut conn, conversation_id, limit).await?)
    }

    async fn append_guest_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        GuestMessage::insert(&mut conn, &GuestMessage::from(message)).await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentEventStore for PgStore {
    #[instrument(skip(self, event, update), fields(payment_id = %event.payment_id))]
    async fn apply_payment_event(
        &self,
        event: &PaymentEvent,
        update: Option<&UserUpdate>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                if !PaymentEvent::record(conn, event).await? {
                    return Ok(false);
                }

                if let (Some(uid), Some(update)) = (event.user_id.as_deref(), update) {
                    let placeholder = NewUserRecord {
                        id: uid,
                        email: None,
                        display_name: None,
                        plan: Plan::Free.as_str(),
                        last_login_at: None,
                        created_at: now,
                        updated_at: now,
                    };
                    UserRecord::insert_if_absent(conn, &placeholder).await?;
                    UserRecord::update(conn, uid, &update.to_changeset(now)).await?;
                }

                Ok(true)
            }
            .scope_boxed()
        })
        .await
    }
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }
}
