// Storage seams
// Services depend on these traits; PostgreSQL and in-memory backends implement them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Conversation, DayWindow, Message, NewConversation, NewMessage, NewUserProfile, PaymentEvent,
    UsageCounter, User, UserUpdate,
};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found")]
    NotFound,

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match error {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                StoreError::Unavailable(info.message().to_string())
            },
            Error::BrokenTransactionManager => {
                StoreError::Unavailable("broken transaction manager".to_string())
            },
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for StoreError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

// =============================================================================
// STORE TRAITS
// =============================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Create a free-plan user on first sight, otherwise stamp the login time
    async fn upsert_on_login(
        &self,
        profile: &NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    /// Fails with `NotFound` when the user does not exist
    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Single atomic read-modify-write: start at 1, restart at 1 when the
    /// stored timestamp falls outside `day`, otherwise add 1.
    async fn increment_usage(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        day: DayWindow,
    ) -> Result<u32, StoreError>;

    async fn find_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, StoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Most recently updated conversation for (owner, mood)
    async fn find_latest_conversation(
        &self,
        owner_uid: &str,
        mood_id: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, StoreError>;

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError>;

    async fn list_conversations(
        &self,
        owner_uid: &str,
        mood_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// Removes the conversation and its messages; false when nothing matched
    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append to a thread and bump its `updated_at`. When the thread had no
    /// messages yet, its title becomes the start of this message. Both writes
    /// commit together; a missing conversation yields `NotFound`.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &NewMessage,
    ) -> Result<Message, StoreError>;

    /// Up to `limit` most recent messages, oldest first
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError>;

    async fn append_guest_message(&self, message: &NewMessage) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PaymentEventStore: Send + Sync {
    /// Record the event keyed by payment id. Only on first delivery, make sure
    /// the referenced user exists and apply `update` to it in the same unit of
    /// work. Returns false for a duplicate.
    async fn apply_payment_event(
        &self,
        event: &PaymentEvent,
        update: Option<&UserUpdate>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// A backend that covers every storage concern
pub trait Store:
    UserStore + UsageStore + ConversationStore + MessageStore + PaymentEventStore + HealthProbe
{
}

impl<T> Store for T where
    T: UserStore + UsageStore + ConversationStore + MessageStore + PaymentEventStore + HealthProbe
{
}

/// One backend handed out as the narrow trait objects each service needs
#[derive(Clone)]
pub struct StoreHandles {
    pub users: Arc<dyn UserStore>,
    pub usage: Arc<dyn UsageStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub payments: Arc<dyn PaymentEventStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl StoreHandles {
    pub fn from_store<S: Store + 'static>(store: Arc<S>) -> Self {
        Self {
            users: store.clone(),
            usage: store.clone(),
            conversations: store.clone(),
            messages: store.clone(),
            payments: store.clone(),
            health: store,
        }
    }
}
