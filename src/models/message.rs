// Chat messages
// Append-only. Thread reads are ordered by (sent_at, seq) ascending.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{guest_messages, messages};

/// Upper bound on prior messages replayed to the completion service
pub const HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: Uuid,
    #[serde(skip)]
    pub seq: i64,
    pub conversation_id: Uuid,
    pub content: String,
    pub is_user: bool,
    pub mood_id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    #[serde(rename = "timestamp")]
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessageRecord<'a> {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: &'a str,
    pub is_user: bool,
    pub mood_id: &'a str,
    pub session_id: &'a str,
    pub user_id: Option<&'a str>,
    pub sent_at: DateTime<Utc>,
}

/// A message about to be appended, before it has a conversation or storage id
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub is_user: bool,
    pub mood_id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn as_record(&self, conversation_id: Uuid) -> NewMessageRecord<'_> {
        NewMessageRecord {
            id: Uuid::new_v4(),
            conversation_id,
            content: &self.content,
            is_user: self.is_user,
            mood_id: &self.mood_id,
            session_id: &self.session_id,
            user_id: self.user_id.as_deref(),
            sent_at: self.sent_at,
        }
    }
}

/// Guest transcript row; guests have no conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = guest_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GuestMessage {
    pub id: Uuid,
    pub content: String,
    pub is_user: bool,
    pub mood_id: String,
    pub session_id: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&NewMessage> for GuestMessage {
    fn from(message: &NewMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: message.content.clone(),
            is_user: message.is_user,
            mood_id: message.mood_id.clone(),
            session_id: message.session_id.clone(),
            created_at: message.sent_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_is_user(is_user: bool) -> Self {
        if is_user {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

/// One turn of context handed to the completion service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: Role::from_is_user(message.is_user),
            content: message.content.clone(),
        }
    }
}

impl Message {
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        record: &NewMessageRecord<'_>,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::messages::dsl::*;

        diesel::insert_into(messages)
            .values(record)
            .returning(Message::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn count_for(
        conn: &mut AsyncPgConnection,
        conversation: Uuid,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::messages::dsl::*;

        messages
            .filter(conversation_id.eq(conversation))
            .count()
            .get_result(conn)
            .await
    }

    /// The `max` most recent messages, returned oldest first
    pub async fn recent_for(
        conn: &mut AsyncPgConnection,
        conversation: Uuid,
        max: i64,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::messages::dsl::*;

        let mut recent: Vec<Message> = messages
            .filter(conversation_id.eq(conversation))
            .order((sent_at.desc(), seq.desc()))
            .limit(max)
            .select(Message::as_select())
            .load(conn)
            .await?;

        recent.reverse();
        Ok(recent)
    }
}

impl GuestMessage {
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        message: &GuestMessage,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::guest_messages::dsl::*;

        diesel::insert_into(guest_messages)
            .values(message)
            .execute(conn)
            .await?;
        Ok(())
    }
}
