// Conversation threads
// Resuming by (owner, mood) picks the most recently updated thread; it is not a uniqueness key

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::conversations;

pub const DEFAULT_TITLE: &str = "New chat";

/// Titles are derived from the first user message, truncated to this many characters
pub const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Conversation {
    pub id: Uuid,
    pub owner_uid: Option<String>,
    pub mood_id: String,
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub id: Uuid,
    pub owner_uid: Option<String>,
    pub mood_id: String,
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewConversation {
    pub fn new(owner_uid: &str, mood_id: &str, session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_uid: Some(owner_uid.to_string()),
            mood_id: mood_id.to_string(),
            session_id: session_id.to_string(),
            title: DEFAULT_TITLE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<NewConversation> for Conversation {
    fn from(new: NewConversation) -> Self {
        Self {
            id: new.id,
            owner_uid: new.owner_uid,
            mood_id: new.mood_id,
            session_id: new.session_id,
            title: new.title,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }
}

impl Conversation {
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_uid.as_deref() == Some(uid)
    }
}

/// First `TITLE_MAX_CHARS` characters of the opening message
pub fn title_from_message(content: &str) -> String {
    let title: String = content.trim().chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

impl Conversation {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        conversation_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        conversations
            .filter(id.eq(conversation_id))
            .select(Conversation::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Lock the row for the rest of the transaction
    pub async fn lock_for_update(
        conn: &mut AsyncPgConnection,
        conversation_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        conversations
            .filter(id.eq(conversation_id))
            .select(Conversation::as_select())
            .for_update()
            .get_result(conn)
            .await
            .optional()
    }

    /// Most recently updated thread for (owner, mood)
    pub async fn find_latest(
        conn: &mut AsyncPgConnection,
        owner: &str,
        mood: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        conversations
            .filter(owner_uid.eq(owner))
            .filter(mood_id.eq(mood))
            .order((updated_at.desc(), created_at.desc()))
            .select(Conversation::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_for_owner(
        conn: &mut AsyncPgConnection,
        owner: &str,
        mood: Option<&str>,
        max: i64,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        let mut query = conversations
            .filter(owner_uid.eq(owner))
            .select(Conversation::as_select())
            .into_boxed();

        if let Some(mood) = mood {
            query = query.filter(mood_id.eq(mood));
        }

        query
            .order((updated_at.desc(), created_at.desc()))
            .limit(max)
            .load(conn)
            .await
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_conversation: &NewConversation,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        diesel::insert_into(conversations)
            .values(new_conversation)
            .returning(Conversation::as_returning())
            .get_result(conn)
            .await
    }

    /// Bump `updated_at`, and set the title when this is the first message
    pub async fn touch(
        conn: &mut AsyncPgConnection,
        conversation_id: Uuid,
        now: DateTime<Utc>,
        new_title: Option<&str>,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        let target = conversations.filter(id.eq(conversation_id));
        match new_title {
            Some(t) => {
                diesel::update(target)
                    .set((updated_at.eq(now), title.eq(t)))
                    .execute(conn)
                    .await?
            },
            None => diesel::update(target).set(updated_at.eq(now)).execute(conn).await?,
        };
        Ok(())
    }

    /// Messages go with it through ON DELETE CASCADE
    pub async fn delete(
        conn: &mut AsyncPgConnection,
        conversation_id: Uuid,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::conversations::dsl::*;

        let deleted = diesel::delete(conversations.filter(id.eq(conversation_id)))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_truncates_on_char_boundary() {
        let long = "é".repeat(80);
        let title = title_from_message(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_title_trims_and_defaults() {
        assert_eq!(title_from_message("  hello there  "), "hello there");
        assert_eq!(title_from_message("   "), DEFAULT_TITLE);
    }

    #[test]
    fn test_new_conversation_defaults() {
        let now = Utc::now();
        let conversation = Conversation::from(NewConversation::new("u1", "cute", "s1", now));
        assert_eq!(conversation.title, DEFAULT_TITLE);
        assert_eq!(conversation.created_at, conversation.updated_at);
        assert!(conversation.is_owned_by("u1"));
        assert!(!conversation.is_owned_by("u2"));
    }
}
