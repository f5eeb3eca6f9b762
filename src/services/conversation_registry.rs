// Conversation Registry
// Addressable, resumable threads per (owner, mood)

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::db::{ConversationStore, MessageStore, StoreError};
use crate::models::{Conversation, Message, NewConversation, HISTORY_LIMIT};
use crate::utils::ChatError;

/// Sidebar listing size when the client does not ask for one
pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 50;

pub struct ConversationRegistry {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
}

impl ConversationRegistry {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    /// Resume the most recent thread for (owner, mood) or start a new one.
    /// Guests have no owner and get `None`: their messages are not threaded.
    #[instrument(skip(self))]
    pub async fn get_or_create(
        &self,
        owner_uid: Option<&str>,
        mood_id: &str,
        session_id: &str,
        force_new: bool,
    ) -> Result<Option<Uuid>, ChatError> {
        let owner = match owner_uid {
            Some(owner) if !owner.is_empty() => owner,
            _ => return Ok(None),
        };

        if !force_new {
            if let Some(existing) = self
                .conversations
                .find_latest_conversation(owner, mood_id)
                .await?
            {
                return Ok(Some(existing.id));
            }
        }

        let created = self.create(owner, mood_id, session_id).await?;
        Ok(Some(created.id))
    }

    /// Start a new thread titled "New chat"
    pub async fn create(
        &self,
        owner_uid: &str,
        mood_id: &str,
        session_id: &str,
    ) -> Result<Conversation, ChatError> {
        let new_conversation = NewConversation::new(owner_uid, mood_id, session_id, Utc::now());

        match self.conversations.create_conversation(new_conversation).await {
            Ok(conversation) => {
                info!(
                    "Created conversation {} for {} in mood {}",
                    conversation.id, owner_uid, mood_id
                );
                Ok(conversation)
            },
            Err(e) => {
                error!("Failed to create conversation for {}: {}", owner_uid, e);
                Err(ChatError::ConversationCreateFailed(e.to_string()))
            },
        }
    }

    /// The conversation, provided `owner_uid` owns it
    pub async fn resolve_owned(
        &self,
        owner_uid: &str,
        conversation_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .conversations
            .find_conversation(conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound)?;

        if !conversation.is_owned_by(owner_uid) {
            return Err(ChatError::Forbidden);
        }
        Ok(conversation)
    }

    pub async fn list(
        &self,
        owner_uid: &str,
        mood_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Conversation>, ChatError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self
            .conversations
            .list_conversations(owner_uid, mood_id, limit)
            .await?)
    }

    /// Up to the 100 most recent messages, oldest first
    pub async fn history(
        &self,
        owner_uid: &str,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        self.resolve_owned(owner_uid, conversation_id).await?;
        Ok(self.recent_messages(conversation_id).await?)
    }

    pub async fn recent_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.messages
            .recent_messages(conversation_id, HISTORY_LIMIT)
            .await
    }

    pub async fn delete(&self, owner_uid: &str, conversation_id: Uuid) -> Result<(), ChatError> {
        self.resolve_owned(owner_uid, conversation_id).await?;
        if !self.conversations.delete_conversation(conversation_id).await? {
            return Err(ChatError::ConversationNotFound);
        }
        info!("Deleted conversation {} for {}", conversation_id, owner_uid);
        Ok(())
    }
}
