// In-process backend for the storage traits
// Used by tests and by local runs without PostgreSQL. One lock guards all state,
// which gives every trait method the same atomicity as the SQL backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    ConversationStore, HealthProbe, MessageStore, PaymentEventStore, StoreError, UsageStore,
    UserStore,
};
use crate::models::conversation::title_from_message;
use crate::models::{
    Conversation, DayWindow, GuestMessage, Message, NewConversation, NewMessage, NewUserProfile,
    PaymentEvent, UsageCounter, User, UserUpdate,
};

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    usage: HashMap<String, UsageCounter>,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<Message>>,
    guest_messages: Vec<GuestMessage>,
    payment_events: HashMap<String, PaymentEvent>,
    next_seq: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id.clone(), user);
    }

    /// Overwrite a usage counter, for simulating earlier days
    pub async fn seed_usage(&self, user_id: &str, total: u32, updated_at: DateTime<Utc>) {
        self.state.lock().await.usage.insert(
            user_id.to_string(),
            UsageCounter {
                user_id: user_id.to_string(),
                total,
                updated_at,
            },
        );
    }

    pub async fn guest_messages(&self, session_id: &str) -> Vec<GuestMessage> {
        self.state
            .lock()
            .await
            .guest_messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub async fn payment_event_count(&self) -> usize {
        self.state.lock().await.payment_events.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn upsert_on_login(
        &self,
        profile: &NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let user = state
            .users
            .entry(profile.id.clone())
            .and_modify(|existing| {
                existing.last_login_at = Some(now);
                existing.updated_at = now;
            })
            .or_insert_with(|| User::new(profile, now));
        Ok(user.clone())
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        user.apply(update, now);
        Ok(user.clone())
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn increment_usage(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        day: DayWindow,
    ) -> Result<u32, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let counter = state
            .usage
            .entry(user_id.to_string())
            .or_insert_with(|| UsageCounter {
                user_id: user_id.to_string(),
                total: 0,
                updated_at: now,
            });

        counter.total = if counter.total > 0 && day.contains(counter.updated_at) {
            counter.total + 1
        } else {
            1
        };
        counter.updated_at = now;
        Ok(counter.total)
    }

    async fn find_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, StoreError> {
        self.check()?;
        Ok(self.state.lock().await.usage.get(user_id).cloned())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_latest_conversation(
        &self,
        owner_uid: &str,
        mood_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .values()
            .filter(|c| c.is_owned_by(owner_uid) && c.mood_id == mood_id)
            .max_by_key(|c| (c.updated_at, c.created_at))
            .cloned())
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, StoreError> {
        self.check()?;
        let conversation = Conversation::from(conversation);
        self.state
            .lock()
            .await
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        self.check()?;
        Ok(self.state.lock().await.conversations.get(&id).cloned())
    }

    async fn list_conversations(
        &self,
        owner_uid: &str,
        mood_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Conversation>, StoreError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut owned: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.is_owned_by(owner_uid))
            .filter(|c| mood_id.map_or(true, |m| c.mood_id == m))
            .cloned()
            .collect();

        owned.sort_by(|a, b| {
            (b.updated_at, b.created_at).cmp(&(a.updated_at, a.created_at))
        });
        owned.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(owned)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        state.messages.remove(&id);
        Ok(state.conversations.remove(&id).is_some())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &NewMessage,
    ) -> Result<Message, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::NotFound);
        }

        state.next_seq += 1;
        let stored = Message {
            id: Uuid::new_v4(),
            seq: state.next_seq,
            conversation_id,
            content: message.content.clone(),
            is_user: message.is_user,
            mood_id: message.mood_id.clone(),
            session_id: message.session_id.clone(),
            user_id: message.user_id.clone(),
            sent_at: message.sent_at,
        };

        let thread = state.messages.entry(conversation_id).or_default();
        let first = thread.is_empty();
        thread.push(stored.clone());

        if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
            conversation.updated_at = message.sent_at;
            if first && message.is_user {
                conversation.title = title_from_message(&message.content);
            }
        }

        Ok(stored)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut thread = state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();

        thread.sort_by_key(|m| (m.sent_at, m.seq));
        let keep = usize::try_from(limit).unwrap_or(0);
        let skip = thread.len().saturating_sub(keep);
        Ok(thread.split_off(skip))
    }

    async fn append_guest_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        self.check()?;
        self.state
            .lock()
            .await
            .guest_messages
            .push(GuestMessage::from(message));
        Ok(())
    }
}

#[async_trait]
impl PaymentEventStore for MemoryStore {
    async fn apply_payment_event(
        &self,
        event: &PaymentEvent,
        update: Option<&UserUpdate>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock().await;
        if state.payment_events.contains_key(&event.payment_id) {
            return Ok(false);
        }
        state
            .payment_events
            .insert(event.payment_id.clone(), event.clone());

        if let (Some(uid), Some(update)) = (event.user_id.as_deref(), update) {
            let profile = NewUserProfile {
                id: uid.to_string(),
                email: None,
                display_name: None,
            };
            let user = state.users.entry(uid.to_string()).or_insert_with(|| {
                let mut user = User::new(&profile, now);
                user.last_login_at = None;
                user
            });
            user.apply(update, now);
        }

        Ok(true)
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
