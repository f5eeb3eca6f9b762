// Chat Orchestrator
// One send: validate, gate, persist the user message, complete, persist the reply

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::MessageStore;
use crate::models::{mood, HistoryEntry, Mood, NewMessage, Role, HISTORY_LIMIT};
use crate::services::completion::{CompletionOutcome, CompletionService};
use crate::services::conversation_registry::ConversationRegistry;
use crate::services::identity::Identity;
use crate::services::quota_gate::{QuotaDecision, QuotaGate};
use crate::utils::ChatError;

/// Non-fatal problems reported alongside a successful reply
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendWarning {
    HistoryUnavailable,
    MessageNotSaved,
    ReplyNotSaved,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub content: String,
    pub mood_id: String,
    pub session_id: String,
    /// Continue this thread; without one a signed-in send starts a new thread
    pub conversation_id: Option<Uuid>,
    /// Prior turns kept by a guest client, which has no stored thread
    pub client_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub conversation_id: Option<Uuid>,
    pub reply: String,
    pub quota: QuotaDecision,
    pub warnings: Vec<SendWarning>,
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

/// Keys with a send currently in progress
#[derive(Default)]
struct InFlight {
    keys: Mutex<HashSet<String>>,
}

/// Released on drop, so every exit path frees the key
struct InFlightGuard {
    registry: Arc<InFlight>,
    key: String,
}

impl InFlight {
    fn acquire(self: &Arc<Self>, key: String) -> Option<InFlightGuard> {
        let mut keys = self.keys.lock().ok()?;
        if !keys.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            registry: Arc::clone(self),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.registry.keys.lock() {
            keys.remove(&self.key);
        }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

pub struct ChatOrchestrator {
    registry: Arc<ConversationRegistry>,
    messages: Arc<dyn MessageStore>,
    gate: Arc<QuotaGate>,
    completion: Arc<dyn CompletionService>,
    in_flight: Arc<InFlight>,
}

impl ChatOrchestrator {
    pub fn new(
        registry: Arc<ConversationRegistry>,
        messages: Arc<dyn MessageStore>,
        gate: Arc<QuotaGate>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            registry,
            messages,
            gate,
            completion,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    fn in_flight_key(request: &SendRequest) -> String {
        match request.conversation_id {
            Some(id) => format!("conversation:{}", id),
            None => format!("session:{}:{}", request.session_id, request.mood_id),
        }
    }

    fn new_message(
        request: &SendRequest,
        identity: &Identity,
        content: &str,
        is_user: bool,
    ) -> NewMessage {
        NewMessage {
            content: content.to_string(),
            is_user,
            mood_id: request.mood_id.clone(),
            session_id: request.session_id.clone(),
            user_id: identity.owner_uid().map(str::to_string),
            sent_at: Utc::now(),
        }
    }

    /// The last turns a guest client supplied, never trusting a system role
    fn guest_history(request: &SendRequest) -> Vec<HistoryEntry> {
        let turns: Vec<HistoryEntry> = request
            .client_history
            .iter()
            .filter(|entry| entry.role != Role::System && !entry.content.trim().is_empty())
            .cloned()
            .collect();
        let limit = HISTORY_LIMIT as usize;
        let skip = turns.len().saturating_sub(limit);
        turns.into_iter().skip(skip).collect()
    }

    fn validate(request: &SendRequest) -> Result<&'static Mood, ChatError> {
        if request.content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if request.session_id.trim().is_empty() {
            return Err(ChatError::BadRequest("session id is required".to_string()));
        }
        mood::find(&request.mood_id).ok_or_else(|| ChatError::InvalidMood(request.mood_id.clone()))
    }

    #[instrument(skip_all, fields(mood = %request.mood_id, session = %request.session_id))]
    pub async fn send(
        &self,
        identity: &Identity,
        request: SendRequest,
    ) -> Result<SendOutcome, ChatError> {
        // Validating
        let mood = Self::validate(&request)?;
        let owner = identity.owner_uid();

        if let Some(id) = request.conversation_id {
            let owner = owner.ok_or(ChatError::Forbidden)?;
            let conversation = self.registry.resolve_owned(owner, id).await?;
            if conversation.mood_id != request.mood_id {
                warn!(
                    "Send for mood {} addressed thread {} of mood {}",
                    request.mood_id, id, conversation.mood_id
                );
                return Err(ChatError::BadRequest(format!(
                    "conversation {} belongs to mood {}",
                    id, conversation.mood_id
                )));
            }
        }

        let _guard = self
            .in_flight
            .acquire(Self::in_flight_key(&request))
            .ok_or(ChatError::SendInFlight)?;

        // Gating
        let quota = self.gate.can_send(identity, &request.session_id).await?.into_result()?;

        match owner {
            Some(owner) => self.send_as_user(owner, identity, mood, &request, quota).await,
            None => self.send_as_guest(identity, mood, &request, quota).await,
        }
    }

    async fn send_as_user(
        &self,
        owner: &str,
        identity: &Identity,
        mood: &Mood,
        request: &SendRequest,
        quota: QuotaDecision,
    ) -> Result<SendOutcome, ChatError> {
        let mut warnings = Vec::new();

        // Persisting(user)
        let conversation_id = match request.conversation_id {
            Some(id) => id,
            None => self
                .registry
                .get_or_create(Some(owner), &request.mood_id, &request.session_id, true)
                .await?
                .ok_or_else(|| ChatError::Internal("no conversation for signed-in user".to_string()))?,
        };

        let prior = match self.registry.recent_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("History for {} unavailable: {}", conversation_id, e);
                warnings.push(SendWarning::HistoryUnavailable);
                Vec::new()
            },
        };

        let user_message = Self::new_message(request, identity, request.content.trim(), true);
        self.messages
            .append_message(conversation_id, &user_message)
            .await
            .map_err(|e| {
                error!("Failed to save message in {}: {}", conversation_id, e);
                ChatError::from(e)
            })?;

        // AwaitingCompletion
        let mut history: Vec<HistoryEntry> = prior.iter().map(HistoryEntry::from).collect();
        history.push(HistoryEntry::user(user_message.content.clone()));
        let reply = self.complete(mood, &history).await?;

        // Persisting(assistant)
        let assistant_message = Self::new_message(request, identity, &reply, false);
        if let Err(e) = self
            .messages
            .append_message(conversation_id, &assistant_message)
            .await
        {
            error!("Failed to save reply in {}: {}", conversation_id, e);
            warnings.push(SendWarning::ReplyNotSaved);
        }

        info!("Reply delivered in conversation {}", conversation_id);
        Ok(SendOutcome {
            conversation_id: Some(conversation_id),
            reply,
            quota,
            warnings,
        })
    }

    async fn send_as_guest(
        &self,
        identity: &Identity,
        mood: &Mood,
        request: &SendRequest,
        quota: QuotaDecision,
    ) -> Result<SendOutcome, ChatError> {
        let mut warnings = Vec::new();

        let user_message = Self::new_message(request, identity, request.content.trim(), true);
        if let Err(e) = self.messages.append_guest_message(&user_message).await {
            warn!("Failed to save guest message: {}", e);
            warnings.push(SendWarning::MessageNotSaved);
        }

        let mut history = Self::guest_history(request);
        history.push(HistoryEntry::user(user_message.content.clone()));
        let reply = self.complete(mood, &history).await?;

        let assistant_message = Self::new_message(request, identity, &reply, false);
        if let Err(e) = self.messages.append_guest_message(&assistant_message).await {
            warn!("Failed to save guest reply: {}", e);
            warnings.push(SendWarning::ReplyNotSaved);
        }

        Ok(SendOutcome {
            conversation_id: None,
            reply,
            quota,
            warnings,
        })
    }

    /// Apologies from the provider chain are failures, not replies
    async fn complete(&self, mood: &Mood, history: &[HistoryEntry]) -> Result<String, ChatError> {
        match self.completion.complete(&mood.persona_prompt(), history).await {
            Ok(CompletionOutcome::Reply(reply)) => Ok(reply),
            Ok(CompletionOutcome::Unavailable(apology)) => {
                warn!("Completion unavailable: {}", apology);
                Err(ChatError::CompletionFailed(apology))
            },
            Err(e) => {
                error!("Completion failed: {}", e);
                Err(ChatError::CompletionFailed(e.to_string()))
            },
        }
    }
}
