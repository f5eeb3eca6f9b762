// Application state and wiring
use std::sync::Arc;

use crate::{
    db::{HealthProbe, StoreHandles, UserStore},
    middleware::CorsPolicy,
    services::{
        ChatOrchestrator, CompletionService, ConversationRegistry, GuestQuotaTracker,
        IdentityService, QuotaGate, SessionStateStore, SubscriptionService, UsageCounterService,
    },
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub chat: Arc<ChatOrchestrator>,
    pub conversations: Arc<ConversationRegistry>,
    pub usage: Arc<UsageCounterService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub users: Arc<dyn UserStore>,
    pub guests: Arc<GuestQuotaTracker>,
    pub store_health: Arc<dyn HealthProbe>,
    pub webhook_key: Option<String>,
    pub storage_backend: &'static str,
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    /// Wire every service from one storage backend and one guest-state store
    pub fn build(
        stores: StoreHandles,
        storage_backend: &'static str,
        session_state: Arc<dyn SessionStateStore>,
        identity: IdentityService,
        completion: Arc<dyn CompletionService>,
        webhook_key: Option<String>,
    ) -> Self {
        let guests = Arc::new(GuestQuotaTracker::new(session_state));
        let usage = Arc::new(UsageCounterService::new(stores.usage.clone()));
        let conversations = Arc::new(ConversationRegistry::new(
            stores.conversations.clone(),
            stores.messages.clone(),
        ));
        let gate = Arc::new(QuotaGate::new(
            stores.users.clone(),
            usage.clone(),
            guests.clone(),
        ));
        let chat = Arc::new(ChatOrchestrator::new(
            conversations.clone(),
            stores.messages.clone(),
            gate,
            completion,
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            stores.users.clone(),
            stores.payments.clone(),
            guests.clone(),
        ));

        Self {
            identity: Arc::new(identity),
            chat,
            conversations,
            usage,
            subscriptions,
            users: stores.users,
            guests,
            store_health: stores.health,
            webhook_key,
            storage_backend,
            cors: Arc::new(CorsPolicy::default()),
        }
    }

    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Arc::new(policy);
        self
    }
}
