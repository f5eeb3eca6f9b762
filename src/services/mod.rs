// Services module for the MoodGPT backend
// Quota, conversation and subscription logic behind the HTTP handlers

pub mod chat_orchestrator;
pub mod completion;
pub mod conversation_registry;
pub mod guest_quota;
pub mod identity;
pub mod plan_catalog;
pub mod quota_gate;
pub mod subscription;
pub mod usage_counter;

// Re-export commonly used services
pub use chat_orchestrator::{ChatOrchestrator, SendOutcome, SendRequest, SendWarning};
pub use completion::{
    CompletionError, CompletionOutcome, CompletionService, FallbackCompletionClient,
};
pub use conversation_registry::ConversationRegistry;
pub use guest_quota::{
    GuestQuotaTracker, MemorySessionStateStore, PromptSlot, RedisSessionStateStore,
    SessionStateError, SessionStateStore,
};
pub use identity::{Identity, IdentityError, IdentityService, SignedInUser};
pub use quota_gate::{BlockReason, QuotaDecision, QuotaGate};
pub use subscription::{PaymentOutcome, SessionInfo, SessionKind, SubscriptionService};
pub use usage_counter::{UsageCounterService, UsageSnapshot};
