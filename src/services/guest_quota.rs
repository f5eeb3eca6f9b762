// Guest Quota Tracker
// Guests get a fixed number of prompts per browser session before they must sign in

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::db::RedisPool;
use crate::services::plan_catalog::GUEST_PROMPT_CAP;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

// =============================================================================
// SESSION STATE STORES
// =============================================================================

/// Outcome of claiming one guest prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSlot {
    /// Counted; holds the new total
    Granted(u32),
    /// Cap already reached; holds the unchanged total
    Exhausted(u32),
}

/// Per-session guest prompt counts
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    async fn prompt_count(&self, session_id: &str) -> Result<u32, SessionStateError>;
    /// Check and increment as one step so concurrent sends cannot both pass the cap
    async fn increment_below(&self, session_id: &str, cap: u32)
        -> Result<PromptSlot, SessionStateError>;
    async fn reset(&self, session_id: &str) -> Result<(), SessionStateError>;
    async fn is_healthy(&self) -> bool;
}

/// Counts held in process memory; lost on restart and not shared across instances
#[derive(Default)]
pub struct MemorySessionStateStore {
    counts: Mutex<HashMap<String, u32>>,
}

impl MemorySessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStateStore for MemorySessionStateStore {
    async fn prompt_count(&self, session_id: &str) -> Result<u32, SessionStateError> {
        Ok(self.counts.lock().await.get(session_id).copied().unwrap_or(0))
    }

    async fn increment_below(
        &self,
        session_id: &str,
        cap: u32,
    ) -> Result<PromptSlot, SessionStateError> {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(session_id.to_string()).or_insert(0);
        if *count >= cap {
            return Ok(PromptSlot::Exhausted(*count));
        }
        *count += 1;
        Ok(PromptSlot::Granted(*count))
    }

    async fn reset(&self, session_id: &str) -> Result<(), SessionStateError> {
        self.counts.lock().await.remove(session_id);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Counts kept in Redis with a sliding expiry
pub struct RedisSessionStateStore {
    redis: RedisPool,
    ttl_secs: u64,
}

impl RedisSessionStateStore {
    pub fn new(redis: RedisPool, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    fn key(session_id: &str) -> String {
        format!("guest_prompts:{}", session_id)
    }
}

#[async_trait]
impl SessionStateStore for RedisSessionStateStore {
    async fn prompt_count(&self, session_id: &str) -> Result<u32, SessionStateError> {
        Ok(self
            .redis
            .get::<u32>(&Self::key(session_id))
            .await?
            .unwrap_or(0))
    }

    async fn increment_below(
        &self,
        session_id: &str,
        cap: u32,
    ) -> Result<PromptSlot, SessionStateError> {
        let (granted, count) = self
            .redis
            .incr_below(&Self::key(session_id), u64::from(cap), self.ttl_secs)
            .await?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Ok(if granted {
            PromptSlot::Granted(count)
        } else {
            PromptSlot::Exhausted(count)
        })
    }

    async fn reset(&self, session_id: &str) -> Result<(), SessionStateError> {
        self.redis.del(&Self::key(session_id)).await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.redis.health_check().await.is_healthy
    }
}

// =============================================================================
// TRACKER
// =============================================================================

/// Guest allowance check. Every failure of the backing store fails open:
/// a broken counter never locks a guest out.
pub struct GuestQuotaTracker {
    store: Arc<dyn SessionStateStore>,
    cap: u32,
}

impl GuestQuotaTracker {
    pub fn new(store: Arc<dyn SessionStateStore>) -> Self {
        Self {
            store,
            cap: GUEST_PROMPT_CAP,
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub async fn prompt_count(&self, session_id: &str) -> u32 {
        match self.store.prompt_count(session_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Guest prompt count unavailable, allowing: {}", e);
                0
            },
        }
    }

    /// Claim one prompt for the session, refusing once the cap is reached
    pub async fn consume_prompt(&self, session_id: &str) -> PromptSlot {
        match self.store.increment_below(session_id, self.cap).await {
            Ok(slot) => {
                debug!("Guest session {}: {:?}", session_id, slot);
                slot
            },
            Err(e) => {
                warn!("Failed to record guest prompt, allowing: {}", e);
                PromptSlot::Granted(0)
            },
        }
    }

    /// Forget the session's count after a successful sign-in
    pub async fn reset(&self, session_id: &str) {
        if let Err(e) = self.store.reset(session_id).await {
            warn!("Failed to reset guest prompt count: {}", e);
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.is_healthy().await
    }
}
