// Completion Client
// Talks to OpenAI-compatible chat completion endpoints, trying each configured provider in turn

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::app_config::{CompletionConfig, ProviderConfig};
use crate::models::{HistoryEntry, Role};

pub const MISSING_KEYS_APOLOGY: &str = "API configuration error: No API keys found. Please add either DEEPINFRA_API_KEY or OPENAI_API_KEY to your environment variables.";
pub const BUSY_APOLOGY: &str = "The system is currently busy. Please try again later.";

const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider {provider} returned {status}: {body}")]
    Provider {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider {0} returned no content")]
    EmptyReply(String),
}

/// What the assistant produced. `Unavailable` carries the apology text that
/// is shown instead of a reply; it is never stored as an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Reply(String),
    Unavailable(String),
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
    ) -> Result<CompletionOutcome, CompletionError>;
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn build_messages<'a>(system_prompt: &'a str, history: &'a [HistoryEntry]) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(WireMessage {
        role: Role::System.as_str(),
        content: system_prompt,
    });
    messages.extend(history.iter().map(|entry| WireMessage {
        role: entry.role.as_str(),
        content: entry.content.as_str(),
    }));
    messages
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// Tries providers in configured order and returns the first reply
pub struct FallbackCompletionClient {
    http_client: reqwest::Client,
    providers: Vec<ProviderConfig>,
    temperature: f32,
    max_tokens: u32,
}

impl FallbackCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("MoodGPT-Backend/1.0")
            .build()?;

        Ok(Self {
            http_client,
            providers: config.providers.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn has_keys(&self) -> bool {
        self.providers.iter().any(|p| p.api_key.is_some())
    }

    async fn call_provider(
        &self,
        provider: &ProviderConfig,
        api_key: &str,
        system_prompt: &str,
        history: &[HistoryEntry],
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &provider.model,
            messages: build_messages(system_prompt, history),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http_client
            .post(&provider.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider {
                provider: provider.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CompletionError::EmptyReply(provider.name.clone()))
    }
}

#[async_trait]
impl CompletionService for FallbackCompletionClient {
    #[instrument(skip_all, fields(history_len = history.len()))]
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
    ) -> Result<CompletionOutcome, CompletionError> {
        if !self.has_keys() {
            error!("No completion provider API keys configured");
            return Ok(CompletionOutcome::Unavailable(MISSING_KEYS_APOLOGY.to_string()));
        }

        for provider in &self.providers {
            let Some(api_key) = provider.api_key.as_deref() else {
                continue;
            };

            match self
                .call_provider(provider, api_key, system_prompt, history)
                .await
            {
                Ok(reply) => {
                    debug!("Completion served by {}", provider.name);
                    return Ok(CompletionOutcome::Reply(reply));
                },
                Err(e) => warn!("Completion provider {} failed: {}", provider.name, e),
            }
        }

        Ok(CompletionOutcome::Unavailable(BUSY_APOLOGY.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(providers: Vec<ProviderConfig>) -> CompletionConfig {
        CompletionConfig {
            providers,
            temperature: 0.7,
            max_tokens: 800,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_request_shape() {
        let history = vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello")];
        let request = ChatCompletionRequest {
            model: "gpt-3.5-turbo",
            messages: build_messages("be kind", &history),
            temperature: 0.7,
            max_tokens: 800,
        };

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 800);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be kind");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][2]["role"], "assistant");
    }

    #[test]
    fn test_response_without_choices_parses() {
        let parsed: ChatCompletionResponse = serde_json::from_str("{}").expect("parse");
        assert!(parsed.choices.is_empty());
    }

    #[tokio::test]
    async fn test_no_keys_returns_configuration_apology() {
        let client = FallbackCompletionClient::new(&config(vec![ProviderConfig {
            name: "openai".to_string(),
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
        }]))
        .expect("client");

        let outcome = client
            .complete("prompt", &[HistoryEntry::user("hi")])
            .await
            .expect("outcome");
        assert_eq!(
            outcome,
            CompletionOutcome::Unavailable(MISSING_KEYS_APOLOGY.to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_providers_return_busy_apology() {
        let client = FallbackCompletionClient::new(&config(vec![ProviderConfig {
            name: "openai".to_string(),
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: Some("sk-test".to_string()),
            model: "gpt-3.5-turbo".to_string(),
        }]))
        .expect("client");

        let outcome = client
            .complete("prompt", &[HistoryEntry::user("hi")])
            .await
            .expect("outcome");
        assert_eq!(outcome, CompletionOutcome::Unavailable(BUSY_APOLOGY.to_string()));
    }
}
