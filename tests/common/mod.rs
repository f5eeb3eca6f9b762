// Common test utilities and helper structs
// Shared across all test files to avoid duplication
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use moodgpt_backend::{
    app::AppState,
    app_config::IdentityConfig,
    build_router,
    db::{MemoryStore, StoreHandles},
    models::HistoryEntry,
    services::{
        CompletionError, CompletionOutcome, CompletionService, IdentityService,
        MemorySessionStateStore,
    },
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-identity-secret-that-is-at-least-32-chars";
pub const TEST_WEBHOOK_KEY: &str = "test-skipcash-webhook-key";

pub fn identity_config() -> IdentityConfig {
    IdentityConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        audience: "moodgpt".to_string(),
        issuer: "moodgpt-identity".to_string(),
    }
}

/// Unique browser session id per test
pub fn session_id() -> String {
    format!("sess-{}", Uuid::new_v4().simple())
}

// =============================================================================
// SCRIPTED COMPLETION
// =============================================================================

/// One call the completion service received
#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub system_prompt: String,
    pub history: Vec<HistoryEntry>,
}

pub enum Scripted {
    Reply(String),
    Unavailable(String),
    Fail,
}

/// Replies from a queue, then with "ok"; records every call
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub async fn push(&self, next: Scripted) {
        self.script.lock().await.push_back(next);
    }

    pub async fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[HistoryEntry],
    ) -> Result<CompletionOutcome, CompletionError> {
        self.calls.lock().await.push(CompletionCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
        });

        match self.script.lock().await.pop_front() {
            Some(Scripted::Reply(text)) => Ok(CompletionOutcome::Reply(text)),
            Some(Scripted::Unavailable(text)) => Ok(CompletionOutcome::Unavailable(text)),
            Some(Scripted::Fail) => Err(CompletionError::EmptyReply("scripted".to_string())),
            None => Ok(CompletionOutcome::Reply("ok".to_string())),
        }
    }
}

// =============================================================================
// TEST APPLICATION
// =============================================================================

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub completion: Arc<ScriptedCompletion>,
    pub identity: IdentityService,
}

impl TestApp {
    /// Token for a signed-in user
    pub fn user_token(&self, uid: &str) -> String {
        self.identity
            .issue_token(uid, false, Some(&format!("{}@example.com", uid)), 3600)
            .expect("Failed to issue test token")
    }

    /// Token for an anonymous identity-provider session
    pub fn anonymous_token(&self, uid: &str) -> String {
        self.identity
            .issue_token(uid, true, None, 3600)
            .expect("Failed to issue test token")
    }

    /// Send a POST request
    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    /// Send a GET request
    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }

    /// Send a DELETE request
    pub fn delete(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "DELETE", uri)
    }

    /// Send a CORS preflight
    pub fn options(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "OPTIONS", uri)
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.header("content-type", "application/json")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {}", token))
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method.as_str()).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    /// Get status code
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}

/// Setup test application on the in-memory store
pub async fn setup_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let completion = Arc::new(ScriptedCompletion::default());

    let state = AppState::build(
        StoreHandles::from_store(store.clone()),
        "memory",
        Arc::new(MemorySessionStateStore::new()),
        IdentityService::new(&identity_config()),
        completion.clone(),
        Some(TEST_WEBHOOK_KEY.to_string()),
    );

    TestApp {
        app: build_router(state.clone()),
        state,
        store,
        completion,
        identity: IdentityService::new(&identity_config()),
    }
}
