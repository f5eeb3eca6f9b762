// Library exports for the MoodGPT backend
// The binary and the integration tests both build the router from here

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{MemoryStore, PgStore, RedisConfig, RedisPool, StoreHandles};
pub use services::{
    ChatOrchestrator, CompletionService, ConversationRegistry, FallbackCompletionClient,
    GuestQuotaTracker, Identity, IdentityService, QuotaGate, SubscriptionService,
    UsageCounterService,
};
pub use utils::ChatError;

use axum::{
    extract::State, http::StatusCode, middleware::from_fn_with_state,
    response::IntoResponse, routing::get, Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

// Library initialization: storage, guest state, identity and completion from config
pub async fn initialize_app_state(config: &AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let (stores, backend) = if config.uses_memory_store() {
        info!("Using in-memory store; data is lost on restart");
        (StoreHandles::from_store(Arc::new(MemoryStore::new())), "memory")
    } else {
        if migrations::should_run_migrations(config) {
            info!("Running embedded migrations...");
            migrations::run_all_migrations(migrations::MigrationConfig::from_app_config(config))
                .await
                .map_err(|e| format!("Migration failed: {}", e))?;
        }

        info!("Initializing database pool...");
        let pool = db::create_diesel_pool(db::DieselDatabaseConfig::from_app_config(config)).await?;
        (StoreHandles::from_store(Arc::new(PgStore::new(pool))), "postgresql")
    };

    let session_state: Arc<dyn services::SessionStateStore> = if config.uses_memory_guest_state() {
        info!("REDIS_URL not set; guest prompt counts kept in memory");
        Arc::new(services::MemorySessionStateStore::new())
    } else {
        info!("Initializing Redis pool...");
        let redis_pool = RedisPool::new(RedisConfig::from_settings(&config.redis)).await?;
        Arc::new(services::RedisSessionStateStore::new(
            redis_pool,
            config.redis.guest_state_ttl_secs,
        ))
    };

    let completion = Arc::new(FallbackCompletionClient::new(&config.completion)?);
    let configured = config
        .completion
        .providers
        .iter()
        .filter(|p| p.api_key.is_some())
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>();
    info!("Completion providers with keys: {:?}", configured);

    Ok(AppState::build(
        stores,
        backend,
        session_state,
        IdentityService::new(&config.identity),
        completion,
        config.payments.skipcash_webhook_key.clone(),
    )
    .with_cors(middleware::CorsPolicy::from_app_config(config)))
}

// Full HTTP surface
pub fn build_router(state: AppState) -> Router {
    let api = handlers::chat_routes()
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::identity_middleware,
        ))
        .nest("/webhooks", handlers::webhook_routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::dynamic_cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let store_health = match state.store_health.ping().await {
        Ok(()) => serde_json::json!({
            "status": "healthy",
            "backend": state.storage_backend,
            "error": null
        }),
        Err(e) => serde_json::json!({
            "status": "unhealthy",
            "backend": state.storage_backend,
            "error": e.to_string()
        }),
    };
    let store_healthy = store_health["status"] == "healthy";

    // Guest counters fail open, so they degrade the report without failing it
    let guest_state_healthy = state.guests.is_healthy().await;

    let status = match (store_healthy, guest_state_healthy) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        _ => "unhealthy",
    };

    let response = serde_json::json!({
        "status": status,
        "service": "moodgpt-backend",
        "timestamp": timestamp,
        "components": {
            "store": store_health,
            "guest_state": {
                "status": if guest_state_healthy { "healthy" } else { "unhealthy" }
            }
        }
    });

    if store_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
