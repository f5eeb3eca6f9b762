// Migration orchestrator for the MoodGPT backend
// Embedded in the application binary so a bare container can self-migrate

pub mod diesel;

use tracing::{error, info};

/// Configuration for migration execution
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub database_url: String,
    pub environment: String,
}

impl MigrationConfig {
    pub fn from_app_config(config: &crate::app_config::AppConfig) -> Self {
        Self {
            database_url: config.database.url.clone(),
            environment: config.environment.to_string(),
        }
    }
}

/// Runs the embedded PostgreSQL migrations
pub async fn run_all_migrations(
    config: MigrationConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.environment
    );

    match diesel::run_migrations(config.database_url).await {
        Ok(0) => info!("[MIGRATIONS] Diesel migrations up to date"),
        Ok(applied_count) => info!("[MIGRATIONS] Applied {} Diesel migrations", applied_count),
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            return Err(format!("Diesel migration failed: {}", e).into());
        },
    }

    Ok(())
}

/// Check if migrations should run based on configuration
pub fn should_run_migrations(config: &crate::app_config::AppConfig) -> bool {
    !config.disable_embedded_migrations
}
