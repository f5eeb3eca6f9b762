// Diesel-async + bb8 connection pooling for PostgreSQL

use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use std::time::Duration;

use crate::app_config::AppConfig;

pub type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct DieselDatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub test_on_checkout: bool,
}

impl DieselDatabaseConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            min_connections: config.database.min_connections,
            connection_timeout: Duration::from_secs(config.database.connect_timeout),
            idle_timeout: Duration::from_secs(config.database.idle_timeout),
            max_lifetime: Duration::from_secs(config.database.max_lifetime),
            test_on_checkout: true,
        }
    }
}

/// Create Diesel connection pool
pub async fn create_diesel_pool(
    config: DieselDatabaseConfig,
) -> Result<DieselPool, Box<dyn std::error::Error>> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_on_check_out(config.test_on_checkout)
        .build(manager)
        .await?;

    // Fail fast on a bad URL
    let conn = pool.get().await?;
    drop(conn);

    tracing::info!(
        "Diesel pool initialized for {} with {} max connections",
        mask_connection_string(&config.url),
        config.max_connections
    );

    Ok(pool)
}

/// Mask database connection string for logging
pub fn mask_connection_string(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let scheme = if parsed.scheme() == "postgres" {
            "postgresql"
        } else {
            parsed.scheme()
        };
        let host = parsed.host_str().unwrap_or("***");
        let path = parsed.path();

        if parsed.username().is_empty() && parsed.password().is_none() {
            format!("{}://{}{}", scheme, host, path)
        } else {
            format!("{}://***:***@{}{}", scheme, host, path)
        }
    } else {
        "postgresql://***:***@***".to_string()
    }
}
