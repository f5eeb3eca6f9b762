use rand::{thread_rng, Rng};
use redis::{aio::ConnectionManager, Client, RedisError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

use super::redis_config::RedisConfig;

/// Maximum delay cap for exponential backoff
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Redis handle shared by every request.
/// `ConnectionManager` multiplexes and reconnects on its own, so one clone per
/// caller is all the pooling Redis needs here.
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
    config: RedisConfig,
}

/// Health check status for Redis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisHealth {
    pub is_healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl RedisPool {
    /// Connect with retry and exponential backoff
    #[instrument(skip(config))]
    pub async fn new(config: RedisConfig) -> Result<Self, RedisError> {
        config.validate().map_err(|e| {
            error!("Invalid Redis configuration: {}", e);
            RedisError::from((
                redis::ErrorKind::InvalidClientConfig,
                "Invalid configuration",
            ))
        })?;

        info!("Connecting to Redis at {}", mask_redis_url(&config.redis_url));

        let client = Client::open(config.redis_url.as_str())?;
        let manager = Self::connect_with_retry(&client, &config).await?;

        info!("Redis connection established");
        Ok(Self { manager, config })
    }

    async fn connect_with_retry(
        client: &Client,
        config: &RedisConfig,
    ) -> Result<ConnectionManager, RedisError> {
        let mut retry_count = 0;
        let mut delay = config.retry_delay;

        loop {
            let attempt = timeout(
                config.connection_timeout,
                ConnectionManager::new(client.clone()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(RedisError::from((
                    redis::ErrorKind::IoError,
                    "Connection attempt timed out",
                )))
            });

            match attempt {
                Ok(conn) => return Ok(conn),
                Err(e) if retry_count < config.retry_attempts => {
                    warn!(
                        "Failed to create Redis connection (attempt {}/{}): {}",
                        retry_count + 1,
                        config.retry_attempts,
                        e
                    );

                    sleep(delay).await;

                    let jitter = thread_rng().gen_range(0..100);
                    delay =
                        std::cmp::min(delay * 2 + Duration::from_millis(jitter), MAX_RETRY_DELAY);
                    retry_count += 1;
                },
                Err(e) => {
                    error!(
                        "Failed to create Redis connection after {} attempts",
                        config.retry_attempts
                    );
                    return Err(e);
                },
            }
        }
    }

    /// Run a command with the configured command timeout
    async fn run<T, F, Fut>(&self, f: F) -> Result<T, RedisError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = Result<T, RedisError>>,
    {
        match timeout(self.config.command_timeout, f(self.manager.clone())).await {
            Ok(result) => result,
            Err(_) => Err(RedisError::from((
                redis::ErrorKind::IoError,
                "Redis command timed out",
            ))),
        }
    }

    pub async fn health_check(&self) -> RedisHealth {
        let start = Instant::now();

        let result = self
            .run(|mut conn| async move {
                redis::cmd("PING").query_async::<String>(&mut conn).await
            })
            .await;

        match result {
            Ok(_) => RedisHealth {
                is_healthy: true,
                latency_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => {
                error!("Redis health check failed: {}", e);
                RedisHealth {
                    is_healthy: false,
                    latency_ms: start.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                }
            },
        }
    }

    /// Get a value by key with type conversion
    pub async fn get<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, RedisError> {
        let key = key.to_string();
        let raw = self
            .run(|mut conn| async move {
                redis::cmd("GET")
                    .arg(key)
                    .query_async::<Option<String>>(&mut conn)
                    .await
            })
            .await?;

        Ok(raw.and_then(|value| value.parse::<T>().ok()))
    }

    /// Increment a counter unless it already reached `cap`, refreshing its expiry.
    /// Returns whether the increment happened and the resulting count.
    pub async fn incr_below(
        &self,
        key: &str,
        cap: u64,
        expiry_seconds: u64,
    ) -> Result<(bool, i64), RedisError> {
        let script = redis::Script::new(
            r#"
                local key = KEYS[1]
                local cap = tonumber(ARGV[1])
                local ttl = tonumber(ARGV[2])
                local count = tonumber(redis.call('GET', key) or '0')
                if count >= cap then
                    return {0, count}
                end
                count = redis.call('INCR', key)
                redis.call('EXPIRE', key, ttl)
                return {1, count}
            "#,
        );
        let key = key.to_string();

        let (granted, count) = self
            .run(|mut conn| async move {
                script
                    .key(key)
                    .arg(cap)
                    .arg(expiry_seconds)
                    .invoke_async::<(i64, i64)>(&mut conn)
                    .await
            })
            .await?;
        Ok((granted == 1, count))
    }

    /// Delete a key from Redis
    pub async fn del(&self, key: &str) -> Result<(), RedisError> {
        let key = key.to_string();
        self.run(|mut conn| async move {
            redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await
        })
        .await
    }
}

/// Mask Redis URL for logging
pub fn mask_redis_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let host = parsed.host_str().unwrap_or("***");
        let port = parsed.port().unwrap_or(6379);

        if !parsed.username().is_empty() || parsed.password().is_some() {
            format!("redis://***:***@{}:{}", host, port)
        } else {
            format!("redis://{}:{}", host, port)
        }
    } else {
        "redis://***:***@***:***".to_string()
    }
}
