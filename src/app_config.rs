// Centralized configuration management for the MoodGPT backend
// Every environment variable is read ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// `DATABASE_URL` value selecting the in-memory store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,
    pub cors_allowed_origins: Vec<String>,
    pub disable_embedded_migrations: bool,

    // Nested configs
    pub database: DatabaseConfig,
    pub redis: RedisSettings,
    pub identity: IdentityConfig,
    pub completion: CompletionConfig,
    pub payments: PaymentConfig,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// Redis settings. An empty URL keeps guest session state in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    pub connection_timeout: u64,
    pub command_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub guest_state_ttl_secs: u64,
}

/// Identity provider token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    pub audience: String,
    pub issuer: String,
}

/// One OpenAI-compatible completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Completion provider chain, tried in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub providers: Vec<ProviderConfig>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Payment gateway webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub skipcash_webhook_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        // Unset and blank are the same thing for secrets
        let get_optional = |key: &str| -> Option<String> {
            env::var(key).ok().filter(|v| !v.trim().is_empty())
        };

        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let rust_log = get_or_default("RUST_LOG", "moodgpt_backend=debug,tower_http=info");
        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let disable_embedded_migrations =
            parse_bool_or_default("DISABLE_EMBEDDED_MIGRATIONS", "false");

        let database = DatabaseConfig {
            url: get_required("DATABASE_URL")?,
            max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_or_default("DATABASE_MIN_CONNECTIONS", "2")?,
            connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?,
            idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,
        };

        let redis = RedisSettings {
            url: get_or_default("REDIS_URL", ""),
            connection_timeout: parse_u64_or_default("REDIS_CONNECTION_TIMEOUT", "5")?,
            command_timeout: parse_u64_or_default("REDIS_COMMAND_TIMEOUT", "5")?,
            retry_attempts: parse_or_default("REDIS_RETRY_ATTEMPTS", "3")?,
            retry_delay_ms: parse_u64_or_default("REDIS_RETRY_DELAY_MS", "100")?,
            guest_state_ttl_secs: parse_u64_or_default("GUEST_STATE_TTL_SECS", "2592000")?,
        };

        let jwt_secret = get_required("IDENTITY_JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "IDENTITY_JWT_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }
        let identity = IdentityConfig {
            jwt_secret,
            audience: get_or_default("IDENTITY_AUDIENCE", "moodgpt"),
            issuer: get_or_default("IDENTITY_ISSUER", "moodgpt-identity"),
        };

        let temperature = get_or_default("COMPLETION_TEMPERATURE", "0.7")
            .parse::<f32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "COMPLETION_TEMPERATURE".to_string(),
                    "not a valid f32".to_string(),
                )
            })?;

        // Provider endpoints must be absolute http(s) URLs
        let endpoint = |key: &str, default: &str| -> Result<String, ConfigError> {
            let raw = get_or_default(key, default);
            match url::Url::parse(&raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw),
                Ok(parsed) => Err(ConfigError::InvalidValue(
                    key.to_string(),
                    format!("unsupported scheme {}", parsed.scheme()),
                )),
                Err(e) => Err(ConfigError::InvalidValue(key.to_string(), e.to_string())),
            }
        };

        let completion = CompletionConfig {
            providers: vec![
                ProviderConfig {
                    name: "openai".to_string(),
                    api_url: endpoint(
                        "OPENAI_API_URL",
                        "https://api.openai.com/v1/chat/completions",
                    )?,
                    api_key: get_optional("OPENAI_API_KEY"),
                    model: get_or_default("OPENAI_MODEL", "gpt-3.5-turbo"),
                },
                ProviderConfig {
                    name: "deepinfra".to_string(),
                    api_url: endpoint(
                        "DEEPINFRA_API_URL",
                        "https://api.deepinfra.com/v1/openai/chat/completions",
                    )?,
                    api_key: get_optional("DEEPINFRA_API_KEY"),
                    model: get_or_default("DEEPINFRA_MODEL", "meta-llama/Llama-2-70b-chat-hf"),
                },
            ],
            temperature,
            max_tokens: parse_or_default("COMPLETION_MAX_TOKENS", "800")?,
            timeout_secs: parse_u64_or_default("COMPLETION_TIMEOUT_SECS", "60")?,
        };

        let payments = PaymentConfig {
            skipcash_webhook_key: get_optional("SKIPCASH_WEBHOOK_KEY"),
        };

        if environment == Environment::Production && payments.skipcash_webhook_key.is_none() {
            return Err(ConfigError::MissingVar("SKIPCASH_WEBHOOK_KEY".to_string()));
        }

        Ok(Self {
            bind_address,
            port,
            environment,
            rust_log,
            cors_allowed_origins,
            disable_embedded_migrations,
            database,
            redis,
            identity,
            completion,
            payments,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// `DATABASE_URL=memory` runs on the in-process store, for local development
    pub fn uses_memory_store(&self) -> bool {
        self.database.url.eq_ignore_ascii_case(MEMORY_DATABASE_URL)
    }

    /// An empty `REDIS_URL` keeps guest prompt counts in process memory
    pub fn uses_memory_guest_state(&self) -> bool {
        self.redis.url.trim().is_empty()
    }
}

/// Get the global configuration instance
pub fn config() -> &'static AppConfig {
    &CONFIG
}
