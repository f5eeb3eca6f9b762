pub mod diesel_pool;
pub mod memory_store;
pub mod postgres_store;
pub mod redis_config;
pub mod redis_pool;
pub mod store;

pub use diesel_pool::{create_diesel_pool, DieselDatabaseConfig, DieselPool};
pub use memory_store::MemoryStore;
pub use postgres_store::PgStore;
pub use redis_config::RedisConfig;
pub use redis_pool::{RedisHealth, RedisPool};
pub use store::{
    ConversationStore, HealthProbe, MessageStore, PaymentEventStore, Store, StoreError,
    StoreHandles, UsageStore, UserStore,
};
