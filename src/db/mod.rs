pub mod feature_cache;
pub mod postgres;
pub mod redis;

pub use feature_cache::CachedFeatureStore;
pub use postgres::{create_pool, run_migrations};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
