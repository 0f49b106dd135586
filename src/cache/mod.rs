//! Redis-based caching layer
//!
//! Only derived data lives here (admin statistics). Every caller treats a
//! cache failure as a miss, so Redis going away degrades to recomputation.

#[allow(clippy::module_inception)]
pub mod cache;
pub mod error;
pub mod keys;

pub use cache::{Cache, RedisCache};
pub use error::{CacheError, CacheResult};

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::CacheConfig;

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize the Redis pool. An unreachable server is logged, not fatal.
pub async fn init_cache_pool(config: &CacheConfig) -> CacheResult<RedisPool> {
    info!(
        max_connections = config.max_connections,
        "Initializing Redis cache pool"
    );

    let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(CONNECTION_TIMEOUT)
        .test_on_check_out(false)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    if let Err(e) = health_check(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    info!("Redis cache pool initialized successfully");
    Ok(pool)
}

/// PING through a pooled connection.
pub async fn health_check(pool: &RedisPool) -> CacheResult<()> {
    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(())
}

pub fn build_cache(pool: RedisPool, config: &CacheConfig) -> RedisCache {
    RedisCache::new(pool, Duration::from_secs(config.default_ttl))
}
