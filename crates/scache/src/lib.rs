//! # scache
//!
//! Caching engines in front of an authoritative record store, backed by a
//! Redis-compatible TTL key-value store.
//!
//! - [`RecordCache`]: cache-aside per record, with negative caching and
//!   invalidate-on-write
//! - [`FullTableCache`]: a complete table mirrored into one hash, written
//!   through on every mutation
//!
//! Both engines cache secondary index lookups (unique → id, multi → id
//! list) and reset an entry's TTL on every read hit.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scache::{RecordCache, ScacheConfig, create_kv_backend};
//! use scache_core::Index;
//!
//! let config = ScacheConfig::default();
//! let backend = create_kv_backend(&config.redis).await?;
//! let cache = RecordCache::from_config(&config.cache, "commodity", "id", Arc::new(store), backend);
//!
//! let found = cache.get(&1).await?;
//! let by_name = cache.get_by(&Index::new("name", "copper")).await?;
//! ```

pub mod config;
pub mod error;
pub mod full_cache;
pub mod index_cache;
pub mod kv;
pub mod metrics;
pub mod observability;
pub mod record_cache;

pub use config::{CacheConfig, LoggingConfig, RedisConfig, ScacheConfig};
pub use error::{CacheError, CacheResult};
pub use full_cache::FullTableCache;
pub use index_cache::IndexCache;
pub use kv::{CacheEntry, HashStore, KvBackend, KvOptions, KvStore, MultiGet};
pub use record_cache::RecordCache;

pub use scache_core::{CacheNamespace, Index, OrderBy, OrderBys, Record, RecordId};
pub use scache_storage::{DynStorage, StorageAdapter, StorageError, UpdatePayload};

/// Create a KV backend based on configuration.
///
/// ## Modes
///
/// - **Redis disabled**: returns the in-process backend
/// - **Redis enabled**: builds a pool and checks it can reach the server
///
/// Unlike the in-process map, Redis is shared between instances, so a failed
/// connection is returned as an error instead of falling back silently.
pub async fn create_kv_backend(config: &RedisConfig) -> CacheResult<KvBackend> {
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local KV backend");
        return Ok(KvBackend::new_local());
    }

    tracing::info!(url = %config.url, pool_size = config.pool_size, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CacheError::config(format!("failed to create Redis pool: {e}")))?;

    let backend = KvBackend::new_redis(pool);
    backend.ping().await.inspect_err(|e| {
        tracing::warn!(url = %config.url, error = %e, "Redis is not reachable");
    })?;
    tracing::info!("Connected to Redis");
    Ok(backend)
}
