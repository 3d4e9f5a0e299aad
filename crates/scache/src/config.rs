//! Configuration for the cache engines and the KV tier.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScacheConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.prefix.is_empty() {
            return Err("cache.prefix must not be empty".into());
        }
        if self.cache.prefix.contains('/') {
            return Err("cache.prefix must not contain '/'".into());
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be > 0".into());
        }
        if self.cache.op_timeout_ms == 0 {
            return Err("cache.op_timeout_ms must be > 0".into());
        }
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Key namespace, TTL and per-call timeout shared by every engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// First segment of every cache key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Entry lifetime in seconds, reset on every read hit
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound for a single KV call in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

fn default_prefix() -> String {
    "scache".to_string()
}

fn default_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_op_timeout_ms() -> u64 {
    30_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ttl_secs: default_ttl_secs(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis instead of the in-process map.
    /// Default: false (single instance)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::ScacheConfig;
    use crate::error::CacheError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "scache.toml";

    /// Loads the config file (if present), applies `SCACHE__SECTION__KEY`
    /// environment overrides and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<ScacheConfig, CacheError> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            tracing::warn!(path = %pathbuf.display(), "config file not found, using defaults");
        }
        // Environment variable overrides, e.g., SCACHE__CACHE__TTL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("SCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| CacheError::config(format!("config build error: {e}")))?;
        let merged: ScacheConfig = cfg
            .try_deserialize()
            .map_err(|e| CacheError::config(format!("config deserialize error: {e}")))?;
        merged.validate().map_err(CacheError::config)?;
        Ok(merged)
    }
}
