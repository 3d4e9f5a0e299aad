//! Errors returned by the cache engines.

use scache_storage::StorageError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors a cache engine can report.
///
/// A missing record is never an error: reads return `Ok(None)` or a
/// zero-valued slot. Errors from the KV tier and the store are passed
/// through unchanged, nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The KV store could not be reached or rejected a command.
    #[error("KV transport error: {message}")]
    Transport { message: String },

    /// A KV operation did not finish within the configured bound.
    #[error("KV operation '{op}' timed out")]
    Timeout { op: &'static str },

    /// A cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The engine does not offer this operation.
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CacheError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for failures talking to the KV tier or the store.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Storage(err) => err.is_connection_error(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::transport(format!("connection pool: {err}"))
    }
}
