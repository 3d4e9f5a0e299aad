//! Serialization-aware access to the TTL key-value tier.
//!
//! [`KvBackend`] speaks raw strings to either an in-process map or Redis.
//! [`KvStore`] and [`HashStore`] layer JSON encoding, the negative sentinel
//! and sliding TTLs on top, and bound every call with the configured
//! operation timeout.

mod backend;
mod hash;
mod json;

use std::future::Future;
use std::time::Duration;

pub use backend::{KvBackend, LocalEntry};
pub use hash::HashStore;
pub use json::{CacheEntry, KvStore, MultiGet};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Default lifetime of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default upper bound for a single KV call.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-store TTL and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvOptions {
    /// Lifetime of every written entry, reset on each read hit.
    pub ttl: Duration,
    /// Upper bound for one KV round trip.
    pub op_timeout: Duration,
}

impl Default for KvOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl KvOptions {
    pub fn new(ttl: Duration, op_timeout: Duration) -> Self {
        Self { ttl, op_timeout }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }
}

impl From<&CacheConfig> for KvOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            op_timeout: config.op_timeout(),
        }
    }
}

/// Runs `fut`, failing with [`CacheError::Timeout`] once `limit` elapses.
pub(crate) async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "KV operation timed out");
            Err(CacheError::Timeout { op })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("get", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded::<(), _>("get", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CacheError::Timeout { op: "get" }));
    }

    #[test]
    fn test_options_builders() {
        let options = KvOptions::default()
            .with_ttl(Duration::from_secs(5))
            .with_op_timeout(Duration::from_millis(250));
        assert_eq!(options.ttl, Duration::from_secs(5));
        assert_eq!(options.op_timeout, Duration::from_millis(250));
    }
}
