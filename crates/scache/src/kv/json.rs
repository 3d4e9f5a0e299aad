//! JSON values with a negative sentinel.

use std::marker::PhantomData;

use scache_core::NULL_LITERAL;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{KvBackend, KvOptions, bounded};
use crate::error::CacheResult;

/// A decoded cache entry. A key that is not cached at all is `None` at the
/// call site, never a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry<V> {
    /// The cached value.
    Present(V),
    /// Confirmed absent from the store.
    Absent,
}

impl<V> CacheEntry<V> {
    pub fn into_present(self) -> Option<V> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

/// Result of [`KvStore::multi_get`].
///
/// `entries` has one slot per requested key. Slots for keys with no cache
/// entry are `None` and their positions are listed in `missing`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGet<V> {
    pub entries: Vec<Option<CacheEntry<V>>>,
    pub missing: Vec<usize>,
}

impl<V> MultiGet<V> {
    /// `true` if every key had an entry, present or absent.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// JSON-encoded values of type `V` under string keys.
pub struct KvStore<V> {
    backend: KvBackend,
    options: KvOptions,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for KvStore<V> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            options: self.options,
            _value: PhantomData,
        }
    }
}

impl<V> std::fmt::Debug for KvStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("backend", &self.backend)
            .field("options", &self.options)
            .finish()
    }
}

impl<V: Serialize + DeserializeOwned> KvStore<V> {
    pub fn new(backend: KvBackend, options: KvOptions) -> Self {
        Self {
            backend,
            options,
            _value: PhantomData,
        }
    }

    pub fn backend(&self) -> &KvBackend {
        &self.backend
    }

    pub fn options(&self) -> KvOptions {
        self.options
    }

    fn decode(raw: &str) -> CacheResult<CacheEntry<V>> {
        if raw == NULL_LITERAL {
            return Ok(CacheEntry::Absent);
        }
        Ok(CacheEntry::Present(serde_json::from_str(raw)?))
    }

    /// Reads `key`. `Ok(None)` means the key holds no entry.
    pub async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry<V>>> {
        let raw = bounded("get", self.options.op_timeout, self.backend.get(key)).await?;
        raw.as_deref().map(Self::decode).transpose()
    }

    /// Writes `value` with a fresh TTL.
    pub async fn set(&self, key: &str, value: &V) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        bounded(
            "set",
            self.options.op_timeout,
            self.backend.set_ex(key, &raw, self.options.ttl),
        )
        .await
    }

    /// Records that `key` has no value in the store.
    pub async fn set_null(&self, key: &str) -> CacheResult<()> {
        bounded(
            "set_null",
            self.options.op_timeout,
            self.backend.set_ex(key, NULL_LITERAL, self.options.ttl),
        )
        .await
    }

    /// Reads every key in one round trip, keeping positions.
    pub async fn multi_get(&self, keys: &[String]) -> CacheResult<MultiGet<V>> {
        let raw = bounded("multi_get", self.options.op_timeout, self.backend.mget(keys)).await?;
        let mut entries = Vec::with_capacity(raw.len());
        let mut missing = Vec::new();
        for (pos, value) in raw.iter().enumerate() {
            match value {
                Some(value) => entries.push(Some(Self::decode(value)?)),
                None => {
                    entries.push(None);
                    missing.push(pos);
                }
            }
        }
        Ok(MultiGet { entries, missing })
    }

    /// Writes every `(key, value)` pair with a fresh TTL.
    pub async fn multi_set<'a, I>(&self, entries: I) -> CacheResult<()>
    where
        V: 'a,
        I: IntoIterator<Item = (String, &'a V)>,
    {
        let encoded = entries
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::to_string(value)?)))
            .collect::<CacheResult<Vec<_>>>()?;
        bounded(
            "multi_set",
            self.options.op_timeout,
            self.backend.mset_ex(&encoded, self.options.ttl),
        )
        .await
    }

    /// Records that none of `keys` has a value in the store.
    pub async fn multi_set_null(&self, keys: &[String]) -> CacheResult<()> {
        let encoded: Vec<(String, String)> = keys
            .iter()
            .map(|key| (key.clone(), NULL_LITERAL.to_string()))
            .collect();
        bounded(
            "multi_set_null",
            self.options.op_timeout,
            self.backend.mset_ex(&encoded, self.options.ttl),
        )
        .await
    }

    /// Resets the TTL of every key.
    pub async fn refresh(&self, keys: &[String]) -> CacheResult<()> {
        bounded(
            "refresh",
            self.options.op_timeout,
            self.backend.expire(keys, self.options.ttl),
        )
        .await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        bounded("exists", self.options.op_timeout, self.backend.exists(key)).await
    }

    /// Deletes every key, returning how many existed.
    pub async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        bounded("delete", self.options.op_timeout, self.backend.del(keys)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store<V: Serialize + DeserializeOwned>() -> KvStore<V> {
        KvStore::new(
            KvBackend::new_local(),
            KvOptions::default().with_ttl(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn test_get_distinguishes_unknown_absent_present() {
        let kv = store::<Vec<i64>>();
        assert_eq!(kv.get("k").await.unwrap(), None);

        kv.set_null("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(CacheEntry::Absent));

        kv.set("k", &vec![3, 1]).await.unwrap();
        assert_eq!(
            kv.get("k").await.unwrap(),
            Some(CacheEntry::Present(vec![3, 1]))
        );
    }

    #[tokio::test]
    async fn test_multi_get_reports_missing_positions() {
        let kv = store::<String>();
        let a = "a".to_string();
        kv.multi_set([("k1".to_string(), &a)]).await.unwrap();
        kv.multi_set_null(&["k3".to_string()]).await.unwrap();

        let keys: Vec<String> = ["k1", "k2", "k3"].iter().map(|k| k.to_string()).collect();
        let result = kv.multi_get(&keys).await.unwrap();
        assert_eq!(result.missing, vec![1]);
        assert!(!result.is_complete());
        assert_eq!(result.entries[0], Some(CacheEntry::Present("a".to_string())));
        assert_eq!(result.entries[1], None);
        assert_eq!(result.entries[2], Some(CacheEntry::Absent));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_serialization_error() {
        let kv = store::<i64>();
        kv.backend()
            .set_ex("k", "{oops", Duration::from_secs(60))
            .await
            .unwrap();
        let err = kv.get("k").await.unwrap_err();
        assert!(matches!(err, crate::CacheError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_delete_counts_existing() {
        let kv = store::<i64>();
        kv.set("k", &1).await.unwrap();
        let keys = vec!["k".to_string(), "other".to_string()];
        assert_eq!(kv.delete(&keys).await.unwrap(), 1);
        assert!(!kv.exists("k").await.unwrap());
    }
}
